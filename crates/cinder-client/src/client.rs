//! The client façade: routing, failover, batches, maintenance.

use std::sync::{Arc, RwLock};

use bytes::Bytes;
use tracing::{debug, info, warn};

use cinder_protocol::{Command, ReplyValue};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::ClientError;
use crate::node::{Node, NodeId};
use crate::pool::Pool;
use crate::queue::{run_batch, QueueMode};
use crate::ring::Ring;

/// Handle to the engine.
///
/// Cloning is cheap: clones share nodes, pools, liveness and the
/// router. Batches are independent per-call state, so two clones (or
/// two tasks holding the same clone) never interleave on one batch.
#[derive(Clone, Debug)]
pub struct Client {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    config: ClientConfig,
    /// Configuration order; `NodeId` indexes into this.
    nodes: Vec<Arc<Node>>,
    pools: Vec<Pool>,
    /// Swapped wholesale on liveness changes; lookups clone the `Arc`
    /// and never hold the lock across I/O.
    ring: RwLock<Arc<Ring>>,
}

impl Client {
    /// Builds a client and starts its maintenance task. Construction
    /// does no I/O — connections are dialed on first use — but it must
    /// happen inside a tokio runtime so the task can be spawned.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.nodes.is_empty() {
            return Err(ClientError::NoNodes);
        }
        let nodes: Vec<Arc<Node>> = config
            .nodes
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, node_config)| Arc::new(Node::new(NodeId(i), node_config)))
            .collect();
        let pools = nodes
            .iter()
            .map(|node| Pool::new(Arc::clone(node), &config))
            .collect();
        let ring = RwLock::new(Arc::new(Ring::build(&nodes)));
        let shared = Arc::new(Shared {
            config,
            nodes,
            pools,
            ring,
        });
        spawn_maintenance(&shared);
        Ok(Self { shared })
    }

    /// Sends one command and waits for its reply — immediate mode.
    ///
    /// A server `-` reply comes back as [`ReplyValue::Error`]; `Err` is
    /// reserved for failures of the exchange itself (routing, pool,
    /// socket, protocol).
    pub async fn execute(&self, command: Command) -> Result<ReplyValue, ClientError> {
        let mut results = self
            .shared
            .run_routed(QueueMode::Immediate, vec![command])
            .await?;
        results.pop().ok_or_else(|| {
            ClientError::UnexpectedReply("single command produced no reply".into())
        })
    }

    /// Opens a batch: commands accumulate locally and nothing touches
    /// the network until [`Batch::flush`]. `transactional` wraps the
    /// batch in MULTI/EXEC; otherwise it is a plain pipeline.
    pub fn batch(&self, transactional: bool) -> Batch {
        Batch {
            shared: Arc::clone(&self.shared),
            mode: if transactional {
                QueueMode::Transactional
            } else {
                QueueMode::Pipelined
            },
            commands: Vec::new(),
            flushed: false,
        }
    }

    /// The node `key` routes to, after the key transform and hash-tag
    /// rules — the diagnostic counterpart of command routing.
    pub fn node_for_key(&self, key: &str) -> Result<Arc<Node>, ClientError> {
        let mapped = match &self.shared.config.key_transform {
            Some(hook) => hook(key),
            None => key.to_string(),
        };
        let id = self.shared.ring().locate(mapped.as_bytes())?;
        Ok(Arc::clone(&self.shared.nodes[id.index()]))
    }

    /// Configured nodes with their cached liveness, in configuration
    /// order.
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.shared.nodes
    }

    /// Opens a dedicated connection outside pool accounting,
    /// authenticated and database-selected per configuration. Meant for
    /// push-style readers that hold the socket indefinitely — a
    /// subscribe loop drives [`Connection::read_reply`] directly.
    pub async fn raw_connection(&self, node: &Node) -> Result<Connection, ClientError> {
        let config = &self.shared.config;
        let mut conn =
            Connection::connect(node.addr(), config.connect_timeout, config.io_timeout).await?;
        if let Some(password) = &node.config().password {
            conn.authenticate(password).await?;
        }
        if config.database != 0 {
            conn.select_db(config.database).await?;
        }
        Ok(conn)
    }
}

impl Shared {
    fn ring(&self) -> Arc<Ring> {
        Arc::clone(&self.ring.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn rebuild_ring(&self) {
        let ring = Arc::new(Ring::build(&self.nodes));
        *self.ring.write().unwrap_or_else(|e| e.into_inner()) = ring;
    }

    /// Marks a node dead, empties its pool and swaps in a ring without
    /// it. No-op if the node was already dead.
    fn fail_node(&self, id: NodeId) {
        let node = &self.nodes[id.index()];
        if node.mark_dead() {
            warn!(node = %id, addr = node.addr(), "node marked dead");
            self.pools[id.index()].clear_idle();
            self.rebuild_ring();
        }
    }

    /// Rewrites every flagged key through the configured hook. Keys must
    /// be UTF-8 once a hook is installed.
    fn apply_key_transform(&self, command: &mut Command) -> Result<(), ClientError> {
        let Some(hook) = &self.config.key_transform else {
            return Ok(());
        };
        for i in 0..command.key_count() {
            let key = command.key_at(i).clone();
            let key = std::str::from_utf8(&key).map_err(|_| ClientError::KeyNotUtf8)?;
            command.set_key_at(i, Bytes::from(hook(key)));
        }
        Ok(())
    }

    /// Resolves the one node every key in the batch routes to, or the
    /// ring's first node when no command carries a key. Key disagreement
    /// is a usage error raised before any I/O.
    fn route_batch(&self, commands: &[Command]) -> Result<NodeId, ClientError> {
        let ring = self.ring();
        let mut target: Option<NodeId> = None;
        for command in commands {
            for i in 0..command.key_count() {
                let owner = ring.locate(command.key_at(i))?;
                match target {
                    None => target = Some(owner),
                    Some(existing) if existing != owner => {
                        return Err(ClientError::CrossNode)
                    }
                    Some(_) => {}
                }
            }
        }
        match target {
            Some(node) => Ok(node),
            None => ring.first().ok_or(ClientError::NoLiveNodes),
        }
    }

    /// Routes a batch, runs it, and handles node failure.
    ///
    /// A node that cannot be reached at all is marked dead and the batch
    /// is re-routed against the rebuilt ring — the keys now belong to a
    /// surviving node. A failure after the conversation started is never
    /// silently retried (the commands may have executed); it surfaces,
    /// and the connection and possibly the node are condemned.
    async fn run_routed(
        &self,
        mode: QueueMode,
        mut commands: Vec<Command>,
    ) -> Result<Vec<ReplyValue>, ClientError> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        for command in &mut commands {
            self.apply_key_transform(command)?;
        }

        loop {
            let node_id = self.route_batch(&commands)?;
            let node = &self.nodes[node_id.index()];
            let pool = &self.pools[node_id.index()];

            let mut checkout = match pool.acquire().await {
                Ok(checkout) => checkout,
                Err(e) if e.is_unreachable() => {
                    warn!(node = %node_id, error = %e, "node unreachable, failing over");
                    self.fail_node(node_id);
                    continue;
                }
                Err(e) => {
                    if e.marks_node_dead() {
                        self.fail_node(node_id);
                    }
                    return Err(e);
                }
            };

            let password = node.config().password.as_deref();
            let outcome = run_batch(
                &mut checkout.conn,
                mode,
                &commands,
                password,
                self.config.database,
            )
            .await;

            return match outcome {
                Ok(results) => {
                    pool.release(checkout);
                    Ok(results)
                }
                Err(e) => {
                    pool.discard(checkout);
                    if e.marks_node_dead() {
                        self.fail_node(node_id);
                    }
                    Err(e)
                }
            };
        }
    }

    /// One maintenance pass: probe dead nodes back to life, trim idle
    /// connections on the live ones.
    async fn run_maintenance(&self) {
        let mut revived = false;
        for (node, pool) in self.nodes.iter().zip(&self.pools) {
            if node.is_alive() {
                pool.trim_idle();
            } else {
                let down_for = node.dead_since().map(|since| since.elapsed());
                if pool.probe().await {
                    node.mark_alive();
                    info!(node = %node.id(), addr = node.addr(), ?down_for, "node revived");
                    revived = true;
                }
            }
        }
        if revived {
            self.rebuild_ring();
        }
    }
}

/// Probes and trims on a timer for as long as any client handle lives.
/// The task holds only a weak reference, so dropping the last handle
/// stops it instead of leaking it.
fn spawn_maintenance(shared: &Arc<Shared>) {
    let period = shared.config.maintenance_interval;
    let weak = Arc::downgrade(shared);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // the first tick fires immediately; nothing to do that early
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(shared) = weak.upgrade() else {
                break;
            };
            shared.run_maintenance().await;
        }
        debug!("maintenance task stopped");
    });
}

/// A pipelined or transactional batch bound to one flush.
///
/// Commands accumulate locally; [`Batch::flush`] sends them all in one
/// write and returns per-command results in submission order. A batch
/// dropped without flushing sends nothing and logs a warning.
pub struct Batch {
    shared: Arc<Shared>,
    mode: QueueMode,
    commands: Vec<Command>,
    flushed: bool,
}

impl Batch {
    /// Appends a command; its reply comes back from [`Batch::flush`] at
    /// the same position.
    pub fn cmd(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Sends every queued command and returns their results in
    /// submission order. An empty batch resolves without touching the
    /// network.
    pub async fn flush(mut self) -> Result<Vec<ReplyValue>, ClientError> {
        self.flushed = true;
        let commands = std::mem::take(&mut self.commands);
        let mode = self.mode;
        let shared = Arc::clone(&self.shared);
        shared.run_routed(mode, commands).await
    }

    /// Abandons the batch deliberately: nothing is sent and no
    /// dropped-without-flush warning is logged.
    pub fn discard(mut self) {
        self.flushed = true;
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        if !self.flushed && !self.commands.is_empty() {
            warn!(
                pending = self.commands.len(),
                "batch dropped without flush; its commands were never sent"
            );
        }
    }
}
