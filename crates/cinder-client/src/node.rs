//! Node identity and liveness.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::config::NodeConfig;

/// Identifies a node by its position in configuration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Index into the client's configured node list.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// A configured node plus its cached liveness state.
///
/// Liveness reads are lock-free so routing never waits on pool activity;
/// the dead-since timestamp sits behind its own mutex, disjoint from any
/// pool lock.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    config: NodeConfig,
    alive: AtomicBool,
    dead_since: Mutex<Option<Instant>>,
}

impl Node {
    pub(crate) fn new(id: NodeId, config: NodeConfig) -> Self {
        Self {
            id,
            config,
            alive: AtomicBool::new(true),
            dead_since: Mutex::new(None),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The `host:port` this node is dialed at.
    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    /// Alias if configured, otherwise the address.
    pub fn name(&self) -> &str {
        self.config.alias.as_deref().unwrap_or(&self.config.addr)
    }

    pub(crate) fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// When the node was marked dead, while it still is.
    pub fn dead_since(&self) -> Option<Instant> {
        *self
            .dead_since
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Marks the node dead. Returns whether it was alive, so the caller
    /// knows if the ring needs a rebuild.
    pub(crate) fn mark_dead(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::AcqRel);
        if was_alive {
            *self
                .dead_since
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        }
        was_alive
    }

    /// Marks the node alive again. Returns whether it was dead.
    pub(crate) fn mark_alive(&self) -> bool {
        let was_dead = !self.alive.swap(true, Ordering::AcqRel);
        if was_dead {
            *self
                .dead_since
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = None;
        }
        was_dead
    }
}
