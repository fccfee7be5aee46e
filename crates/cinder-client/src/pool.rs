//! Bounded per-node connection pool.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, trace};

use cinder_protocol::{Command, ReplyValue};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::ClientError;
use crate::node::Node;

/// A checked-out connection plus the pool slot it occupies.
///
/// Dropping a checkout (instead of handing it to [`Pool::release`] or
/// [`Pool::discard`]) closes the connection and frees the slot, so a
/// forgotten checkout can never wedge the pool.
#[derive(Debug)]
pub(crate) struct Checkout {
    pub(crate) conn: Connection,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Pool of connections to a single node.
///
/// The semaphore counts checked-out connections; idle entries on the
/// free list hold no permit. Every connection is created under a permit
/// and a release moves it to the free list as the permit is returned, so
/// live connections never exceed `max`.
#[derive(Debug)]
pub(crate) struct Pool {
    node: Arc<Node>,
    gate: Arc<Semaphore>,
    idle: Mutex<Vec<Connection>>,
    min: usize,
    connect_timeout: Duration,
    io_timeout: Duration,
    idle_timeout: Duration,
}

impl Pool {
    pub(crate) fn new(node: Arc<Node>, config: &ClientConfig) -> Self {
        Self {
            node,
            gate: Arc::new(Semaphore::new(config.pool_max)),
            idle: Mutex::new(Vec::new()),
            min: config.pool_min,
            connect_timeout: config.connect_timeout,
            io_timeout: config.io_timeout,
            idle_timeout: config.idle_timeout,
        }
    }

    fn idle_list(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Checks out a connection, reusing an idle one when possible and
    /// dialing a new one otherwise. Waits at most the connect timeout for
    /// a free slot.
    pub(crate) async fn acquire(&self) -> Result<Checkout, ClientError> {
        let permit = match timeout(self.connect_timeout, self.gate.clone().acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            _ => {
                return Err(ClientError::PoolExhausted(self.node.addr().to_string()));
            }
        };

        // Newest idle connection first; anything that went stale while
        // pooled is dropped and the next one tried.
        loop {
            let Some(mut conn) = self.idle_list().pop() else {
                break;
            };
            if conn.drain_stale() {
                trace!(node = %self.node.id(), "reusing pooled connection");
                return Ok(Checkout {
                    conn,
                    _permit: permit,
                });
            }
            debug!(node = %self.node.id(), "dropping connection that closed while pooled");
        }

        let conn = self.open().await?;
        Ok(Checkout {
            conn,
            _permit: permit,
        })
    }

    /// Dials a fresh connection and authenticates it when the node
    /// carries a credential.
    async fn open(&self) -> Result<Connection, ClientError> {
        let mut conn =
            Connection::connect(self.node.addr(), self.connect_timeout, self.io_timeout).await?;
        if let Some(password) = &self.node.config().password {
            conn.authenticate(password).await?;
        }
        Ok(conn)
    }

    /// Returns a healthy connection to the free list.
    pub(crate) fn release(&self, checkout: Checkout) {
        let Checkout { conn, _permit } = checkout;
        self.idle_list().push(conn);
        // _permit drops here, freeing the slot
    }

    /// Closes a connection whose reply stream can no longer be trusted.
    pub(crate) fn discard(&self, checkout: Checkout) {
        debug!(node = %self.node.id(), "discarding connection");
        drop(checkout);
    }

    /// Drops every pooled connection. Called when the node is marked
    /// dead; whatever is on the free list is broken too.
    pub(crate) fn clear_idle(&self) {
        self.idle_list().clear();
    }

    /// Drops idle connections older than the idle timeout, keeping `min`
    /// around as warm spares.
    pub(crate) fn trim_idle(&self) {
        let mut idle = self.idle_list();
        let before = idle.len();
        let mut i = 0;
        while idle.len() > self.min && i < idle.len() {
            if idle[i].idle_for() > self.idle_timeout {
                idle.remove(i);
            } else {
                i += 1;
            }
        }
        let dropped = before - idle.len();
        if dropped > 0 {
            debug!(node = %self.node.id(), dropped, kept = idle.len(), "trimmed idle connections");
        }
    }

    /// Opens a throwaway connection and PINGs the node. Used by the
    /// maintenance task to re-validate dead nodes; the probe connection
    /// is dropped either way so pool accounting stays untouched.
    pub(crate) async fn probe(&self) -> bool {
        let mut conn = match self.open().await {
            Ok(conn) => conn,
            Err(e) => {
                trace!(node = %self.node.id(), error = %e, "probe could not connect");
                return false;
            }
        };
        let ping = Command::new("PING");
        if conn.send([&ping]).await.is_err() {
            return false;
        }
        match conn.read_reply().await {
            Ok(ReplyValue::Error(msg)) => {
                trace!(node = %self.node.id(), %msg, "probe answered with an error");
                false
            }
            Ok(_) => true,
            Err(e) => {
                trace!(node = %self.node.id(), error = %e, "probe failed");
                false
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn idle_len(&self) -> usize {
        self.idle_list().len()
    }
}
