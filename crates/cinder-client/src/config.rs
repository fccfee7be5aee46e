//! Client configuration.

use std::sync::Arc;
use std::time::Duration;

/// Hook applied to every logical key before routing and transmission.
///
/// Installing one restricts keys to valid UTF-8; a non-UTF-8 key then
/// fails with [`ClientError::KeyNotUtf8`](crate::ClientError::KeyNotUtf8).
pub type KeyTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Address and credentials for a single node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// `host:port` dialed for connections; also seeds the node's ring
    /// positions, so changing it remaps keys.
    pub addr: String,
    /// Optional human-readable name used in logs and CLI output.
    pub alias: Option<String>,
    /// Optional credential; AUTH is sent before the first command on
    /// every new connection to this node.
    pub password: Option<String>,
}

impl NodeConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            alias: None,
            password: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// Tuning knobs for the whole client.
#[derive(Clone)]
pub struct ClientConfig {
    /// Nodes in configuration order; order fixes node identity.
    pub nodes: Vec<NodeConfig>,
    /// Idle connections retained per node when the maintenance timer
    /// trims.
    pub pool_min: usize,
    /// Hard cap on live connections per node.
    pub pool_max: usize,
    /// Bound on TCP connects and on waiting for a free pool slot.
    pub connect_timeout: Duration,
    /// Bound on a single socket read while awaiting a reply.
    pub io_timeout: Duration,
    /// Idle age beyond which pooled connections are trimmed down to
    /// `pool_min`.
    pub idle_timeout: Duration,
    /// How often dead nodes are probed and idle connections trimmed.
    pub maintenance_interval: Duration,
    /// Database index selected on every connection before use.
    pub database: u32,
    /// Key transform hook; identity when unset.
    pub key_transform: Option<KeyTransform>,
}

impl ClientConfig {
    /// Configuration with default tuning for the given nodes.
    pub fn new(nodes: Vec<NodeConfig>) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            pool_min: 1,
            pool_max: 16,
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
            maintenance_interval: Duration::from_secs(1),
            database: 0,
            key_transform: None,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("nodes", &self.nodes)
            .field("pool_min", &self.pool_min)
            .field("pool_max", &self.pool_max)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("maintenance_interval", &self.maintenance_interval)
            .field("database", &self.database)
            .field(
                "key_transform",
                &self.key_transform.as_ref().map(|_| "<fn>"),
            )
            .finish()
    }
}
