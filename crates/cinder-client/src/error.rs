//! Client-side error types.

use thiserror::Error;

use cinder_protocol::ProtocolError;

/// Errors surfaced by the client engine.
///
/// Server `-` replies to ordinary commands are not errors at this level;
/// they come back as [`ReplyValue::Error`](cinder_protocol::ReplyValue)
/// values and only become `Err` through the typed accessors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Underlying socket failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The server sent bytes that do not form a valid reply.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// TCP connect did not complete within the connect timeout.
    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),

    /// No reply bytes arrived within the I/O timeout.
    #[error("timed out waiting for a reply")]
    IoTimeout,

    /// No pool slot freed up within the connect timeout.
    #[error("connection pool for {0} exhausted")]
    PoolExhausted(String),

    /// The peer closed the connection.
    #[error("connection closed by server")]
    Disconnected,

    /// The client was built with an empty node list.
    #[error("at least one node must be configured")]
    NoNodes,

    /// Every configured node is currently marked dead.
    #[error("no live nodes")]
    NoLiveNodes,

    /// Keys of one operation resolved to different nodes.
    #[error("keys route to different nodes; cannot execute across nodes")]
    CrossNode,

    /// A key contained `{` with no closing `}`.
    #[error("unterminated hash tag in key {0:?}")]
    UnterminatedKeyTag(String),

    /// A key transform is installed but the key is not valid UTF-8.
    #[error("key must be valid utf-8 when a key transform is installed")]
    KeyNotUtf8,

    /// The reply sequence of a transaction did not line up with what was
    /// sent. Fatal to the connection.
    #[error("transaction reply mismatch: {0}")]
    TransactionMismatch(String),

    /// AUTH was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// SELECT was rejected.
    #[error("select failed: {0}")]
    Select(String),

    /// A well-formed reply of a shape the protocol exchange rules out.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl ClientError {
    /// True when the failure means the connection's reply stream can no
    /// longer be trusted, so the node it belongs to is provisionally
    /// marked dead and the connection destroyed.
    pub(crate) fn marks_node_dead(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::Protocol(_)
                | ClientError::IoTimeout
                | ClientError::Disconnected
                | ClientError::TransactionMismatch(_)
                | ClientError::UnexpectedReply(_)
        )
    }

    /// True when the node could not be reached at all, which is grounds
    /// for failing over to the rebuilt ring rather than surfacing the
    /// error.
    pub(crate) fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::ConnectTimeout(_)
                | ClientError::IoTimeout
                | ClientError::Disconnected
        )
    }
}
