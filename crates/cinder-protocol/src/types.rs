//! Reply value types.
//!
//! [`ReplyValue`] represents a single decoded server reply. Bulk payloads
//! use `Bytes` so values can move through queues and result slots without
//! copying.

use bytes::Bytes;
use thiserror::Error;

/// A single decoded reply.
///
/// Covers every shape the server can send: status lines, errors,
/// integers, bulk (binary-safe) values, multi-bulk sequences, and the
/// null markers (`$-1` / `*-1`), which both decode to [`ReplyValue::Nil`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyValue {
    /// Status line, e.g. `+OK\r\n`.
    Status(String),

    /// Error line, e.g. `-ERR unknown command\r\n`. A well-formed error
    /// reply is a command-level failure, not a connection failure; it is
    /// carried as a value so batch results stay positional.
    Error(String),

    /// 64-bit signed integer, e.g. `:42\r\n`.
    Integer(i64),

    /// Bulk (binary-safe) value, e.g. `$5\r\nhello\r\n`.
    Bulk(Bytes),

    /// Ordered multi-bulk sequence, e.g. `*2\r\n:1\r\n:2\r\n`.
    Array(Vec<ReplyValue>),

    /// Null bulk (`$-1\r\n`) or null multi-bulk (`*-1\r\n`).
    Nil,
}

/// Error returned by the typed accessors when a reply doesn't have the
/// requested shape.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplyError {
    /// The server answered this command with an error reply.
    #[error("server error: {0}")]
    Server(String),

    /// The reply was well-formed but not the shape the caller asked for.
    #[error("unexpected reply: expected {expected}, got {actual}")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },

    /// The caller asked for a string view of a non-UTF-8 bulk payload.
    #[error("bulk value is not valid utf-8")]
    NotUtf8,
}

impl ReplyValue {
    /// Returns `true` if this reply is the null marker.
    pub fn is_nil(&self) -> bool {
        matches!(self, ReplyValue::Nil)
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ReplyValue::Status(_) => "status",
            ReplyValue::Error(_) => "error",
            ReplyValue::Integer(_) => "integer",
            ReplyValue::Bulk(_) => "bulk",
            ReplyValue::Array(_) => "multi-bulk",
            ReplyValue::Nil => "nil",
        }
    }

    fn wrong_type(&self, expected: &'static str) -> ReplyError {
        match self {
            ReplyValue::Error(msg) => ReplyError::Server(msg.clone()),
            other => ReplyError::WrongType {
                expected,
                actual: other.type_name(),
            },
        }
    }

    /// The status line, e.g. `"OK"` or `"QUEUED"`.
    pub fn as_status(&self) -> Result<&str, ReplyError> {
        match self {
            ReplyValue::Status(s) => Ok(s),
            other => Err(other.wrong_type("status")),
        }
    }

    /// The integer value of an `:n` reply.
    pub fn as_int(&self) -> Result<i64, ReplyError> {
        match self {
            ReplyValue::Integer(n) => Ok(*n),
            other => Err(other.wrong_type("integer")),
        }
    }

    /// The raw bytes of a bulk reply.
    pub fn as_bytes(&self) -> Result<&Bytes, ReplyError> {
        match self {
            ReplyValue::Bulk(data) => Ok(data),
            other => Err(other.wrong_type("bulk")),
        }
    }

    /// A UTF-8 view of a bulk reply (or of a status line, which is
    /// always UTF-8).
    pub fn as_str(&self) -> Result<&str, ReplyError> {
        match self {
            ReplyValue::Bulk(data) => {
                std::str::from_utf8(data).map_err(|_| ReplyError::NotUtf8)
            }
            ReplyValue::Status(s) => Ok(s),
            other => Err(other.wrong_type("bulk")),
        }
    }

    /// Consumes a multi-bulk reply into its children.
    pub fn into_vec(self) -> Result<Vec<ReplyValue>, ReplyError> {
        match self {
            ReplyValue::Array(items) => Ok(items),
            other => Err(other.wrong_type("multi-bulk")),
        }
    }
}
