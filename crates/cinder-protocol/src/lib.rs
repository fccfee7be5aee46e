//! cinder-protocol: wire codec for the key-value client engine.
//!
//! Provides request framing for commands and a resumable, incremental
//! decoder for server replies. The decoder is a state machine that
//! tolerates frames split across any number of network reads, which is
//! what lets the engine pipeline many commands over one buffered socket.
//!
//! # quick start
//!
//! ```
//! use bytes::BytesMut;
//! use cinder_protocol::{Command, ReplyDecoder, ReplyValue};
//!
//! // frame a command
//! let mut out = BytesMut::new();
//! Command::new("SET").key("foo").arg("bar").serialize(&mut out);
//! assert_eq!(&out[..], b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
//!
//! // decode a reply, possibly split across reads
//! let mut decoder = ReplyDecoder::new();
//! let mut buf = BytesMut::from(&b"+OK"[..]);
//! assert_eq!(decoder.decode(&mut buf).unwrap(), None);
//! buf.extend_from_slice(b"\r\n");
//! assert_eq!(
//!     decoder.decode(&mut buf).unwrap(),
//!     Some(ReplyValue::Status("OK".into()))
//! );
//! ```

pub mod command;
pub mod decode;
pub mod error;
mod serialize;
pub mod types;

pub use command::Command;
pub use decode::{ReplyDecoder, ReplyHeader};
pub use error::ProtocolError;
pub use types::{ReplyError, ReplyValue};
