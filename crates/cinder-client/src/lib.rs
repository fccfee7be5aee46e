//! cinder-client: the connection engine.
//!
//! Routes commands across a set of nodes with consistent hashing,
//! multiplexes traffic over per-node bounded connection pools, and
//! binds pipelined and transactional replies back to their commands in
//! submission order. Node failures are detected in-band and routed
//! around; a background task probes dead nodes back into rotation.
//!
//! ```no_run
//! use cinder_client::{Client, ClientConfig, Command, NodeConfig};
//!
//! # async fn demo() -> Result<(), cinder_client::ClientError> {
//! let client = Client::new(ClientConfig::new(vec![
//!     NodeConfig::new("10.0.0.1:6379"),
//!     NodeConfig::new("10.0.0.2:6379"),
//! ]))?;
//!
//! client
//!     .execute(Command::new("SET").key("greeting").arg("hello"))
//!     .await?;
//!
//! let mut batch = client.batch(false);
//! batch
//!     .cmd(Command::new("INCR").key("visits"))
//!     .cmd(Command::new("INCR").key("visits"));
//! let counts = batch.flush().await?;
//! # let _ = counts;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod node;
mod pool;
mod queue;
mod ring;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::{Batch, Client};
pub use config::{ClientConfig, KeyTransform, NodeConfig};
pub use connection::Connection;
pub use error::ClientError;
pub use node::{Node, NodeId};

pub use cinder_protocol::{Command, ReplyError, ReplyValue};
