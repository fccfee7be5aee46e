//! Client command representation and request framing.
//!
//! A [`Command`] is a verb name plus an ordered argument list. There is no
//! per-verb type: callers (or thin convenience wrappers living outside this
//! crate) assemble whatever argument shape the server expects. Arguments
//! added with [`Command::key`] are additionally flagged as routing keys so
//! the dispatcher can decide which node owns the command — the wire
//! representation is identical either way.

use bytes::{BufMut, Bytes, BytesMut};

use crate::serialize::write_i64;

/// A single command ready to be framed onto the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<Bytes>,
    /// Indices into `args` that participate in routing.
    key_indices: Vec<usize>,
}

impl Command {
    /// Creates a command with the given verb name and no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Command {
            name: name.into(),
            args: Vec::new(),
            key_indices: Vec::new(),
        }
    }

    /// Appends a plain argument.
    pub fn arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends an argument that is also a routing key.
    pub fn key(mut self, key: impl Into<Bytes>) -> Self {
        self.key_indices.push(self.args.len());
        self.args.push(key.into());
        self
    }

    /// The verb name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All arguments, in order, keys included.
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Number of arguments flagged as routing keys.
    pub fn key_count(&self) -> usize {
        self.key_indices.len()
    }

    /// The `i`-th routing key (in the order the keys were added).
    ///
    /// # Panics
    ///
    /// Panics if `i >= key_count()`.
    pub fn key_at(&self, i: usize) -> &Bytes {
        &self.args[self.key_indices[i]]
    }

    /// Replaces the `i`-th routing key in place. Used by the dispatcher
    /// when a key-transform hook rewrites keys before routing.
    ///
    /// # Panics
    ///
    /// Panics if `i >= key_count()`.
    pub fn set_key_at(&mut self, i: usize, key: Bytes) {
        let idx = self.key_indices[i];
        self.args[idx] = key;
    }

    /// Serializes this command as a request frame into the buffer:
    /// `*<argc>\r\n` followed by one `$<len>\r\n<bytes>\r\n` bulk per
    /// element, the verb name first. Payload bytes are written verbatim;
    /// the framing is length-prefixed, so values are binary-safe.
    pub fn serialize(&self, dst: &mut BytesMut) {
        dst.put_u8(b'*');
        write_i64(1 + self.args.len() as i64, dst);
        dst.put_slice(b"\r\n");

        write_bulk(self.name.as_bytes(), dst);
        for arg in &self.args {
            write_bulk(arg, dst);
        }
    }
}

fn write_bulk(data: &[u8], dst: &mut BytesMut) {
    dst.put_u8(b'$');
    write_i64(data.len() as i64, dst);
    dst.put_slice(b"\r\n");
    dst.put_slice(data);
    dst.put_slice(b"\r\n");
}
