//! Direct-to-buffer reply serialization.
//!
//! The engine itself only ever *decodes* replies; this impl exists for the
//! other side of the wire — mock servers in tests and benchmark input
//! construction — and keeps encode/decode symmetry testable in one place.

use bytes::{BufMut, BytesMut};

use crate::types::ReplyValue;

impl ReplyValue {
    /// Serializes this reply into the provided buffer, including type
    /// prefix and trailing `\r\n` delimiters.
    ///
    /// `Nil` is written as the null bulk marker `$-1\r\n`.
    pub fn serialize(&self, dst: &mut BytesMut) {
        match self {
            ReplyValue::Status(s) => {
                dst.put_u8(b'+');
                dst.put_slice(s.as_bytes());
                dst.put_slice(b"\r\n");
            }
            ReplyValue::Error(msg) => {
                dst.put_u8(b'-');
                dst.put_slice(msg.as_bytes());
                dst.put_slice(b"\r\n");
            }
            ReplyValue::Integer(n) => {
                dst.put_u8(b':');
                write_i64(*n, dst);
                dst.put_slice(b"\r\n");
            }
            ReplyValue::Bulk(data) => {
                dst.put_u8(b'$');
                write_i64(data.len() as i64, dst);
                dst.put_slice(b"\r\n");
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            ReplyValue::Array(items) => {
                dst.put_u8(b'*');
                write_i64(items.len() as i64, dst);
                dst.put_slice(b"\r\n");
                for item in items {
                    item.serialize(dst);
                }
            }
            ReplyValue::Nil => {
                dst.put_slice(b"$-1\r\n");
            }
        }
    }
}

/// Writes an i64 as its decimal ASCII representation directly into the buffer.
pub(crate) fn write_i64(val: i64, dst: &mut BytesMut) {
    let mut buf = itoa::Buffer::new();
    dst.put_slice(buf.format(val).as_bytes());
}
