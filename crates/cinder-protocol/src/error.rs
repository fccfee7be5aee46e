//! Protocol error types for reply decoding.

use thiserror::Error;

/// Errors raised while decoding the reply wire format.
///
/// Any of these is fatal to the connection that produced the bytes: once
/// framing is lost there is no way to resynchronize mid-stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The first byte of a reply didn't match any known type prefix.
    #[error("invalid type prefix: {0:#04x}")]
    InvalidPrefix(u8),

    /// A length or integer line contained something other than an
    /// optionally-signed decimal number.
    #[error("invalid integer encoding")]
    InvalidInteger,

    /// A bulk or multi-bulk header declared a negative length other
    /// than the -1 null marker.
    #[error("invalid declared length: {0}")]
    InvalidLength(i64),

    /// A bulk header declared a payload larger than the decoder is
    /// willing to buffer.
    #[error("bulk value too large: {0} bytes")]
    BulkTooLarge(usize),

    /// A status, error, or length line ran past the decoder's cap
    /// without a `\r\n` terminator arriving.
    #[error("reply line too long: {0} bytes")]
    LineTooLong(usize),

    /// A multi-bulk header declared more children than the decoder is
    /// willing to allocate for.
    #[error("too many multi-bulk elements: {0}")]
    TooManyElements(usize),

    /// A multi-bulk child was itself a multi-bulk. The incremental
    /// decoder handles one level of nesting; deeper aggregates are read
    /// reply-by-reply off the connection instead.
    #[error("nested multi-bulk reply in incremental decode")]
    NestedArray,

    /// A `\r` was not followed by `\n` where a line terminator was
    /// required, or a bulk payload was not followed by `\r\n`.
    #[error("missing \\r\\n terminator")]
    MissingTerminator,

    /// A status or error line was not valid UTF-8.
    #[error("invalid utf-8 in {0} line")]
    InvalidUtf8(&'static str),
}
