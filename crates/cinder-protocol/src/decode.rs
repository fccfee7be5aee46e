//! Incremental reply decoding.
//!
//! [`ReplyDecoder`] is a resumable state machine fed arbitrary byte chunks.
//! The caller reads from the network into a buffer and calls
//! [`ReplyDecoder::decode`] after each read; the decoder consumes as many
//! bytes as it can, holds partial frame state across calls, and emits one
//! [`ReplyValue`] as soon as a complete reply is available. A reply split
//! across any number of reads — even one byte at a time — decodes
//! identically to a reply delivered whole.
//!
//! # One level of nesting
//!
//! Multi-bulk replies are decoded by delegating each child to an inner
//! decoder that refuses a further `*` prefix. Every single-command reply
//! fits in that shape. The one aggregate that doesn't — a transaction's
//! EXEC result, an array of whole per-command replies — is read
//! reply-by-reply directly off the connection by the command queue, not
//! through this automaton.

use bytes::{Buf, BytesMut};

use crate::error::ProtocolError;
use crate::types::ReplyValue;

/// Maximum length of a bulk payload in bytes (512 MB, matching the server).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Maximum number of children in a multi-bulk reply.
const MAX_MULTI_BULK: i64 = 1_048_576;

/// Maximum bytes accumulated for one `\r\n`-terminated line (status or
/// error text, or a numeric header). Real lines are tiny; a peer that
/// streams line bytes without ever sending the terminator hits this cap
/// instead of growing the buffer forever.
const MAX_LINE_LEN: usize = 64 * 1024;

/// Cap for upfront reservations derived from declared lengths. A header is
/// attacker-controlled until the payload actually arrives; reserve modestly
/// and let the buffer grow geometrically with real bytes.
const PREALLOC_CAP: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Status,
    Error,
    Integer,
    BulkLen,
    MultiLen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the type prefix of the next reply.
    Type,
    /// Accumulating line bytes up to the `\r`.
    Line(LineKind),
    /// Line complete; the `\n` after the `\r` has not arrived yet.
    LineLf(LineKind),
    /// Collecting a declared number of bulk payload bytes.
    BulkBody,
    /// Payload complete; consuming the trailing `\r`.
    BulkCr,
    /// Consuming the trailing `\n`.
    BulkLf,
    /// Feeding the inner decoder until all children have arrived.
    Children,
}

/// Shallow view of the next reply, used when an aggregate's children are
/// to be read individually off the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyHeader {
    /// A complete non-aggregate reply.
    Value(ReplyValue),
    /// A `*<count>` header; the child replies follow on the stream.
    Array(usize),
    /// A `*-1` null multi-bulk.
    NilArray,
}

/// Resumable decoder for a stream of replies.
///
/// One decoder belongs to one connection: its internal state mirrors the
/// byte position inside that connection's reply stream. After a decode
/// error the stream position is unrecoverable and the connection must be
/// discarded.
#[derive(Debug)]
pub struct ReplyDecoder {
    state: State,
    /// Accumulates the current `\r\n`-terminated line.
    line: BytesMut,
    /// Accumulates the current bulk payload.
    payload: BytesMut,
    /// Declared bulk payload length, once the header line is in.
    expected: usize,
    /// Declared multi-bulk child count, once the header line is in.
    wanted: usize,
    children: Vec<ReplyValue>,
    /// Inner decoder for multi-bulk children; exists only while children
    /// are being collected.
    child: Option<Box<ReplyDecoder>>,
    /// Child decoders reject `*` so the incremental path stays one level
    /// deep.
    nested: bool,
}

impl ReplyDecoder {
    /// Creates a decoder in its initial state.
    pub fn new() -> Self {
        ReplyDecoder {
            state: State::Type,
            line: BytesMut::new(),
            payload: BytesMut::new(),
            expected: 0,
            wanted: 0,
            children: Vec::new(),
            child: None,
            nested: false,
        }
    }

    fn child() -> Self {
        ReplyDecoder {
            nested: true,
            ..ReplyDecoder::new()
        }
    }

    /// Discards any partially decoded frame and returns to the initial
    /// state. Used when a pooled connection is re-validated and stray
    /// unread bytes were thrown away.
    pub fn reset(&mut self) {
        self.state = State::Type;
        self.line.clear();
        self.payload.clear();
        self.expected = 0;
        self.wanted = 0;
        self.children.clear();
        self.child = None;
    }

    /// Consumes bytes from `src`, advancing the automaton.
    ///
    /// Returns `Ok(Some(reply))` as soon as one complete reply has been
    /// decoded (leaving any following bytes in `src` untouched), or
    /// `Ok(None)` once `src` is exhausted mid-frame — the caller should
    /// read more bytes into `src` and call again.
    ///
    /// # Errors
    ///
    /// Malformed framing: unknown prefix byte, non-numeric length line,
    /// out-of-range declared length, `\r` without `\n`, or a nested
    /// multi-bulk. All of these poison the stream; the decoder must not
    /// be fed further bytes from the same connection.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ReplyValue>, ProtocolError> {
        loop {
            match self.state {
                State::Type => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let prefix = src[0];
                    src.advance(1);
                    self.state = match prefix {
                        b'+' => State::Line(LineKind::Status),
                        b'-' => State::Line(LineKind::Error),
                        b':' => State::Line(LineKind::Integer),
                        b'$' => State::Line(LineKind::BulkLen),
                        b'*' if self.nested => return Err(ProtocolError::NestedArray),
                        b'*' => State::Line(LineKind::MultiLen),
                        other => return Err(ProtocolError::InvalidPrefix(other)),
                    };
                }

                State::Line(kind) => match memchr::memchr(b'\r', src) {
                    Some(i) => {
                        if self.line.len() + i > MAX_LINE_LEN {
                            return Err(ProtocolError::LineTooLong(self.line.len() + i));
                        }
                        self.line.extend_from_slice(&src[..i]);
                        src.advance(i + 1);
                        self.state = State::LineLf(kind);
                    }
                    None => {
                        if self.line.len() + src.len() > MAX_LINE_LEN {
                            return Err(ProtocolError::LineTooLong(
                                self.line.len() + src.len(),
                            ));
                        }
                        self.line.extend_from_slice(src);
                        src.clear();
                        return Ok(None);
                    }
                },

                State::LineLf(kind) => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    if src[0] != b'\n' {
                        return Err(ProtocolError::MissingTerminator);
                    }
                    src.advance(1);
                    if let Some(value) = self.finish_line(kind)? {
                        return Ok(Some(self.emit(value)));
                    }
                }

                State::BulkBody => {
                    let take = (self.expected - self.payload.len()).min(src.len());
                    self.payload.extend_from_slice(&src[..take]);
                    src.advance(take);
                    if self.payload.len() < self.expected {
                        return Ok(None);
                    }
                    self.state = State::BulkCr;
                }

                State::BulkCr => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    if src[0] != b'\r' {
                        return Err(ProtocolError::MissingTerminator);
                    }
                    src.advance(1);
                    self.state = State::BulkLf;
                }

                State::BulkLf => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    if src[0] != b'\n' {
                        return Err(ProtocolError::MissingTerminator);
                    }
                    src.advance(1);
                    let data = self.payload.split().freeze();
                    return Ok(Some(self.emit(ReplyValue::Bulk(data))));
                }

                State::Children => {
                    let decoded = self
                        .child
                        .get_or_insert_with(|| Box::new(ReplyDecoder::child()))
                        .decode(src)?;
                    match decoded {
                        Some(value) => {
                            self.children.push(value);
                            if self.children.len() == self.wanted {
                                let items = std::mem::take(&mut self.children);
                                return Ok(Some(self.emit(ReplyValue::Array(items))));
                            }
                        }
                        None => return Ok(None),
                    }
                }
            }
        }
    }

    /// Decodes the next reply shallowly: scalar and bulk replies come
    /// back whole, but a multi-bulk yields only its declared child count,
    /// leaving the children on the stream to be decoded one
    /// [`ReplyDecoder::decode`] call at a time.
    ///
    /// Same incremental contract as [`ReplyDecoder::decode`]: returns
    /// `Ok(None)` until enough bytes have arrived. The command queue uses
    /// this for EXEC results, whose children are whole replies and may
    /// themselves be multi-bulks (see the module docs on nesting).
    pub fn decode_header(
        &mut self,
        src: &mut BytesMut,
    ) -> Result<Option<ReplyHeader>, ProtocolError> {
        if self.state != State::Type {
            // A non-aggregate reply is partway through; finish it.
            return Ok(self.decode(src)?.map(ReplyHeader::Value));
        }
        match src.first() {
            Some(&b'*') => {
                // The header is one line. Nothing is consumed until the
                // whole line is present, so no state needs saving.
                let Some(cr) = memchr::memchr(b'\r', src) else {
                    if src.len() > MAX_LINE_LEN {
                        return Err(ProtocolError::LineTooLong(src.len()));
                    }
                    return Ok(None);
                };
                if src.len() < cr + 2 {
                    return Ok(None);
                }
                if src[cr + 1] != b'\n' {
                    return Err(ProtocolError::MissingTerminator);
                }
                let count = parse_i64(&src[1..cr])?;
                src.advance(cr + 2);
                match count {
                    -1 => Ok(Some(ReplyHeader::NilArray)),
                    c if c < 0 => Err(ProtocolError::InvalidLength(c)),
                    c if c > MAX_MULTI_BULK => {
                        Err(ProtocolError::TooManyElements(c as usize))
                    }
                    c => Ok(Some(ReplyHeader::Array(c as usize))),
                }
            }
            _ => Ok(self.decode(src)?.map(ReplyHeader::Value)),
        }
    }

    /// Interprets a completed line. Returns a value to emit for the
    /// scalar kinds, or `None` after transitioning into a bulk/multi-bulk
    /// body state.
    fn finish_line(&mut self, kind: LineKind) -> Result<Option<ReplyValue>, ProtocolError> {
        match kind {
            LineKind::Status => {
                let s = take_utf8(&mut self.line, "status")?;
                Ok(Some(ReplyValue::Status(s)))
            }
            LineKind::Error => {
                let s = take_utf8(&mut self.line, "error")?;
                Ok(Some(ReplyValue::Error(s)))
            }
            LineKind::Integer => {
                let n = parse_i64(&self.line)?;
                self.line.clear();
                Ok(Some(ReplyValue::Integer(n)))
            }
            LineKind::BulkLen => {
                let len = parse_i64(&self.line)?;
                self.line.clear();
                if len == -1 {
                    return Ok(Some(ReplyValue::Nil));
                }
                if len < 0 {
                    return Err(ProtocolError::InvalidLength(len));
                }
                if len > MAX_BULK_LEN {
                    return Err(ProtocolError::BulkTooLarge(len as usize));
                }
                self.expected = len as usize;
                self.payload.reserve(self.expected.min(PREALLOC_CAP));
                self.state = if self.expected == 0 {
                    State::BulkCr
                } else {
                    State::BulkBody
                };
                Ok(None)
            }
            LineKind::MultiLen => {
                let count = parse_i64(&self.line)?;
                self.line.clear();
                if count == -1 {
                    return Ok(Some(ReplyValue::Nil));
                }
                if count < 0 {
                    return Err(ProtocolError::InvalidLength(count));
                }
                if count > MAX_MULTI_BULK {
                    return Err(ProtocolError::TooManyElements(count as usize));
                }
                if count == 0 {
                    return Ok(Some(ReplyValue::Array(Vec::new())));
                }
                self.wanted = count as usize;
                self.children = Vec::with_capacity(self.wanted.min(PREALLOC_CAP));
                self.state = State::Children;
                Ok(None)
            }
        }
    }

    /// Resets for the next reply and hands `value` back to the caller.
    fn emit(&mut self, value: ReplyValue) -> ReplyValue {
        self.reset();
        value
    }
}

impl Default for ReplyDecoder {
    fn default() -> Self {
        ReplyDecoder::new()
    }
}

/// Takes the accumulated line as a UTF-8 string, clearing the buffer.
fn take_utf8(line: &mut BytesMut, what: &'static str) -> Result<String, ProtocolError> {
    let s = std::str::from_utf8(line)
        .map_err(|_| ProtocolError::InvalidUtf8(what))?
        .to_owned();
    line.clear();
    Ok(s)
}

/// Parses an optionally-signed decimal line without allocating.
///
/// Negative values accumulate in the negative direction so that
/// `i64::MIN` is representable without overflow.
fn parse_i64(digits: &[u8]) -> Result<i64, ProtocolError> {
    let (negative, digits) = match digits.split_first() {
        Some((&b'-', rest)) => (true, rest),
        _ => (false, digits),
    };

    if digits.is_empty() {
        return Err(ProtocolError::InvalidInteger);
    }

    let mut n: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(ProtocolError::InvalidInteger);
        }
        let d = (b - b'0') as i64;
        n = n
            .checked_mul(10)
            .and_then(|n| if negative { n.checked_sub(d) } else { n.checked_add(d) })
            .ok_or(ProtocolError::InvalidInteger)?;
    }
    Ok(n)
}
