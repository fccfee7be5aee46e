//! A single framed connection to one node.

use std::io::ErrorKind;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use cinder_protocol::{Command, ReplyDecoder, ReplyHeader, ReplyValue};

use crate::error::ClientError;

/// Initial capacity of the read and write buffers.
const BUF_CAP: usize = 8 * 1024;

/// One TCP connection plus the buffers and decoder state that belong to
/// its reply stream.
///
/// A connection is driven by one logical flow of control at a time:
/// writes and reads are awaited immediately, never overlapped. Anything
/// that leaves the reply stream in an unknown position (an I/O error, a
/// decode error, a timeout mid-reply) makes the connection unusable and
/// it must be discarded, not pooled.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    decoder: ReplyDecoder,
    read_buf: BytesMut,
    write_buf: BytesMut,
    io_timeout: Duration,
    authorized: bool,
    selected_db: u32,
    last_used: Instant,
}

impl Connection {
    /// Dials `addr` under `connect_timeout` and disables Nagle; the small
    /// frames of this protocol suffer badly from write coalescing.
    pub(crate) async fn connect(
        addr: &str,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout(addr.to_string()))??;
        stream.set_nodelay(true)?;
        debug!(addr, "connection established");
        Ok(Self {
            stream,
            decoder: ReplyDecoder::new(),
            read_buf: BytesMut::with_capacity(BUF_CAP),
            write_buf: BytesMut::with_capacity(BUF_CAP),
            io_timeout,
            authorized: false,
            selected_db: 0,
            last_used: Instant::now(),
        })
    }

    /// Serializes `frames` into one buffer and writes it with a single
    /// syscall-friendly `write_all`. This is the pipelining primitive:
    /// one write per batch, however many commands it carries.
    pub async fn send<'a, I>(&mut self, frames: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = &'a Command>,
    {
        self.write_buf.clear();
        let mut count = 0usize;
        for command in frames {
            command.serialize(&mut self.write_buf);
            count += 1;
        }
        trace!(frames = count, bytes = self.write_buf.len(), "send");
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        self.last_used = Instant::now();
        Ok(())
    }

    /// Reads exactly one reply, resuming the decoder across however many
    /// socket reads it takes. Each read is bounded by the I/O timeout.
    pub async fn read_reply(&mut self) -> Result<ReplyValue, ClientError> {
        loop {
            if let Some(value) = self.decoder.decode(&mut self.read_buf)? {
                return Ok(value);
            }
            self.fill_read_buf().await?;
        }
    }

    /// Reads the next reply shallowly: a multi-bulk yields only its
    /// declared child count, leaving the children to be read one
    /// [`Connection::read_reply`] call at a time.
    pub(crate) async fn read_header(&mut self) -> Result<ReplyHeader, ClientError> {
        loop {
            if let Some(header) = self.decoder.decode_header(&mut self.read_buf)? {
                return Ok(header);
            }
            self.fill_read_buf().await?;
        }
    }

    async fn fill_read_buf(&mut self) -> Result<(), ClientError> {
        let n = timeout(self.io_timeout, self.stream.read_buf(&mut self.read_buf))
            .await
            .map_err(|_| ClientError::IoTimeout)??;
        if n == 0 {
            return Err(ClientError::Disconnected);
        }
        trace!(bytes = n, "recv");
        Ok(())
    }

    /// Sends AUTH and verifies the reply. A rejection is fatal to the
    /// connection.
    pub(crate) async fn authenticate(&mut self, password: &str) -> Result<(), ClientError> {
        let auth = Command::new("AUTH").arg(password.to_string());
        self.send([&auth]).await?;
        match self.read_reply().await? {
            ReplyValue::Status(s) if s == "OK" => {
                self.authorized = true;
                Ok(())
            }
            ReplyValue::Error(msg) => Err(ClientError::Auth(msg)),
            other => Err(ClientError::UnexpectedReply(format!(
                "AUTH answered with {}",
                other.type_name()
            ))),
        }
    }

    /// Sends SELECT and verifies the reply.
    pub(crate) async fn select_db(&mut self, db: u32) -> Result<(), ClientError> {
        let select = Command::new("SELECT").arg(db.to_string());
        self.send([&select]).await?;
        match self.read_reply().await? {
            ReplyValue::Status(s) if s == "OK" => {
                self.selected_db = db;
                Ok(())
            }
            ReplyValue::Error(msg) => Err(ClientError::Select(msg)),
            other => Err(ClientError::UnexpectedReply(format!(
                "SELECT answered with {}",
                other.type_name()
            ))),
        }
    }

    /// Throws away anything left unread by a previous checkout and
    /// detects a peer that closed while the connection sat in the pool.
    ///
    /// Returns false when the connection is no longer usable.
    pub(crate) fn drain_stale(&mut self) -> bool {
        self.read_buf.clear();
        self.decoder.reset();
        let mut scratch = [0u8; 512];
        loop {
            match self.stream.try_read(&mut scratch) {
                Ok(0) => return false,
                Ok(n) => trace!(bytes = n, "discarded stale bytes"),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return true,
                Err(_) => return false,
            }
        }
    }

    pub(crate) fn is_authorized(&self) -> bool {
        self.authorized
    }

    pub(crate) fn set_authorized(&mut self) {
        self.authorized = true;
    }

    pub(crate) fn selected_db(&self) -> u32 {
        self.selected_db
    }

    pub(crate) fn set_selected_db(&mut self, db: u32) {
        self.selected_db = db;
    }

    /// Time since the connection last touched the wire.
    pub(crate) fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }
}
