//! Scripted wire-level servers for exercising the engine in tests.
//!
//! The mock decodes inbound command frames with the crate's own decoder
//! (command frames are one-level multi-bulks, so the incremental path
//! handles them) and writes canned reply bytes, optionally split into
//! small chunks to exercise resumable decoding on the client side.

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use cinder_protocol::{ReplyDecoder, ReplyValue};

/// One canned exchange: absorb `expect` command frames, then write
/// `reply`, optionally dribbled in `chunk`-byte pieces.
pub(crate) struct Script {
    expect: usize,
    reply: Vec<u8>,
    chunk: usize,
}

impl Script {
    /// Reply written in a single burst.
    pub(crate) fn whole(expect: usize, reply: &[u8]) -> Self {
        Self {
            expect,
            reply: reply.to_vec(),
            chunk: 0,
        }
    }

    /// Reply dribbled out `chunk` bytes at a time.
    pub(crate) fn chunked(expect: usize, reply: &[u8], chunk: usize) -> Self {
        Self {
            expect,
            reply: reply.to_vec(),
            chunk,
        }
    }
}

/// A scripted server on an ephemeral port.
///
/// Accepts one connection, plays the scripts in order, then keeps
/// reading until the peer goes away — a pooled connection revisited by
/// a later checkout must not find a dead socket.
pub(crate) struct MockServer {
    addr: String,
    handle: JoinHandle<Vec<Vec<String>>>,
}

impl MockServer {
    pub(crate) async fn start(scripts: Vec<Script>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(serve(listener, scripts));
        Self { addr, handle }
    }

    pub(crate) fn addr(&self) -> &str {
        &self.addr
    }

    /// Waits for the client side to close and returns every command
    /// frame received, flattened to strings in arrival order.
    pub(crate) async fn finish(self) -> Vec<Vec<String>> {
        self.handle.await.unwrap()
    }
}

async fn serve(listener: TcpListener, scripts: Vec<Script>) -> Vec<Vec<String>> {
    let (mut sock, _) = listener.accept().await.unwrap();
    let mut decoder = ReplyDecoder::new();
    let mut buf = BytesMut::new();
    let mut received = Vec::new();

    for script in &scripts {
        let mut pending = script.expect;
        while pending > 0 {
            if let Some(frame) = decoder.decode(&mut buf).unwrap() {
                received.push(flatten(frame));
                pending -= 1;
                continue;
            }
            let n = sock.read_buf(&mut buf).await.unwrap();
            if n == 0 {
                return received;
            }
        }
        if script.chunk == 0 {
            sock.write_all(&script.reply).await.unwrap();
            sock.flush().await.unwrap();
        } else {
            for piece in script.reply.chunks(script.chunk) {
                sock.write_all(piece).await.unwrap();
                sock.flush().await.unwrap();
                tokio::task::yield_now().await;
            }
        }
    }

    // drain whatever else arrives until the peer closes
    loop {
        while let Some(frame) = decoder.decode(&mut buf).unwrap() {
            received.push(flatten(frame));
        }
        match sock.read_buf(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }
    received
}

/// Command frame to a list of lossy strings for easy assertions.
fn flatten(frame: ReplyValue) -> Vec<String> {
    match frame {
        ReplyValue::Array(items) => items
            .into_iter()
            .map(|item| match item {
                ReplyValue::Bulk(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                other => format!("{other:?}"),
            })
            .collect(),
        other => vec![format!("{other:?}")],
    }
}

/// Accepts connections forever on `addr`, answering every decoded frame
/// with the same canned reply. Stands in for a node that came back from
/// the dead: it satisfies liveness probes and real commands alike.
pub(crate) async fn echo_server(addr: &str, reply: &'static [u8]) -> JoinHandle<()> {
    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut decoder = ReplyDecoder::new();
                let mut buf = BytesMut::new();
                loop {
                    match decoder.decode(&mut buf) {
                        Ok(Some(_)) => {
                            if sock.write_all(reply).await.is_err() {
                                break;
                            }
                            let _ = sock.flush().await;
                        }
                        Ok(None) => match sock.read_buf(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(_) => {}
                        },
                        Err(_) => break,
                    }
                }
            });
        }
    })
}
