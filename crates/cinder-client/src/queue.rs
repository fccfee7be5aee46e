//! Batched command execution with strict FIFO reply binding.
//!
//! One batch is one conversation on one connection: every frame that
//! goes out — injected control commands included — has exactly one reply
//! coming back, in order. Binding replies to commands is therefore pure
//! positional accounting; nothing in the reply stream identifies its
//! command.

use tracing::{debug, trace};

use cinder_protocol::{Command, ReplyHeader, ReplyValue};

use crate::connection::Connection;
use crate::error::ClientError;

/// How a batch is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueMode {
    /// One command, flushed as it is enqueued. The degenerate pipeline.
    Immediate,
    /// All pending frames in one write; replies bound first-in-first-out.
    Pipelined,
    /// Pending frames wrapped in MULTI/EXEC; results arrive inside the
    /// EXEC aggregate.
    Transactional,
}

/// One slot in the ordered send/receive sequence.
enum Entry<'a> {
    Auth(Command),
    Select(Command),
    Multi(Command),
    Exec(Command),
    /// A caller command and the index its reply binds to.
    User(usize, &'a Command),
}

impl Entry<'_> {
    fn command(&self) -> &Command {
        match self {
            Entry::Auth(c) | Entry::Select(c) | Entry::Multi(c) | Entry::Exec(c) => c,
            Entry::User(_, c) => c,
        }
    }
}

/// Runs one batch over `conn`: a single buffered write of every frame,
/// then one reply read per frame, bound positionally.
///
/// Returns exactly `commands.len()` results in submission order. Server
/// `-` replies to user commands are results, not errors; an `Err` from
/// here means the conversation itself broke and the connection must be
/// discarded.
pub(crate) async fn run_batch(
    conn: &mut Connection,
    mode: QueueMode,
    commands: &[Command],
    password: Option<&str>,
    database: u32,
) -> Result<Vec<ReplyValue>, ClientError> {
    if commands.is_empty() {
        return Ok(Vec::new());
    }

    let transactional = mode == QueueMode::Transactional;

    // Assemble the ordered sequence. Injected control frames ride the
    // same FIFO as user commands, so positional binding holds for the
    // whole conversation.
    let mut sequence: Vec<Entry<'_>> = Vec::with_capacity(commands.len() + 4);
    if let Some(password) = password {
        if !conn.is_authorized() {
            debug!("injecting AUTH ahead of batch");
            sequence.push(Entry::Auth(
                Command::new("AUTH").arg(password.to_string()),
            ));
        }
    }
    if conn.selected_db() != database {
        debug!(database, "injecting SELECT ahead of batch");
        sequence.push(Entry::Select(
            Command::new("SELECT").arg(database.to_string()),
        ));
    }
    if transactional {
        sequence.push(Entry::Multi(Command::new("MULTI")));
    }
    for (slot, command) in commands.iter().enumerate() {
        sequence.push(Entry::User(slot, command));
    }
    if transactional {
        sequence.push(Entry::Exec(Command::new("EXEC")));
    }

    conn.send(sequence.iter().map(Entry::command)).await?;
    trace!(?mode, commands = commands.len(), "batch written, reading replies");

    let mut results: Vec<Option<ReplyValue>> = Vec::new();
    results.resize_with(commands.len(), || None);

    for entry in &sequence {
        match entry {
            Entry::Auth(_) => match conn.read_reply().await? {
                ReplyValue::Status(s) if s == "OK" => conn.set_authorized(),
                ReplyValue::Error(msg) => return Err(ClientError::Auth(msg)),
                other => {
                    return Err(ClientError::UnexpectedReply(format!(
                        "AUTH answered with {}",
                        other.type_name()
                    )))
                }
            },
            Entry::Select(_) => match conn.read_reply().await? {
                ReplyValue::Status(s) if s == "OK" => conn.set_selected_db(database),
                ReplyValue::Error(msg) => return Err(ClientError::Select(msg)),
                other => {
                    return Err(ClientError::UnexpectedReply(format!(
                        "SELECT answered with {}",
                        other.type_name()
                    )))
                }
            },
            Entry::Multi(_) => match conn.read_reply().await? {
                ReplyValue::Status(s) if s == "OK" => {}
                other => {
                    return Err(ClientError::TransactionMismatch(format!(
                        "MULTI not accepted, answered with {}",
                        other.type_name()
                    )))
                }
            },
            Entry::User(slot, _) if transactional => match conn.read_reply().await? {
                // queue-phase acknowledgement; a rejection becomes that
                // command's result and reading continues so the stream
                // stays drained
                ReplyValue::Status(s) if s == "QUEUED" => {}
                ReplyValue::Error(msg) => results[*slot] = Some(ReplyValue::Error(msg)),
                other => {
                    return Err(ClientError::TransactionMismatch(format!(
                        "expected QUEUED for command {}, got {}",
                        slot,
                        other.type_name()
                    )))
                }
            },
            Entry::User(slot, _) => {
                results[*slot] = Some(conn.read_reply().await?);
            }
            Entry::Exec(_) => read_exec(conn, &mut results).await?,
        }
    }

    // Every slot is filled on the paths above; a hole means the
    // accounting broke.
    results
        .into_iter()
        .map(|slot| {
            slot.ok_or_else(|| ClientError::TransactionMismatch("reply never bound".into()))
        })
        .collect()
}

/// Reads the EXEC aggregate and resolves the commands still waiting.
///
/// The aggregate's children are whole replies (multi-bulks included), so
/// they are read one at a time off the connection rather than through
/// the one-level decode path.
async fn read_exec(
    conn: &mut Connection,
    results: &mut [Option<ReplyValue>],
) -> Result<(), ClientError> {
    let open = results.iter().filter(|slot| slot.is_none()).count();
    match conn.read_header().await? {
        ReplyHeader::Array(count) => {
            if count != open {
                return Err(ClientError::TransactionMismatch(format!(
                    "EXEC declared {count} results for {open} queued commands"
                )));
            }
            // children arrive in queue order; commands rejected at queue
            // time keep their own error and consume no child
            let mut open_slots = results.iter_mut().filter(|slot| slot.is_none());
            for _ in 0..count {
                let child = conn.read_reply().await?;
                if let Some(slot) = open_slots.next() {
                    *slot = Some(child);
                }
            }
            Ok(())
        }
        ReplyHeader::Value(ReplyValue::Error(msg)) => {
            // the server refused the whole transaction; every command
            // without a queue-phase result shares that failure
            for slot in results.iter_mut().filter(|slot| slot.is_none()) {
                *slot = Some(ReplyValue::Error(msg.clone()));
            }
            Ok(())
        }
        ReplyHeader::NilArray => {
            for slot in results.iter_mut().filter(|slot| slot.is_none()) {
                *slot = Some(ReplyValue::Error(
                    "transaction discarded before execution".into(),
                ));
            }
            Ok(())
        }
        ReplyHeader::Value(other) => Err(ClientError::TransactionMismatch(format!(
            "EXEC answered with {}",
            other.type_name()
        ))),
    }
}
