//! Interactive REPL over the engine.
//!
//! rustyline drives line editing, history, and tab-completion. Input is
//! tokenized and routed through the client — no argument validation
//! here; the server is the authority. Local meta-commands manage
//! batches and show node health.

use std::borrow::Cow;
use std::io::Write;
use std::path::PathBuf;

use cinder_client::{Batch, Client, ClientConfig};
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, Editor, Helper};

use crate::commands::{build_command, command_names, commands_by_group, find_command};
use crate::format::format_reply;

/// Meta-commands handled locally, never sent to a server.
const META_COMMANDS: &[(&str, &str)] = &[
    (".begin", "open a pipelined batch"),
    (".begintx", "open a MULTI/EXEC transaction"),
    (".flush", "send the open batch and print its results"),
    (".discard", "abandon the open batch"),
    (".nodes", "show configured nodes and their liveness"),
];

/// Plain local words, completed lowercase.
const LOCAL_WORDS: &[&str] = &["help", "quit", "exit", "clear"];

/// Runs the interactive loop. Blocks the calling thread; the runtime
/// lives here because rustyline needs the main thread for terminal I/O.
pub fn run_repl(config: ClientConfig, label: &str) {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}", format!("failed to create runtime: {e}").red());
            return;
        }
    };

    // no I/O yet; connections are dialed per command
    let client = match rt.block_on(async { Client::new(config) }) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", format!("error: {e}").red());
            return;
        }
    };

    let editor_config = Config::builder()
        .completion_type(CompletionType::List)
        .build();
    let mut rl = match Editor::with_config(editor_config) {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}", format!("failed to create editor: {e}").red());
            return;
        }
    };
    rl.set_helper(Some(CinderHelper));

    let history_path = history_file();
    if let Some(path) = &history_path {
        let _ = rl.load_history(path);
    }

    // at most one batch open at a time; the prompt shows its state
    let mut pending: Option<(Batch, &'static str)> = None;

    loop {
        let prompt = match &pending {
            Some((batch, kind)) => format!("{label}[{kind}:{}]> ", batch.len()),
            None => format!("{label}> "),
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(trimmed);

                let first_word = trimmed.split_whitespace().next().unwrap_or("");
                match first_word.to_lowercase().as_str() {
                    "quit" | "exit" => break,
                    "clear" => {
                        print!("\x1B[2J\x1B[1;1H");
                        let _ = std::io::stdout().flush();
                        continue;
                    }
                    "help" => {
                        handle_help(trimmed);
                        continue;
                    }
                    ".begin" => {
                        open_batch(&client, &mut pending, false);
                        continue;
                    }
                    ".begintx" => {
                        open_batch(&client, &mut pending, true);
                        continue;
                    }
                    ".flush" => {
                        match pending.take() {
                            Some((batch, _)) => match rt.block_on(batch.flush()) {
                                Ok(results) if results.is_empty() => {
                                    println!("{}", "(empty batch)".dimmed());
                                }
                                Ok(results) => {
                                    for (i, value) in results.iter().enumerate() {
                                        println!("{}) {}", i + 1, format_reply(value));
                                    }
                                }
                                Err(e) => eprintln!("{}", format!("error: {e}").red()),
                            },
                            None => eprintln!("{}", "no open batch".yellow()),
                        }
                        continue;
                    }
                    ".discard" => {
                        match pending.take() {
                            Some((batch, _)) => {
                                let dropped = batch.len();
                                batch.discard();
                                println!(
                                    "{}",
                                    format!("discarded {dropped} queued command(s)").dimmed()
                                );
                            }
                            None => eprintln!("{}", "no open batch".yellow()),
                        }
                        continue;
                    }
                    ".nodes" => {
                        print_nodes(&client);
                        continue;
                    }
                    _ => {}
                }

                let tokens = match tokenize(trimmed) {
                    Ok(tokens) => tokens,
                    Err(e) => {
                        eprintln!("{}", format!("parse error: {e}").red());
                        continue;
                    }
                };
                if tokens.is_empty() {
                    continue;
                }

                let command = build_command(&tokens);
                match &mut pending {
                    Some((batch, _)) => {
                        batch.cmd(command);
                        println!("{}", format!("queued ({})", batch.len()).dimmed());
                    }
                    None => match rt.block_on(client.execute(command)) {
                        Ok(reply) => println!("{}", format_reply(&reply)),
                        Err(e) => eprintln!("{}", format!("error: {e}").red()),
                    },
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C — fresh prompt, open batch survives
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D — exit
                break;
            }
            Err(e) => {
                eprintln!("{}", format!("readline error: {e}").red());
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        let _ = rl.save_history(path);
    }
}

fn open_batch(client: &Client, pending: &mut Option<(Batch, &'static str)>, transactional: bool) {
    if pending.is_some() {
        eprintln!(
            "{}",
            "a batch is already open; .flush or .discard it first".yellow()
        );
        return;
    }
    let kind = if transactional { "tx" } else { "pipe" };
    *pending = Some((client.batch(transactional), kind));
    println!(
        "{}",
        format!("batch open ({kind}); commands queue until .flush").dimmed()
    );
}

fn print_nodes(client: &Client) {
    for node in client.nodes() {
        let status = if node.is_alive() {
            "up".green().to_string()
        } else {
            match node.dead_since() {
                Some(since) => format!(
                    "{} {}",
                    "down".red(),
                    format!("for {}s", since.elapsed().as_secs()).dimmed()
                ),
                None => "down".red().to_string(),
            }
        };
        println!("{} {} {}", node.id(), node.name(), status);
    }
}

/// Handles the `help` local command.
fn handle_help(input: &str) {
    let mut parts = input.split_whitespace();
    parts.next(); // "help" itself

    if let Some(name) = parts.next() {
        match find_command(name) {
            Some(cmd) => {
                println!(
                    "  {} {}\n  {}\n  group: {}",
                    cmd.name.bold(),
                    cmd.args.dimmed(),
                    cmd.summary,
                    cmd.group,
                );
            }
            None => {
                println!("unknown command '{name}'. try just 'help' for a list.");
            }
        }
        return;
    }

    println!("{}", "server commands:".bold());
    println!();
    for (group, cmds) in commands_by_group() {
        println!("  {}:", group.bold());
        for cmd in cmds {
            println!("    {:<12} {}", cmd.name, cmd.summary.dimmed());
        }
        println!();
    }
    println!("  {}:", "local".bold());
    for (name, summary) in META_COMMANDS {
        println!("    {:<12} {}", name, summary.dimmed());
    }
    println!();
    println!(
        "type {} for details on a specific command.",
        "help <command>".bold()
    );
}

/// Returns the path to the history file.
fn history_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cinder_history"))
}

// -----------------------------------------------------------------------
// tokenizer
// -----------------------------------------------------------------------

/// Splits a command line into arguments. Double quotes honor backslash
/// escapes; single quotes are literal; unquoted runs split on
/// whitespace. Adjacent quoted and bare text joins into one token.
///
/// # Errors
///
/// Returns an error on an unmatched quote or a trailing backslash.
pub fn tokenize(input: &str) -> Result<Vec<String>, String> {
    #[derive(PartialEq)]
    enum Mode {
        Bare,
        Double,
        Single,
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut mode = Mode::Bare;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match mode {
            Mode::Bare => match ch {
                ' ' | '\t' => {
                    if started {
                        tokens.push(std::mem::take(&mut current));
                        started = false;
                    }
                }
                '"' => {
                    started = true;
                    mode = Mode::Double;
                }
                '\'' => {
                    started = true;
                    mode = Mode::Single;
                }
                _ => {
                    started = true;
                    current.push(ch);
                }
            },
            Mode::Double => match ch {
                '"' => mode = Mode::Bare,
                '\\' => match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => return Err("trailing backslash".into()),
                },
                _ => current.push(ch),
            },
            Mode::Single => match ch {
                '\'' => mode = Mode::Bare,
                _ => current.push(ch),
            },
        }
    }

    match mode {
        Mode::Double => Err("unmatched double quote".into()),
        Mode::Single => Err("unmatched single quote".into()),
        Mode::Bare => {
            if started {
                tokens.push(current);
            }
            Ok(tokens)
        }
    }
}

// -----------------------------------------------------------------------
// rustyline helper
// -----------------------------------------------------------------------

struct CinderHelper;

impl Helper for CinderHelper {}

impl Completer for CinderHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let prefix = &line[..pos];

        // only the verb completes; arguments are free-form
        if prefix.contains(' ') {
            return Ok((pos, vec![]));
        }

        if prefix.starts_with('.') {
            let matches: Vec<Pair> = META_COMMANDS
                .iter()
                .filter(|(name, _)| name.starts_with(prefix))
                .map(|(name, _)| Pair {
                    display: name.to_string(),
                    replacement: name.to_string(),
                })
                .collect();
            return Ok((0, matches));
        }

        let upper = prefix.to_uppercase();
        let mut matches: Vec<Pair> = command_names()
            .into_iter()
            .filter(|name| name.starts_with(&upper))
            .map(|name| Pair {
                display: name.to_string(),
                replacement: format!("{name} "),
            })
            .collect();

        for &local in LOCAL_WORDS {
            if local.to_uppercase().starts_with(&upper) {
                matches.push(Pair {
                    display: local.to_string(),
                    replacement: format!("{local} "),
                });
            }
        }

        Ok((0, matches))
    }
}

impl Hinter for CinderHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<Self::Hint> {
        // only hint at the end of the line
        if pos != line.len() {
            return None;
        }

        let trimmed = line.trim_start();
        if trimmed.is_empty() || !trimmed.contains(' ') {
            return None;
        }

        let first_end = trimmed.find(' ').unwrap_or(trimmed.len());
        let first = &trimmed[..first_end];
        let after = &trimmed[first_end + 1..];

        // show the argument synopsis until the user starts typing args
        if let Some(cmd) = find_command(first) {
            if !cmd.args.is_empty() && after.trim().is_empty() {
                return Some(cmd.args.to_string());
            }
        }

        None
    }
}

impl Highlighter for CinderHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.is_empty() {
            return Cow::Borrowed(line);
        }

        let lead = line.len() - line.trim_start().len();
        let trimmed = &line[lead..];
        let first_end = trimmed.find(' ').unwrap_or(trimmed.len());
        let first = &trimmed[..first_end];
        let rest = &trimmed[first_end..];

        let is_known = find_command(first).is_some()
            || LOCAL_WORDS.iter().any(|w| w.eq_ignore_ascii_case(first))
            || META_COMMANDS
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case(first));

        let painted_verb = if is_known {
            format!("\x1b[1;36m{first}\x1b[0m") // bold cyan
        } else {
            format!("\x1b[31m{first}\x1b[0m") // red
        };

        Cow::Owned(format!(
            "{}{}{}",
            &line[..lead],
            painted_verb,
            paint_quotes(rest),
        ))
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> Cow<'b, str> {
        Cow::Borrowed(prompt)
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[2m{hint}\x1b[0m")) // dim
    }

    fn highlight_char(
        &self,
        _line: &str,
        _pos: usize,
        _kind: rustyline::highlight::CmdKind,
    ) -> bool {
        true // re-highlight on every keystroke
    }
}

/// Paints quoted spans of the argument portion green.
fn paint_quotes(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    let mut quote: Option<char> = None;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match quote {
            None if ch == '"' || ch == '\'' => {
                out.push_str("\x1b[32m");
                out.push(ch);
                quote = Some(ch);
            }
            Some(q) if ch == q => {
                out.push(ch);
                out.push_str("\x1b[0m");
                quote = None;
            }
            Some('"') if ch == '\\' => {
                out.push(ch);
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            _ => out.push(ch),
        }
    }
    if quote.is_some() {
        out.push_str("\x1b[0m");
    }
    out
}

impl Validator for CinderHelper {}
