//! Pretty-printing for server replies.
//!
//! Converts reply values into colorized, human-readable output in the
//! style familiar to redis-cli users.

use cinder_protocol::ReplyValue;
use colored::Colorize;

/// Formats a reply for terminal display.
///
/// - status: green
/// - errors: red with `(error)` prefix
/// - integers: yellow with `(integer)` prefix
/// - bulk strings: green, quoted (unless multiline), hex if binary
/// - nil: dim `(nil)`
/// - arrays: numbered list
pub fn format_reply(value: &ReplyValue) -> String {
    render(value, 0)
}

/// Strips ANSI escape sequences and other control characters from
/// server-supplied text so a reply cannot manipulate the terminal.
/// Tabs and line breaks survive.
fn sanitize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\x1b' => {
                // drop the escape; a CSI sequence runs until a letter
                if chars.next() == Some('[') {
                    for c in chars.by_ref() {
                        if c.is_ascii_alphabetic() {
                            break;
                        }
                    }
                }
            }
            '\t' | '\n' | '\r' => out.push(ch),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

fn render(value: &ReplyValue, indent: usize) -> String {
    let pad = " ".repeat(indent);

    match value {
        ReplyValue::Status(s) => format!("{pad}{}", sanitize(s).green()),

        ReplyValue::Error(e) => format!("{pad}{} {}", "(error)".red(), sanitize(e).red()),

        ReplyValue::Integer(n) => format!(
            "{pad}{} {}",
            "(integer)".yellow(),
            n.to_string().yellow()
        ),

        ReplyValue::Bulk(data) => match std::str::from_utf8(data) {
            // multiline output (like INFO) prints unquoted
            Ok(s) if s.contains('\n') => format!("{pad}{}", sanitize(s).green()),
            Ok(s) => format!("{pad}{}", format!("\"{}\"", sanitize(s)).green()),
            Err(_) => {
                let hex: String = data.iter().map(|b| format!("{b:02x}")).collect();
                format!("{pad}{}", hex.green())
            }
        },

        ReplyValue::Nil => format!("{pad}{}", "(nil)".dimmed()),

        ReplyValue::Array(items) if items.is_empty() => {
            format!("{pad}{}", "(empty array)".dimmed())
        }

        ReplyValue::Array(items) => {
            let lines: Vec<String> = items
                .iter()
                .enumerate()
                .map(|(i, item)| format!("{pad}{}) {}", i + 1, render(item, 0)))
                .collect();
            lines.join("\n")
        }
    }
}
