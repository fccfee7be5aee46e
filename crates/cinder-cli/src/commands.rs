//! Static command metadata for autocomplete, inline help, and routing.
//!
//! This is a thin client — the table never validates arguments. It
//! drives tab-completion and `help`, and tells the builder which
//! commands carry a routing key in their first argument.

use std::collections::BTreeMap;

use cinder_protocol::Command;

/// Metadata for a single server command.
pub struct CommandInfo {
    /// Uppercase command name (e.g. "SET").
    pub name: &'static str,
    /// Argument synopsis (e.g. "key value"). A synopsis beginning with
    /// `key` marks the first argument as the routing key.
    pub args: &'static str,
    /// Functional group for help display.
    pub group: &'static str,
    /// One-line summary.
    pub summary: &'static str,
}

/// All known commands. A linear scan over this many entries is plenty
/// fast for interactive completion.
pub static COMMANDS: &[CommandInfo] = &[
    // --- connection ---
    CommandInfo {
        name: "AUTH",
        args: "password",
        group: "connection",
        summary: "authenticate to the server",
    },
    CommandInfo {
        name: "ECHO",
        args: "message",
        group: "connection",
        summary: "echo the given string",
    },
    CommandInfo {
        name: "PING",
        args: "[message]",
        group: "connection",
        summary: "ping the server",
    },
    CommandInfo {
        name: "QUIT",
        args: "",
        group: "connection",
        summary: "close the connection",
    },
    CommandInfo {
        name: "SELECT",
        args: "index",
        group: "connection",
        summary: "change the selected database",
    },
    // --- string ---
    CommandInfo {
        name: "APPEND",
        args: "key value",
        group: "string",
        summary: "append a value to a key",
    },
    CommandInfo {
        name: "DECR",
        args: "key",
        group: "string",
        summary: "decrement the integer value of a key by one",
    },
    CommandInfo {
        name: "DECRBY",
        args: "key decrement",
        group: "string",
        summary: "decrement the integer value of a key by the given number",
    },
    CommandInfo {
        name: "GET",
        args: "key",
        group: "string",
        summary: "get the value of a key",
    },
    CommandInfo {
        name: "GETSET",
        args: "key value",
        group: "string",
        summary: "set a key and return its old value",
    },
    CommandInfo {
        name: "INCR",
        args: "key",
        group: "string",
        summary: "increment the integer value of a key by one",
    },
    CommandInfo {
        name: "INCRBY",
        args: "key increment",
        group: "string",
        summary: "increment the integer value of a key by the given amount",
    },
    CommandInfo {
        name: "MGET",
        args: "key [key ...]",
        group: "string",
        summary: "get the values of all the given keys",
    },
    CommandInfo {
        name: "MSET",
        args: "key value [key value ...]",
        group: "string",
        summary: "set multiple keys to multiple values",
    },
    CommandInfo {
        name: "SET",
        args: "key value [EX seconds | PX milliseconds] [NX|XX]",
        group: "string",
        summary: "set the string value of a key",
    },
    CommandInfo {
        name: "SETEX",
        args: "key seconds value",
        group: "string",
        summary: "set a key with an expiration time",
    },
    CommandInfo {
        name: "SETNX",
        args: "key value",
        group: "string",
        summary: "set a key only if it does not exist",
    },
    CommandInfo {
        name: "STRLEN",
        args: "key",
        group: "string",
        summary: "get the length of the value stored at a key",
    },
    // --- generic ---
    CommandInfo {
        name: "DEL",
        args: "key [key ...]",
        group: "generic",
        summary: "delete one or more keys",
    },
    CommandInfo {
        name: "EXISTS",
        args: "key [key ...]",
        group: "generic",
        summary: "determine whether keys exist",
    },
    CommandInfo {
        name: "EXPIRE",
        args: "key seconds",
        group: "generic",
        summary: "set a key's time to live in seconds",
    },
    CommandInfo {
        name: "KEYS",
        args: "pattern",
        group: "generic",
        summary: "find all keys matching a pattern (on one node)",
    },
    CommandInfo {
        name: "PERSIST",
        args: "key",
        group: "generic",
        summary: "remove a key's expiration",
    },
    CommandInfo {
        name: "RENAME",
        args: "key newkey",
        group: "generic",
        summary: "rename a key",
    },
    CommandInfo {
        name: "TTL",
        args: "key",
        group: "generic",
        summary: "get a key's time to live in seconds",
    },
    CommandInfo {
        name: "TYPE",
        args: "key",
        group: "generic",
        summary: "determine the type stored at a key",
    },
    // --- list ---
    CommandInfo {
        name: "LINDEX",
        args: "key index",
        group: "list",
        summary: "get an element from a list by its index",
    },
    CommandInfo {
        name: "LLEN",
        args: "key",
        group: "list",
        summary: "get the length of a list",
    },
    CommandInfo {
        name: "LPOP",
        args: "key [count]",
        group: "list",
        summary: "remove and return the first elements of a list",
    },
    CommandInfo {
        name: "LPUSH",
        args: "key element [element ...]",
        group: "list",
        summary: "prepend elements to a list",
    },
    CommandInfo {
        name: "LRANGE",
        args: "key start stop",
        group: "list",
        summary: "get a range of elements from a list",
    },
    CommandInfo {
        name: "RPOP",
        args: "key [count]",
        group: "list",
        summary: "remove and return the last elements of a list",
    },
    CommandInfo {
        name: "RPUSH",
        args: "key element [element ...]",
        group: "list",
        summary: "append elements to a list",
    },
    // --- hash ---
    CommandInfo {
        name: "HDEL",
        args: "key field [field ...]",
        group: "hash",
        summary: "delete one or more hash fields",
    },
    CommandInfo {
        name: "HGET",
        args: "key field",
        group: "hash",
        summary: "get the value of a hash field",
    },
    CommandInfo {
        name: "HGETALL",
        args: "key",
        group: "hash",
        summary: "get all fields and values in a hash",
    },
    CommandInfo {
        name: "HKEYS",
        args: "key",
        group: "hash",
        summary: "get all field names in a hash",
    },
    CommandInfo {
        name: "HLEN",
        args: "key",
        group: "hash",
        summary: "get the number of fields in a hash",
    },
    CommandInfo {
        name: "HSET",
        args: "key field value [field value ...]",
        group: "hash",
        summary: "set one or more hash fields",
    },
    CommandInfo {
        name: "HVALS",
        args: "key",
        group: "hash",
        summary: "get all values in a hash",
    },
    // --- set ---
    CommandInfo {
        name: "SADD",
        args: "key member [member ...]",
        group: "set",
        summary: "add members to a set",
    },
    CommandInfo {
        name: "SCARD",
        args: "key",
        group: "set",
        summary: "get the number of members in a set",
    },
    CommandInfo {
        name: "SISMEMBER",
        args: "key member",
        group: "set",
        summary: "determine whether a value is a member of a set",
    },
    CommandInfo {
        name: "SMEMBERS",
        args: "key",
        group: "set",
        summary: "get all members of a set",
    },
    CommandInfo {
        name: "SREM",
        args: "key member [member ...]",
        group: "set",
        summary: "remove members from a set",
    },
    // --- server ---
    CommandInfo {
        name: "DBSIZE",
        args: "",
        group: "server",
        summary: "count the keys in the selected database (on one node)",
    },
    CommandInfo {
        name: "FLUSHDB",
        args: "",
        group: "server",
        summary: "remove all keys from the selected database (on one node)",
    },
    CommandInfo {
        name: "INFO",
        args: "[section]",
        group: "server",
        summary: "get information and statistics about the server (on one node)",
    },
];

/// Look up a command by name (case-insensitive).
pub fn find_command(name: &str) -> Option<&'static CommandInfo> {
    let upper = name.to_uppercase();
    COMMANDS.iter().find(|c| c.name == upper)
}

/// Returns all known command names for autocomplete.
pub fn command_names() -> Vec<&'static str> {
    COMMANDS.iter().map(|c| c.name).collect()
}

/// Groups commands by their functional group for help display.
pub fn commands_by_group() -> BTreeMap<&'static str, Vec<&'static CommandInfo>> {
    let mut groups = BTreeMap::new();
    for cmd in COMMANDS {
        groups.entry(cmd.group).or_insert_with(Vec::new).push(cmd);
    }
    groups
}

/// Whether `verb`'s first argument is a routing key. Known commands
/// answer from their synopsis; unknown commands default to yes, so new
/// server commands still route sensibly.
pub fn routes_by_key(verb: &str) -> bool {
    match find_command(verb) {
        Some(cmd) => cmd.args.starts_with("key"),
        None => true,
    }
}

/// Builds the engine command for a tokenized input line: first token is
/// the verb, the next is flagged as the routing key when the verb takes
/// one, the rest ride along as plain arguments.
pub fn build_command(tokens: &[String]) -> Command {
    let Some((verb, rest)) = tokens.split_first() else {
        return Command::new("");
    };
    let mut command = Command::new(verb.clone());
    let mut rest = rest.iter();
    if routes_by_key(verb) {
        if let Some(key) = rest.next() {
            command = command.key(key.clone());
        }
    }
    for arg in rest {
        command = command.arg(arg.clone());
    }
    command
}
