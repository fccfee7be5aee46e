//! cinder-cli: terminal client for a cinder node set.
//!
//! Routes commands through the sharded engine — consistent hashing
//! across the configured nodes, pooled connections, failover — and
//! pretty-prints replies. Supports one-shot and interactive (REPL)
//! modes; the REPL can stage pipelined and transactional batches.

mod commands;
mod format;
mod repl;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use cinder_client::{Client, ClientConfig, NodeConfig};

/// Interactive CLI client for cinder.
#[derive(Parser)]
#[command(name = "cinder-cli", version, about)]
struct Args {
    /// Node address; repeat for a multi-node ring.
    #[arg(short = 'n', long = "node", default_value = "127.0.0.1:6379")]
    nodes: Vec<String>,

    /// Password for AUTH, applied to every node.
    #[arg(short = 'a', long)]
    password: Option<String>,

    /// Database index to SELECT.
    #[arg(long, default_value_t = 0)]
    db: u32,

    /// TCP connect timeout in milliseconds.
    #[arg(long, default_value_t = 250)]
    connect_timeout_ms: u64,

    /// Socket read timeout in milliseconds.
    #[arg(long, default_value_t = 5000)]
    io_timeout_ms: u64,

    /// Command to execute (one-shot mode). If omitted, starts the REPL.
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinder_client=warn".into()),
        )
        .init();

    let args = Args::parse();
    let label = args.nodes.join(",");
    let config = client_config(&args);

    if args.command.is_empty() {
        repl::run_repl(config, &label);
        ExitCode::SUCCESS
    } else {
        run_oneshot(config, &args.command)
    }
}

fn client_config(args: &Args) -> ClientConfig {
    let nodes = args
        .nodes
        .iter()
        .map(|addr| {
            let mut node = NodeConfig::new(addr.clone());
            if let Some(password) = &args.password {
                node = node.password(password.clone());
            }
            node
        })
        .collect();

    ClientConfig {
        database: args.db,
        connect_timeout: Duration::from_millis(args.connect_timeout_ms),
        io_timeout: Duration::from_millis(args.io_timeout_ms),
        ..ClientConfig::new(nodes)
    }
}

/// Sends a single command and prints the reply.
fn run_oneshot(config: ClientConfig, command: &[String]) -> ExitCode {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}", format!("failed to create runtime: {e}").red());
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(async {
        let client = match Client::new(config) {
            Ok(client) => client,
            Err(e) => {
                eprintln!("{}", format!("error: {e}").red());
                return ExitCode::FAILURE;
            }
        };

        match client.execute(commands::build_command(command)).await {
            Ok(reply) => {
                println!("{}", format::format_reply(&reply));
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", format!("error: {e}").red());
                ExitCode::FAILURE
            }
        }
    })
}
