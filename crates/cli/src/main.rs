// Path: crates/cli/src/main.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # mktnet
//!
//! Operator tooling for local marketplace validator networks.

use anyhow::Result;
use clap::{Parser, Subcommand};
use mkt_telemetry::LogFormat;

mod commands;

use commands::*;

#[derive(Parser, Debug)]
#[clap(
    name = "mktnet",
    version,
    about = "Launch local marketplace validator networks and inspect their ledger state.",
    long_about = "mktnet starts a cluster of validator processes, waits for it to settle, and resolves marketplace object names against a running validator's store."
)]
struct Cli {
    /// Emit logs as JSON lines instead of compact text.
    #[clap(long, global = true)]
    json_logs: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Launch a validator network and keep it running until ctrl-c.
    Network(network::NetworkArgs),

    /// Resolve one name path to its object identifier.
    Query(query::QueryArgs),

    /// Print every indexed object of a validator's store.
    Dump(query::DumpArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    mkt_telemetry::init_tracing(format)?;

    match cli.command {
        Commands::Network(args) => network::run(args).await,
        Commands::Query(args) => query::run(args).await,
        Commands::Dump(args) => query::dump(args).await,
    }
}
