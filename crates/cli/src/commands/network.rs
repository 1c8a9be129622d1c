// Path: crates/cli/src/commands/network.rs

use anyhow::{Context, Result};
use clap::Parser;
use mkt_cli::testing::cluster::{DEFAULT_BINARY, DEFAULT_GOSSIP_PORT, DEFAULT_HTTP_PORT};
use mkt_cli::testing::ValidatorNetwork;
use mkt_types::ValidatorConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct NetworkArgs {
    /// Number of validators to launch.
    #[clap(long, default_value_t = 1)]
    pub nodes: usize,

    /// TOML file with validator options, layered over the defaults.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Base HTTP port; validator `i` listens on `http_port + i`.
    #[clap(long, default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,

    /// Base gossip port; validator `i` binds `gossip_port + i`.
    #[clap(long, default_value_t = DEFAULT_GOSSIP_PORT)]
    pub gossip_port: u16,

    /// Path of the validator executable.
    #[clap(long, default_value = DEFAULT_BINARY)]
    pub binary: PathBuf,

    /// Directory for node data. Defaults to a temporary directory.
    #[clap(long)]
    pub work_dir: Option<PathBuf>,

    /// Write node data to this `.tar.zst` file after shutdown.
    #[clap(long)]
    pub archive: Option<PathBuf>,
}

pub async fn run(args: NetworkArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => ValidatorConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ValidatorConfig::default(),
    };

    let mut builder = ValidatorNetwork::builder()
        .with_binary(&args.binary)
        .with_http_port(args.http_port)
        .with_gossip_port(args.gossip_port)
        .with_config(config);
    if let Some(dir) = &args.work_dir {
        builder = builder.with_work_dir(dir);
    }
    let mut network = builder.build()?;

    network
        .launch(args.nodes)
        .await
        .context("Validator network failed to launch")?;

    println!("Validator network ready ({} nodes):", network.len());
    for url in network.urls() {
        println!("  {}", url);
    }
    println!("Press ctrl-c to shut down.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    let report = network.shutdown().await;
    if !report.is_clean() {
        tracing::warn!(target: "cluster", "Shutdown failures: {:?}", report.failures);
    }

    if let Some(path) = &args.archive {
        if network.create_result_archive(path)? {
            println!("Results archived to {}", path.display());
        } else {
            println!("No validator data to archive.");
        }
    }
    Ok(())
}
