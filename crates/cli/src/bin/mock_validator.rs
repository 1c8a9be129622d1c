// Path: crates/cli/src/bin/mock_validator.rs
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

//! A stand-in validator for exercising the network tooling.
//!
//! It reads the same `--config validator.json` a real validator does, binds
//! its HTTP and gossip ports, announces readiness on stderr, and serves the
//! store listing from `<DataDirectory>/store.json`. After `InitialWaitTime`
//! a block is "committed" once per `TargetWaitTime`, and peers are counted
//! from gossip pings.
//!
//! Failure modes for tests, all off by default:
//! - `MockExitAfterMs`: exit with status 3 after this many milliseconds; `0`
//!   exits before readiness is announced.
//! - `MockStartDelayMs`: wait this long before binding ports.
//! - `MockSilent`: serve normally but never announce readiness.
//! - `MockNeverPeer`: always report zero peers.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use mkt_cli::testing::rpc::{ping_peer, LedgerStatistics, PingRequest};
use mkt_cli::testing::validator::READY_MARKER;
use mkt_telemetry::LogFormat;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const STORE_FILE_NAME: &str = "store.json";
const PING_INTERVAL: Duration = Duration::from_millis(200);
const MIN_BLOCK_INTERVAL: Duration = Duration::from_millis(10);
/// Exit status used when `MockExitAfterMs` fires.
const SCHEDULED_EXIT_CODE: i32 = 3;

#[derive(Parser, Debug)]
#[clap(name = "mock-validator", about = "Stand-in marketplace validator for tests.")]
struct Args {
    /// Node configuration written by the network manager.
    #[clap(long)]
    config: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MockConfig {
    #[serde(default = "default_name")]
    node_name: String,
    #[serde(default = "default_host")]
    host: String,
    http_port: u16,
    port: u16,
    data_directory: PathBuf,
    #[serde(default)]
    peers: Vec<String>,
    #[serde(default = "default_wait")]
    initial_wait_time: f64,
    #[serde(default = "default_wait")]
    target_wait_time: f64,
    #[serde(default)]
    mock_exit_after_ms: Option<u64>,
    #[serde(default)]
    mock_start_delay_ms: Option<u64>,
    #[serde(default)]
    mock_silent: bool,
    #[serde(default)]
    mock_never_peer: bool,
}

fn default_name() -> String {
    "validator".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_wait() -> f64 {
    1.0
}

/// Zero for negative, NaN and unrepresentable values.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

struct AppState {
    self_url: String,
    started: Instant,
    initial_wait: Duration,
    block_interval: Duration,
    store_path: PathBuf,
    never_peer: bool,
    peers: Mutex<BTreeSet<String>>,
}

impl AppState {
    fn statistics(&self) -> LedgerStatistics {
        let elapsed = self
            .started
            .elapsed()
            .saturating_sub(self.initial_wait)
            .as_millis();
        let interval = self.block_interval.as_millis().max(1);
        let peers = if self.never_peer {
            0
        } else {
            self.peers
                .lock()
                .map(|p| p.iter().filter(|url| **url != self.self_url).count())
                .unwrap_or(0)
        };
        LedgerStatistics {
            committed_block_count: u64::try_from(elapsed / interval).unwrap_or(u64::MAX),
            peer_count: peers as u64,
        }
    }

    fn add_peer(&self, url: String) {
        if let Ok(mut peers) = self.peers.lock() {
            if peers.insert(url.clone()) {
                tracing::info!(target: "validator", "New peer {}", url);
            }
        }
    }
}

async fn store(State(state): State<Arc<AppState>>) -> Result<Json<Value>, StatusCode> {
    tracing::info!(target: "validator", "Serving store listing from {}", state.store_path.display());
    match tokio::fs::read(&state.store_path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map(Json).map_err(|e| {
            tracing::error!(target: "validator", "Invalid {}: {}", STORE_FILE_NAME, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(Json(Value::Object(Default::default())))
        }
        Err(e) => {
            tracing::error!(target: "validator", "Failed to read {}: {}", STORE_FILE_NAME, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn statistics(State(state): State<Arc<AppState>>) -> Json<LedgerStatistics> {
    Json(state.statistics())
}

async fn ping(State(state): State<Arc<AppState>>, Json(request): Json<PingRequest>) -> StatusCode {
    state.add_peer(request.url);
    StatusCode::OK
}

async fn gossip_loop(state: Arc<AppState>, peers: Vec<String>) {
    let client = reqwest::Client::new();
    let mut ticker = tokio::time::interval(PING_INTERVAL);
    loop {
        ticker.tick().await;
        for peer in &peers {
            match ping_peer(&client, peer, &state.self_url).await {
                Ok(()) => state.add_peer(peer.clone()),
                Err(e) => tracing::debug!(target: "validator", "Ping to {} failed: {}", peer, e),
            }
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = term.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!(target: "validator", "Termination requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    mkt_telemetry::init_tracing(LogFormat::Compact)?;
    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read {}", args.config.display()))?;
    let config: MockConfig = serde_json::from_str(&raw).context("Invalid validator config")?;

    if config.mock_exit_after_ms == Some(0) {
        tracing::warn!(target: "validator", "Scheduled exit before startup");
        std::process::exit(SCHEDULED_EXIT_CODE);
    }
    if let Some(ms) = config.mock_start_delay_ms {
        tracing::info!(target: "validator", "Delaying startup by {}ms", ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    // Held for the life of the process so the gossip port reads as taken.
    let _gossip = tokio::net::UdpSocket::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind gossip port {}", config.port))?;
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.http_port))
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", config.http_port))?;

    let block_interval = seconds(config.target_wait_time).max(MIN_BLOCK_INTERVAL);
    let state = Arc::new(AppState {
        self_url: format!("http://{}:{}", config.host, config.http_port),
        started: Instant::now(),
        initial_wait: seconds(config.initial_wait_time),
        block_interval,
        store_path: config.data_directory.join(STORE_FILE_NAME),
        never_peer: config.mock_never_peer,
        peers: Mutex::new(BTreeSet::new()),
    });

    let app = Router::new()
        .route("/store/MarketPlaceTransaction/*rest", get(store))
        .route("/statistics/ledger", get(statistics))
        .route("/gossip/ping", post(ping))
        .with_state(state.clone());

    tokio::spawn(gossip_loop(state.clone(), config.peers.clone()));
    if let Some(ms) = config.mock_exit_after_ms {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            tracing::warn!(target: "validator", "Scheduled exit after {}ms", ms);
            std::process::exit(SCHEDULED_EXIT_CODE);
        });
    }

    tracing::info!(
        target: "validator",
        "{} serving {} with {} configured peers",
        config.node_name,
        state.self_url,
        config.peers.len()
    );
    if config.mock_silent {
        tracing::warn!(target: "validator", "Readiness announcement suppressed");
    } else {
        eprintln!("{}{}:{}", READY_MARKER, config.host, config.http_port);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    tracing::info!(target: "validator", "{} stopped", config.node_name);
    Ok(())
}
