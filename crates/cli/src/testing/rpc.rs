// Path: crates/cli/src/testing/rpc.rs

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ledger statistics endpoint, relative to the validator URL.
pub const STATISTICS_PATH: &str = "statistics/ledger";
/// Endpoint validators use to announce themselves to a peer.
pub const PING_PATH: &str = "gossip/ping";

// Statistics requests run inside the settle loop; a stalled node must not stall the loop.
const RPC_TIMEOUT: Duration = Duration::from_secs(2);

/// Consensus progress as reported by one validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LedgerStatistics {
    /// Blocks committed since the validator started.
    #[serde(default)]
    pub committed_block_count: u64,
    /// Distinct peers the validator has exchanged gossip with.
    #[serde(default)]
    pub peer_count: u64,
}

/// Body of a gossip ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest {
    /// URL of the sending validator.
    pub url: String,
}

fn endpoint(url: &str, path: &str) -> String {
    format!("{}/{}", url.trim_end_matches('/'), path)
}

/// Fetches a validator's ledger statistics.
pub async fn get_ledger_statistics(client: &reqwest::Client, url: &str) -> Result<LedgerStatistics> {
    let response = client
        .get(endpoint(url, STATISTICS_PATH))
        .timeout(RPC_TIMEOUT)
        .send()
        .await
        .map_err(|e| anyhow!("Failed to reach {}: {}", url, e))?;
    if !response.status().is_success() {
        return Err(anyhow!(
            "Statistics request to {} returned {}",
            url,
            response.status()
        ));
    }
    let stats = response.json::<LedgerStatistics>().await?;
    Ok(stats)
}

/// Announces `self_url` to the validator at `peer_url`.
pub async fn ping_peer(client: &reqwest::Client, peer_url: &str, self_url: &str) -> Result<()> {
    let response = client
        .post(endpoint(peer_url, PING_PATH))
        .timeout(RPC_TIMEOUT)
        .json(&PingRequest {
            url: self_url.to_string(),
        })
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(anyhow!("Ping to {} returned {}", peer_url, response.status()));
    }
    Ok(())
}
