// Path: crates/cli/src/testing/assert.rs

use anyhow::{bail, Result};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{timeout_at, Instant};

/// Capped exponential delay between polling attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }

    /// Returns the delay to wait now and doubles the next one, up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }
}

/// Reads `logs` until a line containing `pattern` arrives, returning it.
///
/// Fails when `limit` passes or the stream ends first; the error carries every
/// line seen so far.
pub async fn assert_log_contains(
    label: &str,
    logs: &mut broadcast::Receiver<String>,
    pattern: &str,
    limit: Duration,
) -> Result<String> {
    let deadline = Instant::now() + limit;
    let mut seen: Vec<String> = Vec::new();

    let ended = loop {
        match timeout_at(deadline, logs.recv()).await {
            Err(_) => break "timed out",
            Ok(Err(RecvError::Closed)) => break "log stream closed",
            Ok(Err(RecvError::Lagged(skipped))) => {
                seen.push(format!("<{skipped} lines skipped>"));
            }
            Ok(Ok(line)) if line.contains(pattern) => return Ok(line),
            Ok(Ok(line)) => seen.push(line),
        }
    };
    bail!(
        "[{label}] {ended} before a line containing '{pattern}' ({} lines seen):\n{}",
        seen.len(),
        seen.join("\n")
    )
}
