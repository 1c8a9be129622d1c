// Path: crates/cli/src/testing/validator.rs

use mkt_types::{NodePorts, StartError, ValidatorConfig};
use serde_json::{json, Value};
use std::net::{TcpListener, UdpSocket};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

/// Printed on stderr by a validator once its HTTP endpoint is serving.
pub const READY_MARKER: &str = "VALIDATOR_HTTP_LISTENING_ON_";
/// Node configuration file written into each data directory.
pub const CONFIG_FILE_NAME: &str = "validator.json";
/// Captured stderr of the validator process.
pub const LOG_FILE_NAME: &str = "validator.log";

pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) const LOG_CHANNEL_CAPACITY: usize = 8192;
const LOG_DRAIN_GRACE: Duration = Duration::from_secs(2);
const EXIT_AFTER_EOF_GRACE: Duration = Duration::from_secs(1);

/// Everything needed to start one validator.
#[derive(Debug, Clone)]
pub struct ValidatorLaunchSpec<'a> {
    pub binary: &'a Path,
    pub index: usize,
    pub config: &'a ValidatorConfig,
    pub ports: NodePorts,
    pub data_dir: PathBuf,
    /// URLs of validators this one should gossip with.
    pub peers: Vec<String>,
    pub start_timeout: Duration,
}

/// How a validator came to be stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process had already exited before the stop request.
    AlreadyExited,
    /// The process exited on its own after the termination request.
    Graceful,
    /// The process had to be killed.
    Forced,
}

enum Startup {
    Ready,
    Exited(ExitStatus),
    StreamClosed,
}

/// Supervises a single validator process.
pub struct ValidatorProcess {
    index: usize,
    name: String,
    ports: NodePorts,
    url: String,
    data_dir: PathBuf,
    child: Option<Child>,
    exit_status: Option<ExitStatus>,
    /// Never read; kept so `subscribe_logs` can resubscribe. The drain task
    /// holds the only sender, so the stream closes at stderr EOF.
    log_rx: broadcast::Receiver<String>,
    log_drain: Option<JoinHandle<()>>,
}

impl ValidatorProcess {
    /// Spawns the validator and waits until it reports it is serving.
    pub async fn start(spec: ValidatorLaunchSpec<'_>) -> Result<Self, StartError> {
        let host = spec.config.host().to_string();
        check_tcp_port(&host, spec.ports.http)?;
        check_udp_port(&host, spec.ports.gossip)?;

        let name = format!("validator-{}", spec.index);
        let url = format!("http://{}:{}", host, spec.ports.http);
        tokio::fs::create_dir_all(&spec.data_dir).await?;

        let node_options = json!({
            "NodeName": name,
            "Host": host,
            "HttpPort": spec.ports.http,
            "Port": spec.ports.gossip,
            "DataDirectory": spec.data_dir.to_string_lossy(),
            "Peers": spec.peers,
        });
        let node_config = match node_options {
            Value::Object(map) => spec.config.merged(&map),
            _ => spec.config.clone(),
        };
        let config_path = spec.data_dir.join(CONFIG_FILE_NAME);
        tokio::fs::write(&config_path, serde_json::to_vec_pretty(&node_config)?).await?;

        tracing::info!(
            target: "validator",
            "Starting {} (http {}, gossip {}) from {}",
            name,
            spec.ports.http,
            spec.ports.gossip,
            spec.binary.display()
        );

        let mut child = TokioCommand::new(spec.binary)
            .arg("--config")
            .arg(&config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StartError::Spawn {
                binary: spec.binary.display().to_string(),
                source,
            })?;

        let (log_tx, mut log_rx) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        let log_drain = match spawn_log_drain(&mut child, &spec.data_dir, &name, log_tx).await {
            Ok(handle) => handle,
            Err(e) => {
                reap(&mut child).await;
                return Err(e);
            }
        };

        let marker = format!("{}{}:{}", READY_MARKER, host, spec.ports.http);
        let startup = timeout(spec.start_timeout, async {
            loop {
                // Buffered lines are read before an exit is acted on.
                tokio::select! {
                    biased;
                    line = log_rx.recv() => match line {
                        Ok(line) if line.contains(&marker) => return Ok(Startup::Ready),
                        Ok(_) => {}
                        Err(RecvError::Lagged(count)) => {
                            tracing::warn!(target: "validator", "Startup log watch missed {} lines", count);
                        }
                        Err(RecvError::Closed) => return Ok(Startup::StreamClosed),
                    },
                    status = child.wait() => return status.map(Startup::Exited),
                }
            }
        })
        .await;

        let failure = match startup {
            Ok(Ok(Startup::Ready)) => None,
            Ok(Ok(Startup::Exited(status))) => Some(StartError::ExitedEarly {
                status: status.to_string(),
            }),
            Ok(Ok(Startup::StreamClosed)) => {
                let status = match timeout(EXIT_AFTER_EOF_GRACE, child.wait()).await {
                    Ok(Ok(status)) => status.to_string(),
                    _ => "stderr closed without readiness marker".to_string(),
                };
                Some(StartError::ExitedEarly { status })
            }
            Ok(Err(e)) => Some(StartError::Io(e)),
            Err(_) => Some(StartError::Timeout(spec.start_timeout)),
        };
        if let Some(err) = failure {
            tracing::error!(target: "validator", "{} failed to start: {}", name, err);
            reap(&mut child).await;
            log_drain.abort();
            return Err(err);
        }

        tracing::info!(target: "validator", "{} is serving at {}", name, url);
        Ok(Self {
            index: spec.index,
            name,
            ports: spec.ports,
            url,
            data_dir: spec.data_dir,
            child: Some(child),
            exit_status: None,
            log_rx,
            log_drain: Some(log_drain),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn ports(&self) -> NodePorts {
        self.ports
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// A receiver for stderr lines written from now on.
    pub fn subscribe_logs(&self) -> broadcast::Receiver<String> {
        self.log_rx.resubscribe()
    }

    /// The exit status, once the process has been observed to exit.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Non-blocking liveness check.
    pub fn is_alive(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                false
            }
            Err(e) => {
                tracing::warn!(target: "validator", "Liveness check for {} failed: {}", self.name, e);
                false
            }
        }
    }

    /// Requests a graceful stop, force-killing after `grace`.
    ///
    /// Returns only once the process has been reaped. Stopping an already
    /// stopped validator is a no-op.
    pub async fn stop(&mut self, grace: Duration) -> std::io::Result<StopOutcome> {
        let Some(child) = self.child.as_mut() else {
            return Ok(StopOutcome::AlreadyExited);
        };

        let outcome = if let Some(status) = child.try_wait()? {
            self.exit_status = Some(status);
            StopOutcome::AlreadyExited
        } else if request_terminate(child) {
            match timeout(grace, child.wait()).await {
                Ok(status) => {
                    self.exit_status = Some(status?);
                    StopOutcome::Graceful
                }
                Err(_) => {
                    tracing::warn!(
                        target: "validator",
                        "{} did not exit within {:?}; killing",
                        self.name,
                        grace
                    );
                    child.kill().await?;
                    self.exit_status = Some(child.wait().await?);
                    StopOutcome::Forced
                }
            }
        } else {
            child.kill().await?;
            self.exit_status = Some(child.wait().await?);
            StopOutcome::Forced
        };

        self.child = None;
        self.finish_log_drain().await;
        tracing::info!(target: "validator", "{} stopped ({:?})", self.name, outcome);
        Ok(outcome)
    }

    async fn finish_log_drain(&mut self) {
        if let Some(mut handle) = self.log_drain.take() {
            if timeout(LOG_DRAIN_GRACE, &mut handle).await.is_err() {
                handle.abort();
            }
        }
    }
}

impl Drop for ValidatorProcess {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                tracing::warn!(target: "validator", "{} dropped while running; killing", self.name);
                let _ = child.start_kill();
            }
        }
        if let Some(handle) = self.log_drain.take() {
            handle.abort();
        }
    }
}

fn check_tcp_port(host: &str, port: u16) -> Result<(), StartError> {
    TcpListener::bind((host, port))
        .map(drop)
        .map_err(|source| StartError::PortUnavailable {
            host: host.to_string(),
            port,
            source,
        })
}

fn check_udp_port(host: &str, port: u16) -> Result<(), StartError> {
    UdpSocket::bind((host, port))
        .map(drop)
        .map_err(|source| StartError::PortUnavailable {
            host: host.to_string(),
            port,
            source,
        })
}

/// Copies the child's stderr into `<data_dir>/validator.log` and `log_tx`.
async fn spawn_log_drain(
    child: &mut Child,
    data_dir: &Path,
    name: &str,
    log_tx: broadcast::Sender<String>,
) -> Result<JoinHandle<()>, StartError> {
    let stderr = child.stderr.take().ok_or_else(|| {
        StartError::Io(std::io::Error::other("validator stderr was not captured"))
    })?;
    let mut log_file = tokio::fs::File::create(data_dir.join(LOG_FILE_NAME)).await?;
    let name = name.to_string();

    Ok(tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::trace!(target: "validator", "[{}] {}", name, line);
            if let Err(e) = log_file.write_all(format!("{line}\n").as_bytes()).await {
                tracing::warn!(target: "validator", "Failed to write {} log: {}", name, e);
            }
            let _ = log_tx.send(line);
        }
        let _ = log_file.flush().await;
    }))
}

/// Kills and reaps a child, ignoring errors.
async fn reap(child: &mut Child) {
    let _ = child.kill().await;
}

#[cfg(unix)]
fn request_terminate(child: &Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: `pid` belongs to a child we spawned and have not yet reaped.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn request_terminate(_child: &Child) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ValidatorConfig::default();
        let http = crate::testing::pick_port_block(1).unwrap();
        let gossip = crate::testing::pick_port_block(1).unwrap();
        let spec = ValidatorLaunchSpec {
            binary: Path::new("/nonexistent/txnvalidator"),
            index: 0,
            config: &config,
            ports: NodePorts { http, gossip },
            data_dir: dir.path().join("validator-0"),
            peers: Vec::new(),
            start_timeout: Duration::from_secs(1),
        };
        let err = ValidatorProcess::start(spec).await.err().unwrap();
        assert!(matches!(err, StartError::Spawn { .. }), "unexpected error: {err}");
        // The node config is written before the spawn is attempted.
        let written = std::fs::read_to_string(dir.path().join("validator-0").join(CONFIG_FILE_NAME))
            .unwrap();
        let parsed: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["HttpPort"], json!(http));
        assert_eq!(parsed["NodeName"], json!("validator-0"));
    }

    #[tokio::test]
    async fn bound_port_is_reported_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = ValidatorConfig::default();
        let held = TcpListener::bind("127.0.0.1:0").unwrap();
        let http = held.local_addr().unwrap().port();
        let spec = ValidatorLaunchSpec {
            binary: Path::new("/nonexistent/txnvalidator"),
            index: 0,
            config: &config,
            ports: NodePorts { http, gossip: crate::testing::pick_port_block(1).unwrap() },
            data_dir: dir.path().join("validator-0"),
            peers: Vec::new(),
            start_timeout: Duration::from_secs(1),
        };
        let err = ValidatorProcess::start(spec).await.err().unwrap();
        assert!(
            matches!(err, StartError::PortUnavailable { port, .. } if port == http),
            "unexpected error: {err}"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_before_the_marker_is_reported_with_its_status() {
        let dir = tempfile::tempdir().unwrap();
        let config = ValidatorConfig::default();
        let spec = ValidatorLaunchSpec {
            // `sh` rejects `--config` and exits without printing the marker.
            binary: Path::new("/bin/sh"),
            index: 0,
            config: &config,
            ports: NodePorts {
                http: crate::testing::pick_port_block(1).unwrap(),
                gossip: crate::testing::pick_port_block(1).unwrap(),
            },
            data_dir: dir.path().join("validator-0"),
            peers: Vec::new(),
            start_timeout: Duration::from_secs(10),
        };
        let err = ValidatorProcess::start(spec).await.err().unwrap();
        match err {
            StartError::ExitedEarly { status } => assert!(status.contains("exit"), "{status}"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
