// Path: crates/cli/src/testing/cluster.rs

use super::archive::write_result_archive;
use super::assert::Backoff;
use super::ports::pick_disjoint_blocks;
use super::rpc::get_ledger_statistics;
use super::validator::{StopOutcome, ValidatorLaunchSpec, ValidatorProcess, DEFAULT_START_TIMEOUT};
use futures_util::future::join_all;
use mkt_types::{ArchiveError, LaunchError, NodePorts, ValidatorConfig};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Validator executable used when no binary is configured.
pub const DEFAULT_BINARY: &str = "txnvalidator";
pub const DEFAULT_HTTP_PORT: u16 = 9500;
pub const DEFAULT_GOSSIP_PORT: u16 = 9600;
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Lifecycle of a [`ValidatorNetwork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    Idle,
    Launching,
    Settling,
    Ready,
    ShuttingDown,
    Stopped,
}

/// What happened to each node during a shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub graceful: usize,
    pub forced: usize,
    pub already_exited: usize,
    /// `(node index, error)` for every node that could not be stopped cleanly.
    pub failures: Vec<(usize, String)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, outcome: StopOutcome) {
        match outcome {
            StopOutcome::Graceful => self.graceful += 1,
            StopOutcome::Forced => self.forced += 1,
            StopOutcome::AlreadyExited => self.already_exited += 1,
        }
    }
}

enum WorkDir {
    Temp(TempDir),
    Fixed(PathBuf),
}

impl WorkDir {
    fn path(&self) -> &Path {
        match self {
            Self::Temp(dir) => dir.path(),
            Self::Fixed(path) => path,
        }
    }
}

pub struct ValidatorNetworkBuilder {
    binary: PathBuf,
    http_port: u16,
    gossip_port: u16,
    config: ValidatorConfig,
    node_options: BTreeMap<usize, Map<String, Value>>,
    work_dir: Option<PathBuf>,
    ready_timeout: Duration,
    stop_timeout: Duration,
    start_timeout: Duration,
    poll_interval: Duration,
}

impl Default for ValidatorNetworkBuilder {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            http_port: DEFAULT_HTTP_PORT,
            gossip_port: DEFAULT_GOSSIP_PORT,
            config: ValidatorConfig::default(),
            node_options: BTreeMap::new(),
            work_dir: None,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            start_timeout: DEFAULT_START_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ValidatorNetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn with_gossip_port(mut self, port: u16) -> Self {
        self.gossip_port = port;
        self
    }

    /// Replaces the base ports with two free, disjoint blocks large enough for
    /// `count` nodes. Keeps the current bases if no such blocks are found.
    pub fn with_free_ports(mut self, count: usize) -> Self {
        match pick_disjoint_blocks(count) {
            Some((http, gossip)) => {
                self.http_port = http;
                self.gossip_port = gossip;
            }
            None => tracing::warn!(
                target: "cluster",
                "No free port blocks for {} nodes; keeping {} / {}",
                count,
                self.http_port,
                self.gossip_port
            ),
        }
        self
    }

    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets an option for a single node, overriding the shared configuration.
    pub fn with_node_option(mut self, index: usize, key: &str, value: impl Into<Value>) -> Self {
        self.node_options
            .entry(index)
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    /// Keeps node data under `dir` instead of a temporary directory.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn build(self) -> Result<ValidatorNetwork, LaunchError> {
        self.config.validate()?;
        let work_dir = match self.work_dir {
            Some(path) => {
                std::fs::create_dir_all(&path)?;
                WorkDir::Fixed(path)
            }
            None => WorkDir::Temp(tempfile::Builder::new().prefix("mktnet-").tempdir()?),
        };
        Ok(ValidatorNetwork {
            binary: self.binary,
            http_port: self.http_port,
            gossip_port: self.gossip_port,
            config: self.config,
            node_options: self.node_options,
            work_dir,
            ready_timeout: self.ready_timeout,
            stop_timeout: self.stop_timeout,
            start_timeout: self.start_timeout,
            poll_interval: self.poll_interval,
            state: ClusterState::Idle,
            nodes: Vec::new(),
            attached: Vec::new(),
            http: reqwest::Client::new(),
        })
    }

    /// Wraps validators that are already running elsewhere instead of
    /// launching new ones.
    ///
    /// The network starts out `Ready` with `urls()` returning `urls` as given.
    /// It owns no processes, so `shutdown` and `create_result_archive` have
    /// nothing to act on and `launch` is refused.
    pub fn attach(self, urls: Vec<String>) -> Result<ValidatorNetwork, LaunchError> {
        if urls.is_empty() {
            return Err(LaunchError::InvalidNodeCount(0));
        }
        if let Some(bad) = urls
            .iter()
            .find(|u| !(u.starts_with("http://") || u.starts_with("https://")))
        {
            return Err(LaunchError::InvalidUrl(bad.clone()));
        }
        let mut network = self.build()?;
        tracing::info!(target: "cluster", "Attached to existing validators: {:?}", urls);
        network.attached = urls;
        network.state = ClusterState::Ready;
        Ok(network)
    }
}

/// A set of validator processes brought up as one connected cluster.
pub struct ValidatorNetwork {
    binary: PathBuf,
    http_port: u16,
    gossip_port: u16,
    config: ValidatorConfig,
    node_options: BTreeMap<usize, Map<String, Value>>,
    work_dir: WorkDir,
    ready_timeout: Duration,
    stop_timeout: Duration,
    start_timeout: Duration,
    poll_interval: Duration,
    state: ClusterState,
    nodes: Vec<ValidatorProcess>,
    attached: Vec<String>,
    http: reqwest::Client,
}

impl ValidatorNetwork {
    pub fn builder() -> ValidatorNetworkBuilder {
        ValidatorNetworkBuilder::new()
    }

    /// Shorthand for `ValidatorNetwork::builder().attach(urls)`.
    pub fn attach(urls: Vec<String>) -> Result<Self, LaunchError> {
        ValidatorNetworkBuilder::new().attach(urls)
    }

    /// Whether this network wraps validators it did not launch.
    pub fn is_attached(&self) -> bool {
        !self.attached.is_empty()
    }

    /// Starts `node_count` validators and waits until they form a settled
    /// cluster.
    ///
    /// On any failure every process started by this call is stopped before
    /// the error is returned, and the network is left `Stopped`.
    pub async fn launch(&mut self, node_count: usize) -> Result<(), LaunchError> {
        if node_count == 0 {
            return Err(LaunchError::InvalidNodeCount(node_count));
        }
        if self.is_attached() {
            return Err(LaunchError::AlreadyRunning(
                "attached to an existing network".to_string(),
            ));
        }
        if !matches!(self.state, ClusterState::Idle | ClusterState::Stopped) {
            return Err(LaunchError::AlreadyRunning(format!("{:?}", self.state)));
        }
        let ports = self.assign_ports(node_count)?;
        self.nodes.clear();

        tracing::info!(
            target: "cluster",
            "Launching {} validators from {} in {}",
            node_count,
            self.binary.display(),
            self.work_dir.path().display()
        );
        self.state = ClusterState::Launching;
        if let Err(e) = self.bring_up(&ports).await {
            self.rollback(&e).await;
            return Err(e);
        }

        self.state = ClusterState::Settling;
        if let Err(e) = self.settle().await {
            self.rollback(&e).await;
            return Err(e);
        }

        self.state = ClusterState::Ready;
        tracing::info!(target: "cluster", "Validator network is ready: {:?}", self.urls());
        Ok(())
    }

    fn assign_ports(&self, node_count: usize) -> Result<Vec<NodePorts>, LaunchError> {
        let mut seen = HashSet::new();
        let mut assigned = Vec::with_capacity(node_count);
        for index in 0..node_count {
            let ports = NodePorts::derive(self.http_port, self.gossip_port, index).ok_or_else(|| {
                LaunchError::PortConflict(format!("ports for validator {index} exceed 65535"))
            })?;
            for port in [ports.http, ports.gossip] {
                if !seen.insert(port) {
                    return Err(LaunchError::PortConflict(format!(
                        "port {port} is assigned twice (http base {}, gossip base {})",
                        self.http_port, self.gossip_port
                    )));
                }
            }
            assigned.push(ports);
        }
        Ok(assigned)
    }

    async fn bring_up(&mut self, ports: &[NodePorts]) -> Result<(), LaunchError> {
        for (index, node_ports) in ports.iter().enumerate() {
            let config = match self.node_options.get(&index) {
                Some(overrides) => self.config.merged(overrides),
                None => self.config.clone(),
            };
            let peers: Vec<String> = self.nodes.iter().map(|n| n.url().to_string()).collect();
            let data_dir = self.work_dir.path().join(format!("validator-{index}"));
            // Each launch starts from an empty data directory.
            match tokio::fs::remove_dir_all(&data_dir).await {
                Ok(()) => tracing::debug!(target: "cluster", "Cleared {}", data_dir.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(LaunchError::Io(e)),
            }
            let spec = ValidatorLaunchSpec {
                binary: &self.binary,
                index,
                config: &config,
                ports: *node_ports,
                data_dir,
                peers,
                start_timeout: self.start_timeout,
            };
            let node = ValidatorProcess::start(spec)
                .await
                .map_err(|source| LaunchError::Start { index, source })?;
            self.nodes.push(node);

            if let Some(exited) = self.first_exited() {
                return Err(exited);
            }
        }
        Ok(())
    }

    /// `NodeExited` for the first node found no longer running.
    fn first_exited(&mut self) -> Option<LaunchError> {
        let node = self.nodes.iter_mut().find_map(|node| (!node.is_alive()).then_some(node))?;
        let status = node
            .exit_status()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown status".to_string());
        tracing::error!(
            target: "cluster",
            "{} exited during {:?}: {}",
            node.name(),
            self.state,
            status
        );
        Some(LaunchError::NodeExited {
            index: node.index(),
            status,
        })
    }

    /// Polls every node until the cluster is connected, has committed a
    /// block, and the initial wait time has passed.
    async fn settle(&mut self) -> Result<(), LaunchError> {
        let expected_peers = (self.nodes.len() as u64).saturating_sub(1);
        let hold = self.config.initial_wait_time();
        let deadline = hold.saturating_add(self.ready_timeout);
        let started = Instant::now();
        let mut backoff = Backoff::new(self.poll_interval, MAX_POLL_INTERVAL);

        loop {
            if let Some(exited) = self.first_exited() {
                return Err(exited);
            }

            let requests = self
                .nodes
                .iter()
                .map(|node| get_ledger_statistics(&self.http, node.url()));
            let results = join_all(requests).await;

            let mut lagging = Vec::new();
            for (node, result) in self.nodes.iter().zip(results) {
                match result {
                    Ok(stats)
                        if stats.peer_count >= expected_peers && stats.committed_block_count >= 1 => {}
                    Ok(stats) => lagging.push(format!(
                        "{}: {}/{} peers, {} blocks",
                        node.name(),
                        stats.peer_count,
                        expected_peers,
                        stats.committed_block_count
                    )),
                    Err(e) => lagging.push(format!("{}: {}", node.name(), e)),
                }
            }

            let elapsed = started.elapsed();
            let detail = if lagging.is_empty() {
                if elapsed >= hold {
                    tracing::info!(target: "cluster", "Cluster settled after {:?}", elapsed);
                    return Ok(());
                }
                format!("connected, holding for initial wait time {hold:?}")
            } else {
                lagging.join("; ")
            };

            if elapsed >= deadline {
                return Err(LaunchError::NotReady {
                    waited: elapsed,
                    detail,
                });
            }
            tracing::debug!(target: "cluster", "Settling ({:?}): {}", elapsed, detail);
            let remaining = deadline.saturating_sub(elapsed);
            tokio::time::sleep(backoff.next_delay().min(remaining)).await;
        }
    }

    async fn rollback(&mut self, cause: &LaunchError) {
        tracing::error!(
            target: "cluster",
            "Launch failed: {}; stopping {} started validators",
            cause,
            self.nodes.len()
        );
        self.state = ClusterState::ShuttingDown;
        let report = self.stop_all().await;
        if !report.is_clean() {
            tracing::warn!(target: "cluster", "Rollback left failures: {:?}", report.failures);
        }
        self.state = ClusterState::Stopped;
    }

    async fn stop_all(&mut self) -> ShutdownReport {
        let grace = self.stop_timeout;
        let mut report = ShutdownReport::default();
        for node in self.nodes.iter_mut().rev() {
            match node.stop(grace).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    tracing::warn!(target: "cluster", "Failed to stop {}: {}", node.name(), e);
                    report.failures.push((node.index(), e.to_string()));
                }
            }
        }
        report
    }

    /// Stops every node in reverse launch order.
    ///
    /// Failures are collected, never raised. Calling this on a network that
    /// is not running returns an empty report.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        if matches!(self.state, ClusterState::Idle | ClusterState::Stopped) {
            return ShutdownReport::default();
        }
        tracing::info!(target: "cluster", "Shutting down {} validators", self.nodes.len());
        self.state = ClusterState::ShuttingDown;
        let report = self.stop_all().await;
        self.state = ClusterState::Stopped;
        tracing::info!(
            target: "cluster",
            "Shutdown complete: {} graceful, {} forced, {} already exited, {} failures",
            report.graceful,
            report.forced,
            report.already_exited,
            report.failures.len()
        );
        report
    }

    /// Packs every node's data directory into a zstd-compressed tar file.
    ///
    /// Returns `Ok(false)` when there is nothing to archive.
    pub fn create_result_archive(&self, path: &Path) -> Result<bool, ArchiveError> {
        let sources: Vec<(String, PathBuf)> = self
            .nodes
            .iter()
            .map(|node| (node.name().to_string(), node.data_dir().to_path_buf()))
            .collect();
        write_result_archive(&sources, path)
    }

    /// Endpoint URLs in launch order; node 0 is the entry point.
    pub fn urls(&self) -> Vec<String> {
        if self.is_attached() {
            return self.attached.clone();
        }
        self.nodes.iter().map(|n| n.url().to_string()).collect()
    }

    pub fn state(&self) -> ClusterState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> Option<&ValidatorProcess> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[ValidatorProcess] {
        &self.nodes
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    /// Number of node processes still running.
    pub fn live_count(&mut self) -> usize {
        self.nodes
            .iter_mut()
            .map(|n| n.is_alive())
            .filter(|alive| *alive)
            .count()
    }
}

impl Drop for ValidatorNetwork {
    fn drop(&mut self) {
        let running = !matches!(self.state, ClusterState::Idle | ClusterState::Stopped);
        if running && !self.nodes.is_empty() {
            tracing::warn!(
                target: "cluster",
                "Validator network dropped in state {:?}; killing {} validators",
                self.state,
                self.nodes.len()
            );
        }
        // Nodes go before the work dir so no process outlives its data directory.
        self.nodes.clear();
    }
}
