// Path: crates/types/src/error.rs
//! Core error types for the validator harness.

use std::time::Duration;
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors raised while loading or validating a `ValidatorConfig`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration is not valid TOML.
    #[error("Invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    /// The configuration is not a valid JSON object.
    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// A well-known option has the wrong shape.
    #[error("Invalid value for option '{key}': {reason}")]
    InvalidOption {
        /// The offending option name.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "CONFIG_IO",
            Self::Toml(_) => "CONFIG_TOML",
            Self::Json(_) => "CONFIG_JSON",
            Self::InvalidOption { .. } => "CONFIG_INVALID_OPTION",
        }
    }
}

/// Errors raised while starting a single validator process.
#[derive(Error, Debug)]
pub enum StartError {
    /// One of the node's assigned ports is already bound by someone else.
    #[error("Port {port} on {host} is unavailable: {source}")]
    PortUnavailable {
        /// Interface the bind was attempted on.
        host: String,
        /// The port that could not be bound.
        port: u16,
        /// The bind error.
        #[source]
        source: std::io::Error,
    },
    /// The validator binary could not be spawned.
    #[error("Failed to spawn validator binary '{binary}': {source}")]
    Spawn {
        /// Path of the binary.
        binary: String,
        /// The spawn error.
        #[source]
        source: std::io::Error,
    },
    /// The process exited before it reported it was serving.
    #[error("Validator exited before it was ready ({status})")]
    ExitedEarly {
        /// The exit status as reported by the OS.
        status: String,
    },
    /// The process did not report it was serving within the start timeout.
    #[error("Validator did not report readiness within {0:?}")]
    Timeout(Duration),
    /// Writing the node's configuration or data directory failed.
    #[error("I/O error while preparing validator: {0}")]
    Io(#[from] std::io::Error),
    /// The node configuration could not be serialized.
    #[error("Failed to serialize validator configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ErrorCode for StartError {
    fn code(&self) -> &'static str {
        match self {
            Self::PortUnavailable { .. } => "START_PORT_UNAVAILABLE",
            Self::Spawn { .. } => "START_SPAWN_FAILED",
            Self::ExitedEarly { .. } => "START_EXITED_EARLY",
            Self::Timeout(_) => "START_TIMEOUT",
            Self::Io(_) => "START_IO",
            Self::Config(_) => "START_CONFIG",
        }
    }
}

/// Errors raised when a cluster fails to reach the Ready state.
///
/// Every variant is returned only after all processes started by the launch
/// have been stopped.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// A cluster needs at least one node.
    #[error("Invalid node count {0}; a cluster needs at least one validator")]
    InvalidNodeCount(usize),
    /// `launch` was called on a network that is not idle or stopped.
    #[error("Network is already running ({0})")]
    AlreadyRunning(String),
    /// The configuration failed validation.
    #[error("Invalid validator configuration: {0}")]
    Config(#[from] ConfigError),
    /// An endpoint given to attach to is not an HTTP URL.
    #[error("Invalid validator URL '{0}'")]
    InvalidUrl(String),
    /// Derived ports overlap or overflow the port range.
    #[error("Port assignment conflict: {0}")]
    PortConflict(String),
    /// A node failed to start.
    #[error("Validator {index} failed to start: {source}")]
    Start {
        /// Launch index of the node.
        index: usize,
        /// The underlying start failure.
        #[source]
        source: StartError,
    },
    /// A node exited while the cluster was settling.
    #[error("Validator {index} exited during launch ({status})")]
    NodeExited {
        /// Launch index of the node.
        index: usize,
        /// The exit status as reported by the OS.
        status: String,
    },
    /// The cluster did not become connected and settled in time.
    #[error("Network not ready after {waited:?}: {detail}")]
    NotReady {
        /// How long the settle loop ran.
        waited: Duration,
        /// The last readiness observation.
        detail: String,
    },
    /// Preparing the working directory failed.
    #[error("I/O error during launch: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for LaunchError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidNodeCount(_) => "LAUNCH_INVALID_NODE_COUNT",
            Self::AlreadyRunning(_) => "LAUNCH_ALREADY_RUNNING",
            Self::Config(_) => "LAUNCH_CONFIG",
            Self::InvalidUrl(_) => "LAUNCH_INVALID_URL",
            Self::PortConflict(_) => "LAUNCH_PORT_CONFLICT",
            Self::Start { .. } => "LAUNCH_START_FAILED",
            Self::NodeExited { .. } => "LAUNCH_NODE_EXITED",
            Self::NotReady { .. } => "LAUNCH_NOT_READY",
            Self::Io(_) => "LAUNCH_IO",
        }
    }
}

/// Errors raised while retrieving or parsing a validator's object store.
///
/// A `FetchError` means no snapshot could be obtained; it never means an
/// object was absent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The endpoint URL could not be parsed.
    #[error("Invalid validator URL '{0}'")]
    InvalidUrl(String),
    /// The request could not be delivered or the response body not read.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The request did not complete within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// The endpoint answered with a non-success status.
    #[error("Validator returned HTTP status {0}")]
    Status(u16),
    /// The response failed structural validation.
    #[error("Malformed store response: {0}")]
    Malformed(String),
}

impl ErrorCode for FetchError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "FETCH_INVALID_URL",
            Self::Transport(_) => "FETCH_TRANSPORT",
            Self::Timeout(_) => "FETCH_TIMEOUT",
            Self::Status(_) => "FETCH_STATUS",
            Self::Malformed(_) => "FETCH_MALFORMED",
        }
    }
}

/// Errors raised while writing a result archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Reading node data or writing the archive failed.
    #[error("Archive I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for ArchiveError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "ARCHIVE_IO",
        }
    }
}
