// Path: crates/types/src/config.rs

//! Configuration handed to validator processes.
//!
//! A validator accepts a flat mapping of named options. Only a handful of
//! keys are interpreted by the harness itself; everything else is passed
//! through to the validator untouched.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

/// Transaction families the validator loads on startup.
pub const TRANSACTION_FAMILIES: &str = "TransactionFamilies";
/// Seconds of consensus timing a fresh cluster needs before it is trusted.
pub const INITIAL_WAIT_TIME: &str = "InitialWaitTime";
/// Target seconds between committed blocks once the cluster has settled.
pub const TARGET_WAIT_TIME: &str = "TargetWaitTime";
/// Interface the validator binds its HTTP and gossip sockets to.
pub const HOST: &str = "Host";

/// The marketplace transaction family every harness cluster needs.
pub const MARKET_PLACE_FAMILY: &str = "mktplace.transactions.market_place";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_WAIT_SECS: f64 = 1.0;

/// The pair of ports a single validator binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePorts {
    /// Port of the HTTP endpoint that serves state and accepts transactions.
    pub http: u16,
    /// Port of the peer-to-peer gossip socket.
    pub gossip: u16,
}

impl NodePorts {
    /// Ports for the `index`-th node of a cluster, derived from base ports.
    pub fn derive(http_base: u16, gossip_base: u16, index: usize) -> Option<Self> {
        let offset = u16::try_from(index).ok()?;
        Some(Self {
            http: http_base.checked_add(offset)?,
            gossip: gossip_base.checked_add(offset)?,
        })
    }
}

/// A mapping of named validator options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatorConfig {
    options: Map<String, Value>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self::empty()
            .with_option(
                TRANSACTION_FAMILIES,
                Value::Array(vec![Value::from(MARKET_PLACE_FAMILY)]),
            )
            .with_option(INITIAL_WAIT_TIME, DEFAULT_WAIT_SECS)
            .with_option(TARGET_WAIT_TIME, DEFAULT_WAIT_SECS)
            .with_option(HOST, DEFAULT_HOST)
    }
}

impl ValidatorConfig {
    /// A configuration with no options set.
    pub fn empty() -> Self {
        Self {
            options: Map::new(),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let options: Map<String, Value> = serde_json::from_str(s)?;
        let config = Self { options };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let options: Map<String, Value> = toml::from_str(s)?;
        let config = Self { options };
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file and overlays it on the default configuration.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let file = Self::from_toml_str(&contents)?;
        Ok(Self::default().merged(file.as_map()))
    }

    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set_option(key, value);
        self
    }

    pub fn set_option(&mut self, key: &str, value: impl Into<Value>) {
        self.options.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Returns a copy with every key of `overrides` replacing ours.
    pub fn merged(&self, overrides: &Map<String, Value>) -> Self {
        let mut options = self.options.clone();
        for (k, v) in overrides {
            options.insert(k.clone(), v.clone());
        }
        Self { options }
    }

    pub fn transaction_families(&self) -> Vec<String> {
        match self.options.get(TRANSACTION_FAMILIES) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Appends `family` to `TransactionFamilies` unless it is already listed.
    pub fn enable_transaction_family(mut self, family: &str) -> Self {
        let mut families = self.transaction_families();
        if !families.iter().any(|f| f == family) {
            families.push(family.to_string());
        }
        let values = families.into_iter().map(Value::from).collect();
        self.options
            .insert(TRANSACTION_FAMILIES.to_string(), Value::Array(values));
        self
    }

    pub fn initial_wait_time(&self) -> Duration {
        self.seconds(INITIAL_WAIT_TIME).unwrap_or(Duration::ZERO)
    }

    pub fn target_wait_time(&self) -> Duration {
        self.seconds(TARGET_WAIT_TIME).unwrap_or(Duration::ZERO)
    }

    pub fn host(&self) -> &str {
        self.options
            .get(HOST)
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_HOST)
    }

    fn seconds(&self, key: &str) -> Option<Duration> {
        self.options.get(key).and_then(wait_duration)
    }

    /// Checks the well-known options have the shape the harness expects.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for key in [INITIAL_WAIT_TIME, TARGET_WAIT_TIME] {
            if let Some(value) = self.options.get(key) {
                if wait_duration(value).is_none() {
                    return Err(ConfigError::InvalidOption {
                        key: key.to_string(),
                        reason: format!("expected a non-negative number of seconds, got {value}"),
                    });
                }
            }
        }
        if let Some(value) = self.options.get(TRANSACTION_FAMILIES) {
            let ok = value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false);
            if !ok {
                return Err(ConfigError::InvalidOption {
                    key: TRANSACTION_FAMILIES.to_string(),
                    reason: "expected a list of family names".to_string(),
                });
            }
        }
        if let Some(value) = self.options.get(HOST) {
            if !value.is_string() {
                return Err(ConfigError::InvalidOption {
                    key: HOST.to_string(),
                    reason: "expected a host name or address".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Seconds as a `Duration`; `None` for non-numbers, negatives, NaN and values
/// too large to represent.
fn wait_duration(value: &Value) -> Option<Duration> {
    Duration::try_from_secs_f64(value.as_f64()?).ok()
}
