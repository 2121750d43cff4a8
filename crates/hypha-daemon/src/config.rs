// crates/hypha-daemon/src/config.rs
//
// Runtime configuration for the Hypha daemon.
// Loaded from a TOML file or populated with defaults. The `[economics]`
// table maps directly onto `EconomicsConfig`.

use std::fs;

use serde::Deserialize;
use thiserror::Error;

use hypha_core::{Address, Amount, HyphaError, Timestamp};
use hypha_economics::{EconomicsConfig, Engine, OracleGate};
use hypha_rpc::handle::DEFAULT_EVENT_CAPACITY;
use hypha_rpc::RpcConfig;

/// Errors raised while loading or applying the daemon configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] HyphaError),

    #[error("Missing required setting '{0}'")]
    Missing(&'static str),
}

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Host address for the RPC server.
    #[serde(default = "default_rpc_host")]
    pub rpc_host: String,

    /// Port for the RPC server.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Log level: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between scheduler ticks (epoch and report-expiry checks).
    #[serde(default = "default_trigger_interval_secs")]
    pub trigger_interval_secs: u64,

    /// Administrator address allowed to change parameters.
    #[serde(default)]
    pub admin: Option<String>,

    /// Hex-encoded ed25519 public key of the metrics oracle.
    #[serde(default)]
    pub oracle_public_key: Option<String>,

    /// Initially designated report reviewers.
    #[serde(default)]
    pub reviewers: Vec<String>,

    /// Amount placed in the rewards pool at startup.
    #[serde(default)]
    pub initial_rewards_pool: Amount,

    /// Capacity of the event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Economic parameters.
    #[serde(default)]
    pub economics: EconomicsConfig,
}

fn default_rpc_host() -> String {
    "127.0.0.1".to_string()
}

fn default_rpc_port() -> u16 {
    50061
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_trigger_interval_secs() -> u64 {
    60
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            rpc_host: default_rpc_host(),
            rpc_port: default_rpc_port(),
            log_level: default_log_level(),
            trigger_interval_secs: default_trigger_interval_secs(),
            admin: None,
            oracle_public_key: None,
            reviewers: Vec::new(),
            initial_rewards_pool: 0,
            event_capacity: default_event_capacity(),
            economics: EconomicsConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// RPC bind settings.
    pub fn rpc(&self) -> RpcConfig {
        RpcConfig {
            host: self.rpc_host.clone(),
            port: self.rpc_port,
        }
    }

    /// Build the engine described by this configuration, with its first
    /// epoch starting at `genesis`.
    pub fn build_engine(&self, genesis: Timestamp) -> Result<Engine, ConfigError> {
        let admin = Address::parse(self.admin.as_deref().ok_or(ConfigError::Missing("admin"))?)?;
        let oracle_key = self
            .oracle_public_key
            .as_deref()
            .ok_or(ConfigError::Missing("oracle_public_key"))?;
        let oracle = OracleGate::from_hex(oracle_key)?;
        let reviewers = self
            .reviewers
            .iter()
            .map(|r| Address::parse(r))
            .collect::<Result<Vec<_>, _>>()?;

        let mut engine = Engine::new(self.economics.clone(), admin, oracle, reviewers, genesis)?;
        if self.initial_rewards_pool > 0 {
            engine.fund_rewards_pool(self.initial_rewards_pool)?;
        }
        Ok(engine)
    }
}
