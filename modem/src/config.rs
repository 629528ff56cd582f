//! Modem Configuration
//!
//! Configuration file structures. TOML and YAML files are accepted, chosen
//! by file extension; every section falls back to its defaults.

use interfaces::zmq_toolkit::DEFAULT_TOOLKIT_ADDRESS;
use layers::phy::AcquisitionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Cell search parameters
    pub acquisition: AcquisitionConfig,
    /// PHY toolkit connection
    pub toolkit: ToolkitConfig,
    /// Control feed and event publisher
    pub control: ControlConfig,
    /// Receive loop policy
    pub receiver: ReceiverConfig,
    /// Destinations registered at startup
    pub destinations: Vec<DestinationConfig>,
    /// Logging configuration
    pub log: LogConfig,
}

/// PHY toolkit connection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolkitConfig {
    /// REP endpoint of the toolkit process
    pub address: String,
    /// Reply timeout in milliseconds
    pub timeout_ms: i32,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_TOOLKIT_ADDRESS.to_string(),
            timeout_ms: 1000,
        }
    }
}

/// Control plane sockets
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// PUB endpoint delivering decoded SIB13/MCCH messages
    pub feed_address: String,
    /// Address the event publisher binds to
    pub event_address: String,
    /// High water mark of both sockets
    pub hwm: i32,
    /// Control feed poll timeout in milliseconds
    pub recv_timeout_ms: i32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            feed_address: "tcp://localhost:5601".to_string(),
            event_address: "tcp://*:5602".to_string(),
            hwm: 1000,
            recv_timeout_ms: 100,
        }
    }
}

/// Receive loop policy
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Consecutive synchronisation failures before searching again
    pub max_sync_failures: u32,
    /// Report MCCH opportunities
    pub decode_mcch: bool,
    /// Status report period in seconds
    pub status_interval_secs: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            max_sync_failures: 10,
            decode_mcch: true,
            status_interval_secs: 5,
        }
    }
}

/// Destination of an MTCH
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DestinationConfig {
    pub mch_index: usize,
    pub lcid: u8,
    pub dest: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level, overridden by RUST_LOG
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl ModemConfig {
    /// Load configuration from a TOML or YAML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => Self::from_yaml_str(&contents),
            Some("toml") => Self::from_toml_str(&contents),
            _ => Err(anyhow::anyhow!("Unsupported configuration file: {}", path.display())),
        }
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: ModemConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> anyhow::Result<Self> {
        let config: ModemConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> anyhow::Result<()> {
        let prb_ok = |prb: u8| (common::MIN_PRB..=common::MAX_PRB).contains(&prb);

        if !prb_ok(self.acquisition.search_nof_prb) {
            return Err(anyhow::anyhow!("Invalid search PRB count: {}", self.acquisition.search_nof_prb));
        }
        if let Some(prb) = self.acquisition.override_nof_prb {
            if !prb_ok(prb) {
                return Err(anyhow::anyhow!("Invalid PRB override: {}", prb));
            }
        }
        if self.acquisition.rx_channels == 0 {
            return Err(anyhow::anyhow!("At least one receive channel is required"));
        }
        if self.receiver.max_sync_failures == 0 {
            return Err(anyhow::anyhow!("max_sync_failures must be positive"));
        }
        if self.receiver.status_interval_secs == 0 {
            return Err(anyhow::anyhow!("status_interval_secs must be positive"));
        }
        Ok(())
    }
}
