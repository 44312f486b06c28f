use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use tracing::trace;

use crate::entity::{ExpectedRange, NewEntity};
use crate::topology::DEFAULT_SLOT_COUNT;
use crate::util;

/// Measurement log configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory log (no persistence)
    #[serde(rename = "none")]
    None,

    /// Append-only CSV file
    Csv {
        /// Path to the log file
        #[serde(default = "default_log_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Csv {
            path: default_log_path(),
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("./Logs/Log.txt")
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ListenConfig {
    #[serde(default = "util::get_default_addr")]
    pub addr: IpAddr,
    #[serde(default = "util::get_default_port")]
    pub port: u16,
}

impl ListenConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            addr: util::get_default_addr(),
            port: util::get_default_port(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,

    /// Measurement log configuration (defaults to ./Logs/Log.txt)
    #[serde(default)]
    pub storage: StorageConfig,

    /// Number of topology slots
    #[serde(default = "default_slots")]
    pub slots: usize,

    /// Values outside this band are reported as out of range
    #[serde(default)]
    pub expected_range: ExpectedRange,

    /// Servers registered at startup
    pub entities: Option<Vec<NewEntity>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            storage: StorageConfig::default(),
            slots: default_slots(),
            expected_range: ExpectedRange::default(),
            entities: None,
        }
    }
}

impl Config {
    /// Apply `NETSERVICE_*` environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(addr) = util::get_addr() {
            self.listen.addr = addr;
        }
        if let Some(port) = util::get_port() {
            self.listen.port = port;
        }
        if let Some(path) = util::get_log_path() {
            self.storage = StorageConfig::Csv { path };
        }
        self
    }
}

fn default_slots() -> usize {
    DEFAULT_SLOT_COUNT
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    parse_config(&file_content)
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
