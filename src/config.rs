//! Configuration for the harness.
//!
//! Every field has a default matching the dockerized test node, so an empty
//! TOML file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::step::RetryPolicy;

/// Errors raised while loading or saving configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for [`HarnessConfig`].
    #[error("configuration error: {0}")]
    Parse(String),
}

/// Where the node listens and how patient the harness is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// JSON-RPC server address.
    #[serde(default = "default_jsonrpc_addr")]
    pub jsonrpc_addr: String,

    /// Peer-to-peer listener address.
    #[serde(default = "default_p2p_addr")]
    pub p2p_addr: String,

    /// Name of the node process to look for, if any.
    #[serde(default)]
    pub node_process: Option<String>,

    /// File holding a pre-built data request submission, one JSON line.
    #[serde(default = "default_request_file")]
    pub request_file: PathBuf,

    /// Blocks that may be rejected per lifecycle stage before giving up.
    #[serde(default = "default_block_retries")]
    pub block_retries: u32,

    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Polling used while waiting for the node's ports to open.
    #[serde(default)]
    pub startup: RetryPolicy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            jsonrpc_addr: default_jsonrpc_addr(),
            p2p_addr: default_p2p_addr(),
            node_process: None,
            request_file: default_request_file(),
            block_retries: default_block_retries(),
            log_level: default_log_level(),
            startup: RetryPolicy::default(),
        }
    }
}

impl HarnessConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn default_jsonrpc_addr() -> String {
    "127.0.0.1:21338".to_string()
}

fn default_p2p_addr() -> String {
    "127.0.0.1:21337".to_string()
}

fn default_request_file() -> PathBuf {
    PathBuf::from("/requests/bitcoin_price.json")
}

const fn default_block_retries() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}
