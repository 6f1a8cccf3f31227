use crate::error::HealthError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: Rpc,
    #[serde(default)]
    pub sampling: Sampling,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Applies `RPC_URL` on top of the file values. CLI flags are applied after this.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("RPC_URL") {
            let url = url.trim();
            if !url.is_empty() {
                self.rpc.url = url.to_string();
            }
        }
        self
    }

    pub fn request_timeout(&self) -> Result<Duration, HealthError> {
        if self.rpc.timeout_seconds == 0 {
            return Err(HealthError::config("rpc.timeout_seconds must be positive"));
        }
        Ok(Duration::from_secs(self.rpc.timeout_seconds))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rpc {
    pub url: String,
    pub timeout_seconds: u64,
    pub max_parallel_requests: usize,
}
impl Default for Rpc {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".into(),
            timeout_seconds: 30,
            max_parallel_requests: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sampling {
    /// Signed so that zero and negative values from a file reach validation instead of
    /// failing to parse.
    pub block_count: i64,
}
impl Default for Sampling {
    fn default() -> Self {
        Self { block_count: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_block_count: u32,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_block_count: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub json: bool,
    pub include_blocks: bool,
    pub utilization_bar: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            json: false,
            include_blocks: false,
            utilization_bar: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
