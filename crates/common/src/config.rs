use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub general: General,
    pub http: Http,
    pub etherscan: Etherscan,
    pub solscan: Solscan,
    #[serde(default)]
    pub run: Run,
    #[serde(default)]
    pub observability: Observability,
}

#[derive(Debug, Clone, Deserialize)]
pub struct General {
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Http {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub user_agent: String,
}

impl Http {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

/// Paginated HTML token-transfer listing (Chain A).
#[derive(Debug, Clone, Deserialize)]
pub struct Etherscan {
    pub base_url: String,
    pub page_size: u32,
    pub pacing_delay_ms: u64,
    pub excluded_method: String,
}

/// Cursor-paginated JSON transaction endpoint (Chain B).
#[derive(Debug, Clone, Deserialize)]
pub struct Solscan {
    pub api_url: String,
    pub referer: String,
    pub page_size: u32,
    pub pacing_delay_ms: u64,
    pub transfer_instruction_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub wallet_concurrency: usize,
}

impl Default for Run {
    fn default() -> Self {
        Self {
            wallet_concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Observability {
    pub prometheus_port: Option<u16>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.etherscan.page_size > 0, "etherscan.page_size must be > 0");
        anyhow::ensure!(self.solscan.page_size > 0, "solscan.page_size must be > 0");
        anyhow::ensure!(
            self.run.wallet_concurrency > 0,
            "run.wallet_concurrency must be > 0"
        );
        Ok(())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}
