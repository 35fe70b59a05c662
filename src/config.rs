//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/docvault.sqlite"
//!
//! [gateways]
//! urls = ["https://ipfs.io/ipfs/", "https://dweb.link/ipfs/"]
//! timeout_secs = 10
//!
//! [recovery]
//! delay_ms = 750
//! uploaded_by = "recovery"
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```
//!
//! Only `[db]` is required. Gateway URLs are tried in the order listed; a
//! base URL is concatenated with the content reference as-is, so it normally
//! ends with `/`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub gateways: GatewayConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            urls: default_gateway_urls(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_gateway_urls() -> Vec<String> {
    vec![
        "https://ipfs.io/ipfs/".to_string(),
        "https://gateway.pinata.cloud/ipfs/".to_string(),
        "https://dweb.link/ipfs/".to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecoveryConfig {
    /// Pause between two processed records, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Value written to `document_storage.uploaded_by`.
    #[serde(default = "default_uploaded_by")]
    pub uploaded_by: String,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            uploaded_by: default_uploaded_by(),
        }
    }
}

fn default_delay_ms() -> u64 {
    750
}

fn default_uploaded_by() -> String {
    "recovery".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

/// Checks the invariants `load_config` enforces. Exposed for configs built in code.
pub fn validate(config: &Config) -> Result<()> {
    // Gateways
    if config.gateways.urls.is_empty() {
        anyhow::bail!("gateways.urls must list at least one gateway base URL");
    }
    for url in &config.gateways.urls {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!(
                "gateway URL '{}' must start with http:// or https://",
                url
            );
        }
    }
    if config.gateways.timeout_secs == 0 {
        anyhow::bail!("gateways.timeout_secs must be > 0");
    }

    // Recovery
    if config.recovery.uploaded_by.trim().is_empty() {
        anyhow::bail!("recovery.uploaded_by must not be empty");
    }

    Ok(())
}
