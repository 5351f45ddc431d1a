//! `pointsd` configuration file
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//!
//! [storage]
//! data_dir = "/var/lib/points"
//! snapshot_interval_secs = 60
//!
//! [economy]
//! mining_reward = 1000
//! fingerprint_policy = "block"
//!
//! [identity.tokens]
//! "secret-token" = "alice"
//! ```
//!
//! Every field has a default. Command line flags win over the
//! `POINTS_DATA_DIR` environment variable, which wins over the file.

use anyhow::{Context, Result};
use points_economy::EconomyConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DATA_DIR_ENV: &str = "POINTS_DATA_DIR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub economy: EconomyConfig,
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// 0 disables periodic snapshots; one is still written on shutdown
    pub snapshot_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            snapshot_interval_secs: 60,
        }
    }
}

/// Static bearer tokens, token -> account id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub tokens: HashMap<String, String>,
}

impl NodeConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: NodeConfig = toml::from_str(contents)?;
        config.economy.validate()?;
        Ok(config)
    }

    /// Apply command line and environment overrides
    pub fn apply_overrides(
        &mut self,
        bind: Option<SocketAddr>,
        data_dir: Option<PathBuf>,
        env_data_dir: Option<String>,
    ) {
        if let Some(bind) = bind {
            self.server.bind = bind;
        }
        let env_dir = env_data_dir.filter(|d| !d.is_empty()).map(PathBuf::from);
        if let Some(dir) = data_dir.or(env_dir) {
            self.storage.data_dir = dir;
        }
    }
}
