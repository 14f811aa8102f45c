use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use radiosub_coordinator::{CoordinatorConfig, DEFAULT_SWEEP_INTERVAL, DEFAULT_TIMEOUT};

use crate::RadiosubdResult;

pub const CONFIG_VAR: &str = "RADIOSUBD_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./radiosubd.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Node `n` listens on `base_port + n`
    pub base_port: u16,
    /// Zero, the default, never evicts silent clients
    pub node_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    /// Zero disables stats reports
    pub stats_interval_secs: u64,
    pub log_dir: PathBuf,
    /// JSON lines file receiving relayed frames, none to skip relaying
    pub relay_log: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            base_port: 47000,
            node_timeout_secs: DEFAULT_TIMEOUT,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL,
            stats_interval_secs: 60,
            log_dir: PathBuf::from("./logs"),
            relay_log: None,
        }
    }
}

impl DaemonConfig {
    /// Load from `$RADIOSUBD_CONFIG`, or `./radiosubd.json` when unset
    pub fn load() -> RadiosubdResult<Self> {
        let path = std::env::var_os(CONFIG_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::from_path(&path)
    }

    /// A missing file yields the defaults; an unreadable or malformed one
    /// is an error
    pub fn from_path(path: &Path) -> RadiosubdResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            node_timeout: Duration::from_secs(self.node_timeout_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}
