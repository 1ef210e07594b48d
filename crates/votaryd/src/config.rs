//! Daemon configuration.
//!
//! Read from `<config_dir>/votary/config.json` when present, then overridden
//! by `VOTARYD_LISTEN`, `VOTARYD_NODE` and `VOTARYD_POLL_MS`. Nothing else
//! is persisted; vote state lives on the remote node.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the daemon IPC server binds to.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Address of the ledger-backed node this daemon polls.
    #[serde(default = "default_node")]
    pub node: String,
    /// Poll period for the open question view, in milliseconds.
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

fn default_listen() -> String {
    "127.0.0.1:7171".to_string()
}

fn default_node() -> String {
    "127.0.0.1:7070".to_string()
}

fn default_poll_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            node: default_node(),
            poll_ms: default_poll_ms(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, String> {
        let mut cfg = match Self::config_file() {
            Some(path) if path.exists() => {
                let raw = fs::read_to_string(&path)
                    .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
                serde_json::from_str(&raw)
                    .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?
            }
            _ => Self::default(),
        };

        if let Ok(v) = std::env::var("VOTARYD_LISTEN") {
            cfg.listen = v;
        }
        if let Ok(v) = std::env::var("VOTARYD_NODE") {
            cfg.node = v;
        }
        if let Ok(v) = std::env::var("VOTARYD_POLL_MS") {
            cfg.poll_ms = v
                .parse()
                .map_err(|e| format!("VOTARYD_POLL_MS: {}", e))?;
        }

        Ok(cfg)
    }

    fn config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("votary").join("config.json"))
    }

    /// Fixed tick period for the poll scheduler, clamped to the 2-3 second
    /// band the view is designed around. No backoff, no jitter.
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_ms.clamp(2000, 3000))
    }
}
