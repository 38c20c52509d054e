//! Engine configuration.

use crate::catalog::types::Address;
use crate::cluster::types::NodeRole;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for one engine process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Host part of this engine's address.
    pub host: String,
    /// Engine port. Together with `host` and `tag` it names this node.
    pub port: u16,
    pub tag: String,
    /// Listen address of the HTTP status endpoint.
    pub http_addr: SocketAddr,
    pub catalog_path: PathBuf,
    /// Cluster state file, re-read whenever it changes.
    pub state_path: PathBuf,
    /// Role this process sends as.
    pub sender_role: NodeRole,
    pub state_poll_interval_ms: u64,
    /// Per-attempt timeout for forwarded messages (ms).
    pub forward_timeout_ms: u64,
    pub forward_attempts: usize,
    /// One of trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 10031,
            tag: "droonga".to_string(),
            http_addr: SocketAddr::from(([127, 0, 0, 1], 11031)),
            catalog_path: PathBuf::from("catalog.json"),
            state_path: PathBuf::from("state.json"),
            sender_role: NodeRole::ServiceProvider,
            state_poll_interval_ms: 1000,
            forward_timeout_ms: 2000,
            forward_attempts: 3,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Overrides host and port from a `host:port` string.
    pub fn set_bind(&mut self, bind: &str) -> anyhow::Result<()> {
        let addr: SocketAddr = bind
            .parse()
            .with_context(|| format!("invalid --bind address {}", bind))?;
        self.host = addr.ip().to_string();
        self.port = addr.port();
        Ok(())
    }

    /// This engine's node name, `host:port/tag`.
    pub fn node_name(&self) -> String {
        Address {
            host: self.host.clone(),
            port: self.port,
            tag: self.tag.clone(),
            local_name: None,
        }
        .node()
    }

    pub fn state_poll_interval(&self) -> Duration {
        Duration::from_millis(self.state_poll_interval_ms.max(1))
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}
