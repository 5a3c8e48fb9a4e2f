//! Server configuration, read from `/etc/openmes/<name>.toml` or a path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Root of the daemon's TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub storage: StorageConfig,

    #[serde(default)]
    pub server: ListenConfig,

    #[serde(default)]
    pub mrp: MrpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the database and other persistent files.
    pub data_dir: String,

    /// SQLite file; defaults to `{data_dir}/data.sqlite`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

/// Switches for the order hooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrpConfig {
    /// Reserve BOM components when an order is confirmed.
    #[serde(default = "enabled")]
    pub reserve_on_confirm: bool,

    /// Tell the order's creator when it completes.
    #[serde(default = "enabled")]
    pub notify_on_complete: bool,
}

impl Default for MrpConfig {
    fn default() -> Self {
        Self {
            reserve_on_confirm: true,
            notify_on_complete: true,
        }
    }
}

fn enabled() -> bool {
    true
}

impl ServerConfig {
    /// A bare name resolves to `/etc/openmes/<name>.toml`; anything with a
    /// `/` or `.` is used as a path.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from("/etc/openmes").join(format!("{name_or_path}.toml"))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Storage settings in the shape the store constructors take.
    pub fn service_config(&self, listen: &str) -> openmes_core::ServiceConfig {
        openmes_core::ServiceConfig {
            data_dir: Some(PathBuf::from(&self.storage.data_dir)),
            sqlite_path: self.storage.sqlite_path.as_ref().map(PathBuf::from),
            listen: listen.to_string(),
        }
    }
}
