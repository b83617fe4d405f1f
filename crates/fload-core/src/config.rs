use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::location::NodeId;

/// curl timeouts shared by the HTTP fallback and the range gateway transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Abort when throughput stays below this many bytes/s...
    pub low_speed_limit_bytes: u32,
    /// ...for this many seconds.
    pub low_speed_time_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
        }
    }
}

/// Global configuration loaded from `~/.config/fload/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloadConfig {
    /// Directory holding temp, IV and final files. Defaults to the XDG cache dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Minimum spacing between consecutive cache decodes, in milliseconds.
    pub decode_pace_ms: u64,
    #[serde(default)]
    pub http: HttpConfig,
    /// Node id -> base URL of its range gateway.
    #[serde(default)]
    pub nodes: BTreeMap<String, String>,
}

impl Default for FloadConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            decode_pace_ms: 20,
            http: HttpConfig::default(),
            nodes: BTreeMap::new(),
        }
    }
}

impl FloadConfig {
    /// Configured cache dir, or `$XDG_CACHE_HOME/fload`.
    pub fn resolved_cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("fload")?;
        Ok(xdg_dirs.get_cache_home())
    }

    /// Gateway table keyed by node. Entries whose key is not an integer are skipped.
    pub fn node_gateways(&self) -> HashMap<NodeId, String> {
        self.nodes
            .iter()
            .filter_map(|(k, v)| match k.trim().parse::<i32>() {
                Ok(n) => Some((NodeId(n), v.clone())),
                Err(_) => {
                    tracing::warn!(key = %k, "ignoring [nodes] entry with non-numeric node id");
                    None
                }
            })
            .collect()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fload")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FloadConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<FloadConfig> {
    if !path.exists() {
        let default_cfg = FloadConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: FloadConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
