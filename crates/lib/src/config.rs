//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.handset/config.json`) and environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backend base URL used when neither config nor HANDSET_API_URL sets one.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:9000";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Remote chat backend settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Conversation behaviour (welcome delay).
    #[serde(default)]
    pub chat: ChatConfig,

    /// Local key/value store location.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Backend URL and health probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL of the backend. Overridden by HANDSET_API_URL env.
    pub url: Option<String>,

    /// Timeout for GET /health in milliseconds (default 2000).
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,

    /// How long a health result is reused before probing again (default 30).
    #[serde(default = "default_health_cache_secs")]
    pub health_cache_secs: u64,
}

fn default_health_timeout_ms() -> u64 {
    2000
}

fn default_health_cache_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            health_timeout_ms: default_health_timeout_ms(),
            health_cache_secs: default_health_cache_secs(),
        }
    }
}

impl BackendConfig {
    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn health_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.health_cache_secs)
    }
}

/// Chat session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// Delay before the welcome message appears on a fresh session (default 800).
    #[serde(default = "default_welcome_delay_ms")]
    pub welcome_delay_ms: u64,
}

fn default_welcome_delay_ms() -> u64 {
    800
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            welcome_delay_ms: default_welcome_delay_ms(),
        }
    }
}

impl ChatConfig {
    pub fn welcome_delay(&self) -> Duration {
        Duration::from_millis(self.welcome_delay_ms)
    }
}

/// Local store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Store file. Relative paths are resolved against the config file's parent. Default: storage.json next to the config.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Resolve the backend base URL: env HANDSET_API_URL overrides config.
pub fn resolve_backend_url(config: &Config) -> String {
    backend_url_with_env(config, std::env::var("HANDSET_API_URL").ok())
}

fn backend_url_with_env(config: &Config, env: Option<String>) -> String {
    env.and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
    .or_else(|| {
        config
            .backend
            .url
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
    .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
    .trim_end_matches('/')
    .to_string()
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("HANDSET_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".handset").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the store file: `storage.path` if set (relative to the config file's parent), otherwise `storage.json` beside the config.
pub fn resolve_storage_path(config: &Config, config_path: &Path) -> PathBuf {
    let dir = config_dir(config_path);
    match &config.storage.path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                dir.join(p)
            }
        }
        _ => dir.join("storage.json"),
    }
}

/// Load config from the given path, or the default path. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
