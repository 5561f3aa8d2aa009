use crate::index::Mode;
use crate::index::build::{DEFAULT_MEMORY_CHECK_INTERVAL, DEFAULT_MEMORY_THRESHOLD_PERCENT};
use crate::query::{DEFAULT_CHUNK_CACHE_CAPACITY, DEFAULT_MAX_RESULTS, DEFAULT_YIELD_EVERY};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "slicegrep";
const CONFIG_FILE: &str = "config.json";

/// User configuration stored in the app config directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Mode to use instead of the size-based recommendation
    #[serde(default)]
    pub default_mode: Option<Mode>,

    /// Stop a search after this many matching lines
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Yield to the scheduler every N accumulated results
    #[serde(default = "default_yield_every")]
    pub yield_every: usize,

    /// Sample memory every N chunks while indexing
    #[serde(default = "default_memory_check_interval")]
    pub memory_check_interval: u64,

    /// Abort indexing above this share of the memory limit
    #[serde(default = "default_memory_threshold_percent")]
    pub memory_threshold_percent: u8,

    /// Limit used when the platform reports none
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,

    /// Decoded chunks kept alive during one search
    #[serde(default = "default_chunk_cache_capacity")]
    pub chunk_cache_capacity: usize,

    /// Results per printed page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Lines included in the clipboard text
    #[serde(default = "default_copy_limit")]
    pub copy_limit: usize,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_yield_every() -> usize {
    DEFAULT_YIELD_EVERY
}

fn default_memory_check_interval() -> u64 {
    DEFAULT_MEMORY_CHECK_INTERVAL
}

fn default_memory_threshold_percent() -> u8 {
    DEFAULT_MEMORY_THRESHOLD_PERCENT
}

fn default_memory_limit_mb() -> u64 {
    1500
}

fn default_chunk_cache_capacity() -> usize {
    DEFAULT_CHUNK_CACHE_CAPACITY
}

fn default_page_size() -> usize {
    100
}

fn default_copy_limit() -> usize {
    100
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_mode: None,
            max_results: default_max_results(),
            yield_every: default_yield_every(),
            memory_check_interval: default_memory_check_interval(),
            memory_threshold_percent: default_memory_threshold_percent(),
            memory_limit_mb: default_memory_limit_mb(),
            chunk_cache_capacity: default_chunk_cache_capacity(),
            page_size: default_page_size(),
            copy_limit: default_copy_limit(),
        }
    }
}

impl AppConfig {
    /// Load config from the app config directory, or return default if not found
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;
        Ok(config)
    }

    /// Save config to the app config directory
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content).context("Failed to write config file")?;
        Ok(())
    }
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

/// Application config directory (not created here; nothing is written
/// unless a config is saved)
pub fn get_config_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else {
        // Linux/Unix: XDG_CONFIG_HOME or ~/.config; Windows: roaming AppData
        dirs::config_dir()
    };

    let base = base.context("Could not determine config directory")?;
    Ok(base.join(APP_NAME))
}
