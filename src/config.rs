//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$GMAIL_MBOX_CONFIG` (environment variable)
//! 2. `~/.config/gmail-mbox/config.toml` (Linux/macOS)
//!    `%APPDATA%\gmail-mbox\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::parser::mbox::DEFAULT_MAX_LINE_SIZE;
use crate::parser::mime::DEFAULT_MAX_DEPTH;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "GMAIL_MBOX_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Import defaults.
    pub import: ImportConfig,
    /// Database settings.
    pub storage: StorageConfig,
    /// Performance tuning and parser limits.
    pub performance: PerformanceConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Import defaults used when the command line leaves them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// MBOX archive to read.
    pub input: PathBuf,
    /// SQLite database to write.
    pub database: PathBuf,
}

/// Database settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Disable journaling and syncing while importing.
    pub fast_inserts: bool,
}

/// Performance tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Longest accepted MBOX line in bytes (default: 1 MB).
    pub max_line_size: usize,
    /// Deepest accepted multipart nesting.
    pub max_mime_depth: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("Takeout/Mail/All mail Including Spam and Trash.mbox"),
            database: PathBuf::from("out.db"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { fast_inserts: true }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_line_size: DEFAULT_MAX_LINE_SIZE,
            max_mime_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("gmail-mbox").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gmail-mbox")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("gmail-mbox.log")
}
