//! Configuration management for the shelf kiosk.
//!
//! Loads configuration from ${SHELF_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `gateway_url`.
pub const GATEWAY_URL_ENV: &str = "SHELF_GATEWAY_URL";

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// New comments/sections from the template are always present,
/// while the user's customized values are kept.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;
    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for kiosk configuration and data directories.
    //!
    //! SHELF_HOME resolution order:
    //! 1. SHELF_HOME environment variable (if set)
    //! 2. ~/.config/smart-shelf (default)

    use std::path::PathBuf;

    /// Returns the kiosk home directory.
    pub fn shelf_home() -> PathBuf {
        if let Ok(home) = std::env::var("SHELF_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("smart-shelf")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        shelf_home().join("config.toml")
    }

    /// Returns the default cache directory.
    pub fn cache_dir() -> PathBuf {
        shelf_home().join("cache")
    }

    /// Returns the default log directory.
    pub fn logs_dir() -> PathBuf {
        shelf_home().join("logs")
    }
}

/// Timers and delays used by the orchestrator and the Gateway client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    pub auto_return_secs: u64,
    pub scan_confirm_delay_ms: u64,
    pub lms_lookup_delay_ms: u64,
    pub notification_secs: u64,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            auto_return_secs: 7,
            scan_confirm_delay_ms: 1500,
            lms_lookup_delay_ms: 1000,
            notification_secs: 3,
            poll_interval_secs: 10,
            request_timeout_secs: 10,
        }
    }
}

impl TimingConfig {
    pub fn auto_return(&self) -> Duration {
        Duration::from_secs(self.auto_return_secs)
    }

    pub fn scan_confirm_delay(&self) -> Duration {
        Duration::from_millis(self.scan_confirm_delay_ms)
    }

    pub fn lms_lookup_delay(&self) -> Duration {
        Duration::from_millis(self.lms_lookup_delay_ms)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notification_secs)
    }

    /// Poll interval for degraded mode. Never shorter than one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Push channel (WebSocket) configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PushConfig {
    pub enabled: bool,
    pub max_reconnect_attempts: u32,
    pub reconnect_backoff_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_reconnect_attempts: 5,
            reconnect_backoff_secs: 3,
        }
    }
}

impl PushConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }
}

/// File logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub file_logging: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_logging: true,
            directory: None,
        }
    }
}

impl LoggingConfig {
    /// Returns the effective log directory.
    pub fn effective_directory(&self) -> PathBuf {
        non_empty(self.directory.as_deref()).map_or_else(paths::logs_dir, PathBuf::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub gateway_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shelf_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
    pub timing: TimingConfig,
    pub push: PushConfig,
    pub logging: LoggingConfig,
}

impl Config {
    const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8000";

    /// Loads configuration from the default config path and applies
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&paths::config_path())?;
        if let Ok(url) = std::env::var(GATEWAY_URL_ENV)
            && !url.trim().is_empty()
        {
            config.gateway_url = url.trim().to_string();
        }
        Ok(config)
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Configured shelf id, ignoring blank values.
    pub fn effective_shelf_id(&self) -> Option<&str> {
        non_empty(self.shelf_id.as_deref())
    }

    /// Directory backing the local key-value cache.
    pub fn effective_cache_dir(&self) -> PathBuf {
        non_empty(self.cache_dir.as_deref()).map_or_else(paths::cache_dir, PathBuf::from)
    }

    /// Saves a single top-level string key (`gateway_url` or `shelf_id`).
    ///
    /// Creates the file with the default template if it doesn't exist.
    /// If the file exists, merges user values into the latest template.
    pub fn save_value_to(path: &Path, key: &str, value: &str) -> Result<()> {
        use toml_edit::DocumentMut;

        if !matches!(key, "gateway_url" | "shelf_id") {
            anyhow::bail!("Unknown config key '{key}' (expected gateway_url or shelf_id)");
        }

        let contents = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            merge_with_template(&user_config)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        doc[key] = toml_edit::value(value);

        Self::write_config(path, &doc.to_string())
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: Self::DEFAULT_GATEWAY_URL.to_string(),
            shelf_id: None,
            cache_dir: None,
            timing: TimingConfig::default(),
            push: PushConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.timing.auto_return(), Duration::from_secs(7));
        assert_eq!(config.push.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            "gateway_url = \"http://gw:9000\"\n[timing]\nauto_return_secs = 12\n",
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.gateway_url, "http://gw:9000");
        assert_eq!(config.timing.auto_return_secs, 12);
        assert_eq!(config.timing.scan_confirm_delay_ms, 1500);
        assert!(config.push.enabled);
    }

    #[test]
    fn test_default_template_parses_to_defaults() {
        let config: Config = toml::from_str(default_config_template()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_init_creates_config_with_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();

        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("gateway_url = \"http://127.0.0.1:8000\""));
        assert!(contents.contains("# shelf_id ="));
    }

    #[test]
    fn test_init_fails_if_exists() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "").unwrap();

        assert!(Config::init(&config_path).is_err());
    }

    #[test]
    fn test_save_value_preserves_other_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "shelf_id = \"PC7\"\n[timing]\npoll_interval_secs = 30\n").unwrap();

        Config::save_value_to(&config_path, "gateway_url", "http://10.0.0.5:8000").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.gateway_url, "http://10.0.0.5:8000");
        assert_eq!(config.effective_shelf_id(), Some("PC7"));
        assert_eq!(config.timing.poll_interval_secs, 30);

        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("# Smart Shelf Configuration"));
    }

    #[test]
    fn test_save_value_rejects_unknown_key() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        assert!(Config::save_value_to(&config_path, "timing", "x").is_err());
        assert!(!config_path.exists());
    }

    #[test]
    fn test_blank_optional_paths_fall_back() {
        let config = Config {
            shelf_id: Some("  ".to_string()),
            cache_dir: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(config.effective_shelf_id(), None);
        assert!(config.effective_cache_dir().ends_with("cache"));
    }
}
