//! Scan and sync configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for local tree scans.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct ScanConfig {
    /// Follow symbolic links into directories.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Patterns to ignore (exact name, `prefix*` or `*suffix`).
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Traversal threads (1 = serial, 0 = shared rayon pool).
    #[builder(default = "1")]
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,
}

fn default_true() -> bool {
    true
}

fn default_threads() -> usize {
    1
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Check if a name should be ignored based on patterns.
    pub fn should_ignore(&self, name: &str) -> bool {
        self.ignore_patterns.iter().any(|pattern| {
            if let Some(prefix) = pattern.strip_suffix('*') {
                name.starts_with(prefix)
            } else if let Some(suffix) = pattern.strip_prefix('*') {
                name.ends_with(suffix)
            } else {
                name == pattern
            }
        })
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            ignore_patterns: Vec::new(),
            threads: default_threads(),
            include_hidden: true,
        }
    }
}

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration for a sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct SyncConfig {
    /// Attempts made to fetch a dataset listing before giving up.
    #[builder(default = "24")]
    pub listing_max_attempts: u32,

    /// Fixed delay between listing attempts, in milliseconds.
    #[builder(default = "5000")]
    pub listing_retry_delay_ms: u64,

    /// Interval between remote hash polls, in milliseconds.
    #[builder(default = "2000")]
    pub hash_poll_interval_ms: u64,

    /// Upper bound on waiting for a remote hash, in milliseconds.
    #[builder(default = "120000")]
    pub hash_poll_timeout_ms: u64,

    /// Local scan settings.
    #[builder(default)]
    pub scan: ScanConfig,
}

impl SyncConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.listing_max_attempts == Some(0) {
            return Err("listing_max_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            listing_max_attempts: 24,
            listing_retry_delay_ms: 5000,
            hash_poll_interval_ms: 2000,
            hash_poll_timeout_ms: 120_000,
            scan: ScanConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Create a new sync config builder.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Default location: `<config dir>/datasync/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("datasync").join("config.toml"))
    }

    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if config.listing_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "listing_max_attempts must be at least 1".to_string(),
            });
        }

        Ok(config)
    }

    /// Delay between listing attempts.
    pub fn listing_retry_delay(&self) -> Duration {
        Duration::from_millis(self.listing_retry_delay_ms)
    }

    /// Interval between hash polls.
    pub fn hash_poll_interval(&self) -> Duration {
        Duration::from_millis(self.hash_poll_interval_ms)
    }

    /// Timeout for hash polling.
    pub fn hash_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.hash_poll_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_config_builder() {
        let config = ScanConfig::builder()
            .threads(4usize)
            .follow_symlinks(true)
            .build()
            .unwrap();

        assert_eq!(config.threads, 4);
        assert!(config.follow_symlinks);
        assert!(config.include_hidden);
    }

    #[test]
    fn test_should_ignore() {
        let config = ScanConfig::builder()
            .ignore_patterns(vec!["node_modules".to_string(), "*.log".to_string(), "tmp*".to_string()])
            .build()
            .unwrap();

        assert!(config.should_ignore("node_modules"));
        assert!(config.should_ignore("test.log"));
        assert!(config.should_ignore("tmp_output"));
        assert!(!config.should_ignore("src"));
    }

    #[test]
    fn test_sync_config_rejects_zero_attempts() {
        let result = SyncConfig::builder().listing_max_attempts(0u32).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.listing_max_attempts, 24);
        assert_eq!(config.listing_retry_delay(), Duration::from_secs(5));
        assert_eq!(config.scan.threads, 1);
    }
}
