//! Configuration management for cogwar
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files. Every section has defaults, so a file only needs the values it
//! changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analytics::{BaselineMethod, BurstDetector, DetectorConfig, Granularity, Sensitivity};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Dashboard server configuration
    pub server: ServerConfig,

    /// Burst detection defaults
    pub analysis: AnalysisConfig,

    /// Result cache configuration
    pub cache: CacheConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/cogwar.db"),
        }
    }
}

/// Dashboard server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Allow cross-origin requests
    pub enable_cors: bool,

    /// Log every HTTP request
    pub enable_request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 8050,
            enable_cors: true,
            enable_request_logging: true,
        }
    }
}

/// Burst detection defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Granularity used when a query names none
    pub default_granularity: Granularity,

    /// Sensitivity used when a query names none
    pub default_sensitivity: f64,

    /// Minimum number of buckets in a series
    pub min_buckets: usize,

    /// Minimum number of buckets holding events
    pub min_populated_buckets: usize,

    /// Upper bound on buckets per series
    pub max_buckets: usize,

    /// Baseline estimation strategy
    pub baseline: BaselineMethod,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let detector = DetectorConfig::default();
        Self {
            default_granularity: Granularity::Month,
            default_sensitivity: Sensitivity::DEFAULT,
            min_buckets: detector.min_buckets,
            min_populated_buckets: detector.min_populated_buckets,
            max_buckets: detector.max_buckets,
            baseline: detector.baseline,
        }
    }
}

impl AnalysisConfig {
    /// Detector tunables from this section
    #[must_use]
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            min_buckets: self.min_buckets,
            min_populated_buckets: self.min_populated_buckets,
            max_buckets: self.max_buckets,
            baseline: self.baseline,
        }
    }

    /// Build a detector from this section
    pub fn detector(&self) -> Result<BurstDetector> {
        BurstDetector::new(self.detector_config()).context("Invalid analysis configuration")
    }

    /// Default sensitivity as a validated value
    pub fn sensitivity(&self) -> Result<Sensitivity> {
        Sensitivity::new(self.default_sensitivity).context("Invalid default_sensitivity")
    }
}

/// Result cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the result cache
    pub enabled: bool,

    /// Entry lifetime in seconds (default: 1 hour)
    pub ttl_secs: u64,

    /// Maximum number of cached analyses
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            max_entries: 1000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let sqlite_path = std::env::var("COGWAR_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database.sqlite_path);

        let host = std::env::var("COGWAR_HOST").unwrap_or(defaults.server.host);
        let port = env_parse("COGWAR_PORT").unwrap_or(defaults.server.port);

        let default_granularity =
            env_parse("COGWAR_GRANULARITY").unwrap_or(defaults.analysis.default_granularity);
        let default_sensitivity =
            env_parse("COGWAR_SENSITIVITY").unwrap_or(defaults.analysis.default_sensitivity);
        let max_buckets = env_parse("COGWAR_MAX_BUCKETS").unwrap_or(defaults.analysis.max_buckets);

        let cache_enabled = env_parse("COGWAR_CACHE_ENABLED").unwrap_or(defaults.cache.enabled);
        let cache_ttl = env_parse("COGWAR_CACHE_TTL").unwrap_or(defaults.cache.ttl_secs);
        let cache_max_entries =
            env_parse("COGWAR_CACHE_MAX_ENTRIES").unwrap_or(defaults.cache.max_entries);

        let log_level = std::env::var("COGWAR_LOG_LEVEL").unwrap_or(defaults.logging.level);
        let log_format = std::env::var("COGWAR_LOG_FORMAT").unwrap_or(defaults.logging.format);

        Ok(Self {
            database: DatabaseConfig { sqlite_path },
            server: ServerConfig {
                host,
                port,
                ..defaults.server
            },
            analysis: AnalysisConfig {
                default_granularity,
                default_sensitivity,
                max_buckets,
                ..defaults.analysis
            },
            cache: CacheConfig {
                enabled: cache_enabled,
                ttl_secs: cache_ttl,
                max_entries: cache_max_entries,
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from `path` if given, otherwise from the environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        self.analysis.sensitivity()?;
        self.analysis.detector()?;

        if self.cache.enabled && self.cache.max_entries == 0 {
            anyhow::bail!("cache max_entries must be greater than 0 when the cache is enabled");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!(
                "log format must be 'text' or 'json', got '{}'",
                self.logging.format
            );
        }

        Ok(())
    }

    /// Dashboard bind address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid bind address {}:{}",
                    self.server.host, self.server.port
                )
            })
    }

    /// Get cache TTL as Duration
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::DEFAULT_MAX_BUCKETS;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.max_buckets, DEFAULT_MAX_BUCKETS);
    }

    #[test]
    fn test_invalid_sensitivity() {
        let mut config = Config::default();
        config.analysis.default_sensitivity = 12.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = String::from("xml");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_window() {
        let mut config = Config::default();
        config.analysis.baseline = BaselineMethod::MovingWindow { half_width: 0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
                [server]
                port = 9000

                [analysis]
                default_granularity = "week"
                baseline = { method = "moving_window", half_width = 6 }
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.analysis.default_granularity, Granularity::Week);
        assert_eq!(
            config.analysis.baseline,
            BaselineMethod::MovingWindow { half_width: 6 }
        );
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr().unwrap().port(), 8050);
    }

    #[test]
    fn test_cache_ttl_conversion() {
        let config = Config::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
    }
}
