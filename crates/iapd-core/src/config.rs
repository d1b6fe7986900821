//! Configuration management for the IAPD crawler.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main crawler configuration.
///
/// This is loaded from `~/.config/iapd/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP session and politeness settings
    pub session: SessionConfig,
    /// Retry policy for transient HTTP failures
    pub retry: RetryConfig,
    /// Document download settings
    pub download: DownloadConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit file, falling back to defaults if
    /// it does not exist.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides, then validate it.
    ///
    /// Supports the following environment variables:
    /// - `IAPD_MIN_DELAY_SECS`: Override the minimum delay between requests
    /// - `IAPD_MAX_DELAY_SECS`: Override the maximum delay between requests
    /// - `IAPD_TIMEOUT_SECS`: Override the per-request timeout
    /// - `IAPD_MAX_RETRIES`: Override the retry count for transient failures
    /// - `IAPD_OUTPUT_DIR`: Override the default download directory
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `IAPD_*` environment overrides on top of the current values.
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("IAPD_MIN_DELAY_SECS") {
            if let Ok(secs) = val.parse() {
                self.session.min_delay_secs = secs;
                tracing::debug!("Override session.min_delay_secs from env: {}", secs);
            }
        }

        if let Ok(val) = std::env::var("IAPD_MAX_DELAY_SECS") {
            if let Ok(secs) = val.parse() {
                self.session.max_delay_secs = secs;
                tracing::debug!("Override session.max_delay_secs from env: {}", secs);
            }
        }

        if let Ok(val) = std::env::var("IAPD_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.session.timeout_secs = secs;
                tracing::debug!("Override session.timeout_secs from env: {}", secs);
            }
        }

        if let Ok(val) = std::env::var("IAPD_MAX_RETRIES") {
            if let Ok(retries) = val.parse() {
                self.retry.max_retries = retries;
                tracing::debug!("Override retry.max_retries from env: {}", retries);
            }
        }

        if let Ok(val) = std::env::var("IAPD_OUTPUT_DIR") {
            if !val.trim().is_empty() {
                tracing::debug!("Override download.output_dir from env: {}", val);
                self.download.output_dir = Some(PathBuf::from(val));
            }
        }
    }

    /// Check that the values describe a usable crawler configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let session = &self.session;
        if !is_duration_secs(session.min_delay_secs) {
            return Err(invalid("session.min_delay_secs", "must be a finite, non-negative number"));
        }
        if !is_duration_secs(session.max_delay_secs) {
            return Err(invalid("session.max_delay_secs", "must be a finite, non-negative number"));
        }
        if session.min_delay_secs > session.max_delay_secs {
            return Err(invalid(
                "session.max_delay_secs",
                "must be greater than or equal to session.min_delay_secs",
            ));
        }
        if session.timeout_secs == 0 {
            return Err(invalid("session.timeout_secs", "must be at least 1 second"));
        }

        let retry = &self.retry;
        if !is_duration_secs(retry.delay_secs) {
            return Err(invalid("retry.delay_secs", "must be a finite, non-negative number"));
        }
        if !(retry.back_off >= 1.0 && retry.back_off.is_finite()) {
            return Err(invalid("retry.back_off", "must be a finite number >= 1.0"));
        }

        if self.download.fallback_command.is_empty()
            || self.download.fallback_command[0].trim().is_empty()
        {
            return Err(invalid("download.fallback_command", "must name a program"));
        }

        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/iapd/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("gov", "sec", "iapd").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit file, creating its directory.
    pub fn save_to(&self, config_path: &Path) -> ConfigResult<()> {
        let config_dir = config_path
            .parent()
            .ok_or_else(|| invalid("config_path", "no parent directory"))?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }
}

/// Clamp to zero below and to [`Duration::MAX`] above (including NaN and infinity).
fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Whether a seconds value converts to a [`Duration`].
fn is_duration_secs(secs: f64) -> bool {
    secs >= 0.0 && Duration::try_from_secs_f64(secs).is_ok()
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// HTTP session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lower bound of the randomized delay between requests, in seconds
    pub min_delay_secs: f64,
    /// Upper bound of the randomized delay between requests, in seconds
    pub max_delay_secs: f64,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
    /// Referer header sent with every request
    pub referer: String,
}

impl SessionConfig {
    /// Minimum politeness delay.
    #[must_use]
    pub fn min_delay(&self) -> Duration {
        secs_to_duration(self.min_delay_secs)
    }

    /// Maximum politeness delay.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        secs_to_duration(self.max_delay_secs)
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: 1.5,
            max_delay_secs: 2.5,
            timeout_secs: 60,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/72.0.3626.109 Safari/537.36"
                .to_string(),
            referer: "https://adviserinfo.sec.gov/IAPD/default.aspx".to_string(),
        }
    }
}

/// Retry settings for transient HTTP failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Initial delay before the first retry, in seconds
    pub delay_secs: f64,
    /// Multiplier applied to the delay after every retry
    pub back_off: f64,
    /// HTTP status codes that are worth retrying
    pub retry_codes: Vec<u16>,
}

impl RetryConfig {
    /// Initial retry delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        secs_to_duration(self.delay_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_secs: 5.0,
            back_off: 1.0,
            retry_codes: vec![429, 503],
        }
    }
}

/// Document download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Default directory for downloaded documents (a temp dir when unset)
    pub output_dir: Option<PathBuf>,
    /// Command used when the site answers a download with 502 Bad Gateway.
    /// `{url}` and `{path}` are substituted per invocation.
    pub fallback_command: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            fallback_command: vec![
                "wget".to_string(),
                "{url}".to_string(),
                "-O".to_string(),
                "{path}".to_string(),
            ],
        }
    }
}
