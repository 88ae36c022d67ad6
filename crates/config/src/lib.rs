#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for hubcas
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/hubcas/config.toml)
//! - Environment variables
//! - CLI flags (applied by the binary)

use hubcas_errors::{ConfigError, Error};
use hubcas_hash::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub transfer: TransferConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Hosting platform endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

/// HTTP client settings shared by Hub and CAS requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Chunked download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Bytes per range request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Capacity of the worker pool shared by every file of a request
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    #[serde(default = "default_max_in_flight_per_file")]
    pub max_in_flight_per_file: usize,
    #[serde(default = "default_max_parallel_files")]
    pub max_parallel_files: usize,
    /// Reuse one pool across every download of a client instead of one per request
    #[serde(default)]
    pub share_pool: bool,
    #[serde(default = "default_chunk_attempt_timeout")]
    pub chunk_attempt_timeout_secs: u64,
    /// Deadline for a whole download request; none by default
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Staging files younger than this are left alone by the sweep
    #[serde(default = "default_staging_grace")]
    pub staging_grace_secs: u64,
    /// Algorithm assumed for descriptor hashes without a prefix
    #[serde(default)]
    pub default_hash_algorithm: HashAlgorithm,
}

/// Per-chunk retry policy for transient failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Fraction of the delay randomized in either direction
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

// Default implementations

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            pool_idle_timeout_secs: default_pool_idle_timeout(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_in_flight_per_file: default_max_in_flight_per_file(),
            max_parallel_files: default_max_parallel_files(),
            share_pool: false,
            chunk_attempt_timeout_secs: default_chunk_attempt_timeout(),
            request_timeout_secs: None,
            staging_grace_secs: default_staging_grace(),
            default_hash_algorithm: HashAlgorithm::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

// Default value functions for serde
fn default_endpoint() -> String {
    "https://huggingface.co".to_string()
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_pool_idle_timeout() -> u64 {
    90
}

fn default_pool_max_idle_per_host() -> usize {
    32
}

fn default_user_agent() -> String {
    format!("hubcas/{}", env!("CARGO_PKG_VERSION"))
}

fn default_chunk_size() -> u64 {
    8 * 1024 * 1024
}

fn default_max_concurrent_fetches() -> usize {
    64
}

fn default_max_in_flight_per_file() -> usize {
    16
}

fn default_max_parallel_files() -> usize {
    32
}

fn default_chunk_attempt_timeout() -> u64 {
    60
}

fn default_staging_grace() -> u64 {
    15 * 60
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_factor() -> f64 {
    0.2
}

impl TransferConfig {
    /// Chunk size as a range length; `validate` guarantees it fits
    #[must_use]
    pub fn chunk_length(&self) -> u32 {
        u32::try_from(self.chunk_size).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn chunk_attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_attempt_timeout_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn staging_grace(&self) -> Duration {
        Duration::from_secs(self.staging_grace_secs)
    }
}

impl RetryConfig {
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("hubcas").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        self.merge_env_from(|name| std::env::var(name).ok())
    }

    /// Merge overrides from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds a value that cannot be parsed.
    pub fn merge_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), Error> {
        // HUBCAS_ENDPOINT takes precedence over HF_ENDPOINT
        if let Some(endpoint) = lookup("HUBCAS_ENDPOINT").or_else(|| lookup("HF_ENDPOINT")) {
            self.hub.endpoint = endpoint.trim_end_matches('/').to_string();
        }

        let chunk_mb = parse_var::<u64>(&lookup, &["HUBCAS_CHUNK_SIZE_MB", "XET_CHUNK_SIZE_MB"])?;
        if let Some(mb) = chunk_mb {
            self.transfer.chunk_size = mb.saturating_mul(1024 * 1024);
        }

        if let Some(n) = parse_var(&lookup, &["HUBCAS_MAX_CONCURRENT_FETCHES"])? {
            self.transfer.max_concurrent_fetches = n;
        }

        if let Some(n) = parse_var(
            &lookup,
            &["HUBCAS_MAX_IN_FLIGHT_PER_FILE", "XET_NUM_CONCURRENT_RANGE_GETS"],
        )? {
            self.transfer.max_in_flight_per_file = n;
        }

        if let Some(n) = parse_var(
            &lookup,
            &["HUBCAS_MAX_PARALLEL_FILES", "XET_MAX_PARALLEL_FILES"],
        )? {
            self.transfer.max_parallel_files = n;
        }

        if let Some(n) = parse_var(&lookup, &["HUBCAS_MAX_ATTEMPTS"])? {
            self.retry.max_attempts = n;
        }

        if let Some(secs) = parse_var(&lookup, &["HUBCAS_REQUEST_TIMEOUT_SECS"])? {
            self.transfer.request_timeout_secs = Some(secs);
        }

        Ok(())
    }

    /// Reject values the transfer engine cannot run with
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |field: &str, value: String| -> Error {
            ConfigError::InvalidValue {
                field: field.to_string(),
                value,
            }
            .into()
        };

        if self.hub.endpoint.trim().is_empty() {
            return Err(invalid("hub.endpoint", String::new()));
        }
        if self.transfer.chunk_size == 0 || self.transfer.chunk_size > u64::from(u32::MAX) {
            return Err(invalid(
                "transfer.chunk_size",
                self.transfer.chunk_size.to_string(),
            ));
        }
        for (field, value) in [
            (
                "transfer.max_concurrent_fetches",
                self.transfer.max_concurrent_fetches,
            ),
            (
                "transfer.max_in_flight_per_file",
                self.transfer.max_in_flight_per_file,
            ),
            ("transfer.max_parallel_files", self.transfer.max_parallel_files),
        ] {
            if value == 0 {
                return Err(invalid(field, "0".to_string()));
            }
        }
        if self.transfer.chunk_attempt_timeout_secs == 0 {
            return Err(invalid("transfer.chunk_attempt_timeout_secs", "0".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(invalid(
                "retry.jitter_factor",
                self.retry.jitter_factor.to_string(),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(invalid(
                "retry.backoff_multiplier",
                self.retry.backoff_multiplier.to_string(),
            ));
        }
        Ok(())
    }
}

/// First variable of `names` that is set, parsed as `T`
fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    names: &[&str],
) -> Result<Option<T>, Error> {
    for name in names {
        if let Some(raw) = lookup(name) {
            return raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| {
                    ConfigError::InvalidValue {
                        field: (*name).to_string(),
                        value: raw,
                    }
                    .into()
                });
        }
    }
    Ok(None)
}
