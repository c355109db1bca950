// src/config.rs

//! Manages server configuration: loading, defaults, and validation.

use crate::core::protocol::codec::DEFAULT_MAX_LINE_BYTES;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// The address the ingestion listener binds to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    7777
}

/// Which ingest sink records are written to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Postgres,
    /// Keeps records in process memory. Nothing survives a restart.
    Memory,
}

/// Backend connection parameters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Upper bound on establishing a single backend connection.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// SQL script applied once at startup, before any connection is accepted.
    #[serde(default)]
    pub migrations: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            user: default_db_user(),
            password: String::new(),
            connect_timeout: default_connect_timeout(),
            migrations: None,
        }
    }
}

fn default_db_host() -> String {
    "127.0.0.1".to_string()
}
fn default_db_port() -> u16 {
    5432
}
fn default_db_name() -> String {
    "watergate".to_string()
}
fn default_db_user() -> String {
    "watergate".to_string()
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Sizing of the shared sink connection pool.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connections opened eagerly at startup.
    #[serde(default = "default_pool_min_size")]
    pub min_size: usize,
    /// Upper bound on concurrently leased connections.
    #[serde(default = "default_pool_max_size")]
    pub max_size: usize,
    /// How long a handler waits for a lease before the record fails.
    #[serde(default = "default_pool_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: default_pool_min_size(),
            max_size: default_pool_max_size(),
            timeout: default_pool_timeout(),
        }
    }
}

fn default_pool_min_size() -> usize {
    1
}
fn default_pool_max_size() -> usize {
    5
}
fn default_pool_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9177
}

/// Represents the final, validated server configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Longest accepted request line, excluding the newline.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            max_line_bytes: default_max_line_bytes(),
            app: AppConfig::default(),
            database: DatabaseConfig::default(),
            pool: PoolConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.app.port == 0 {
            return Err(anyhow!("app.port cannot be 0"));
        }
        if self.app.host.trim().is_empty() {
            return Err(anyhow!("app.host cannot be empty"));
        }
        if self.max_line_bytes == 0 {
            return Err(anyhow!("max_line_bytes cannot be 0"));
        }
        if self.pool.max_size == 0 {
            return Err(anyhow!("pool.max_size cannot be 0"));
        }
        if self.pool.min_size > self.pool.max_size {
            return Err(anyhow!(
                "pool.min_size ({}) cannot exceed pool.max_size ({})",
                self.pool.min_size,
                self.pool.max_size
            ));
        }
        if self.pool.timeout.is_zero() {
            return Err(anyhow!("pool.timeout cannot be 0"));
        }

        if self.database.backend == Backend::Postgres {
            if self.database.name.trim().is_empty() {
                return Err(anyhow!("database.name cannot be empty"));
            }
            if self.database.user.trim().is_empty() {
                return Err(anyhow!("database.user cannot be empty"));
            }
            if self.database.port == 0 {
                return Err(anyhow!("database.port cannot be 0"));
            }
        } else if self.database.migrations.is_some() {
            warn!("database.migrations is ignored by the memory backend.");
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.app.port {
                return Err(anyhow!("metrics.port cannot be the same as app.port"));
            }
        }
        Ok(())
    }
}
