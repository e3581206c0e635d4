//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (`AGGFLOW_` prefix)
//!
//! ## Example
//!
//! ```toml
//! [cursors]
//! max_idle_ms = 300000
//! sweep_interval = 20
//!
//! [hybrid]
//! rrf_constant = 60
//! rrf_window = 20
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! AGGFLOW_CURSORS__MAX_IDLE_MS=60000
//! AGGFLOW_NETWORK__CURSOR_REPLY_THRESHOLD=1
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub execution: ExecutionSettings,
    pub cursors: CursorSettings,
    pub hybrid: HybridSettings,
    pub network: NetworkSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Execution-wide timeout/limit defaults (overridable per-request)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Default query timeout in milliseconds (0 = no timeout)
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Default timeout policy: "fail" or "return"
    #[serde(default = "default_timeout_policy")]
    pub default_timeout_policy: String,

    /// How many `Next()` calls between deadline polls
    #[serde(default = "default_poll_interval")]
    pub timeout_poll_interval: u32,

    /// Maximum number of intermediate results a pipeline may hold
    #[serde(default)]
    pub max_intermediate_size: Option<usize>,
}

fn default_timeout_ms() -> u64 {
    500
}
fn default_timeout_policy() -> String {
    "return".to_string()
}
fn default_poll_interval() -> u32 {
    100
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        ExecutionSettings {
            default_timeout_ms: default_timeout_ms(),
            default_timeout_policy: default_timeout_policy(),
            timeout_poll_interval: default_poll_interval(),
            max_intermediate_size: None,
        }
    }
}

/// Cursor registry tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorSettings {
    /// Default idle timeout for a paused cursor, in milliseconds
    #[serde(default = "default_max_idle_ms")]
    pub max_idle_ms: u64,

    /// Reservations between automatic `CollectIdle` sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u32,

    /// Minimum time between two sweeps, in milliseconds (throttle)
    #[serde(default = "default_sweep_throttle_ms")]
    pub sweep_throttle_ms: u64,
}

fn default_max_idle_ms() -> u64 {
    300_000
}
fn default_sweep_interval() -> u32 {
    20
}
fn default_sweep_throttle_ms() -> u64 {
    500
}

impl Default for CursorSettings {
    fn default() -> Self {
        CursorSettings {
            max_idle_ms: default_max_idle_ms(),
            sweep_interval: default_sweep_interval(),
            sweep_throttle_ms: default_sweep_throttle_ms(),
        }
    }
}

/// Hybrid search scoring defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridSettings {
    #[serde(default = "default_rrf_constant")]
    pub rrf_constant: u32,

    #[serde(default = "default_rrf_window")]
    pub rrf_window: usize,

    /// Sample size used when distributing STDDEV / QUANTILE reducers
    #[serde(default = "default_random_sample_size")]
    pub random_sample_size: usize,
}

fn default_rrf_constant() -> u32 {
    60
}
fn default_rrf_window() -> usize {
    20
}
fn default_random_sample_size() -> usize {
    500
}

impl Default for HybridSettings {
    fn default() -> Self {
        HybridSettings {
            rrf_constant: default_rrf_constant(),
            rrf_window: default_rrf_window(),
            random_sample_size: default_random_sample_size(),
        }
    }
}

/// Network fan-in tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Pre-buffered shard replies below which the coordinator issues
    /// another `CURSOR READ` (counted across all shards).
    #[serde(default = "default_cursor_reply_threshold")]
    pub cursor_reply_threshold: usize,

    /// Bounded channel capacity for the fan-in iterator
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Shard cursor page size requested per `CURSOR READ`
    #[serde(default = "default_shard_count")]
    pub shard_cursor_count: u32,
}

fn default_cursor_reply_threshold() -> usize {
    1
}
fn default_channel_capacity() -> usize {
    128
}
fn default_shard_count() -> u32 {
    1000
}

impl Default for NetworkSettings {
    fn default() -> Self {
        NetworkSettings {
            cursor_reply_threshold: default_cursor_reply_threshold(),
            channel_capacity: default_channel_capacity(),
            shard_cursor_count: default_shard_count(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (`AGGFLOW_` prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("AGGFLOW_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("AGGFLOW_").split("__"))
            .extract()
    }
}

/// Hot-swappable config handle: readers get a consistent [`Config`] snapshot
/// without holding a lock; a reload publishes a new snapshot atomically.
#[derive(Clone)]
pub struct ConfigHandle {
    current: std::sync::Arc<arc_swap::ArcSwap<Config>>,
}

impl ConfigHandle {
    pub fn new(config: Config) -> Self {
        ConfigHandle { current: std::sync::Arc::new(arc_swap::ArcSwap::from_pointee(config)) }
    }

    pub fn load(&self) -> std::sync::Arc<Config> {
        self.current.load_full()
    }

    /// Re-reads the default locations and publishes the result, leaving
    /// in-flight readers holding their already-loaded snapshot.
    pub fn reload(&self) -> Result<(), figment::Error> {
        let fresh = Config::load()?;
        self.current.store(std::sync::Arc::new(fresh));
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            execution: ExecutionSettings::default(),
            cursors: CursorSettings::default(),
            hybrid: HybridSettings::default(),
            network: NetworkSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = Config::default();
        assert_eq!(config.hybrid.rrf_constant, 60);
        assert_eq!(config.hybrid.rrf_window, 20);
        assert_eq!(config.hybrid.random_sample_size, 500);
    }

    #[test]
    fn config_serialization_round_trips() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[cursors]"));
        assert!(toml_str.contains("[hybrid]"));
        assert!(toml_str.contains("[network]"));
    }

    #[test]
    fn from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [execution]
            default_timeout_ms = 2500

            [cursors]
            max_idle_ms = 60000

            [hybrid]
            rrf_constant = 10
            rrf_window = 5

            [network]
            channel_capacity = 64
            "#,
        )
        .unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.execution.default_timeout_ms, 2500);
        assert_eq!(config.cursors.max_idle_ms, 60000);
        assert_eq!(config.hybrid.rrf_constant, 10);
        assert_eq!(config.network.channel_capacity, 64);
    }

    #[test]
    fn config_handle_reflects_reload() {
        let handle = ConfigHandle::new(Config::default());
        assert_eq!(handle.load().hybrid.rrf_constant, 60);

        let mut updated = Config::default();
        updated.hybrid.rrf_constant = 99;
        handle.current.store(std::sync::Arc::new(updated));
        assert_eq!(handle.load().hybrid.rrf_constant, 99);
    }

    #[test]
    fn env_override_takes_precedence_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cursors]\nmax_idle_ms = 60000\n").unwrap();

        std::env::set_var("AGGFLOW_CURSORS__MAX_IDLE_MS", "9000");
        let config = figment::Figment::new()
            .merge(figment::providers::Toml::file(&path))
            .merge(figment::providers::Env::prefixed("AGGFLOW_").split("__"))
            .extract::<Config>()
            .unwrap();
        std::env::remove_var("AGGFLOW_CURSORS__MAX_IDLE_MS");

        assert_eq!(config.cursors.max_idle_ms, 9000);
    }
}
