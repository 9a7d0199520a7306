//! Configuration loading.
//!
//! Limits, pacing, and bridge settings come from `~/.outreach/config.toml`
//! (or an explicit path). Environment variables override file values;
//! file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::engine::limiter::DEFAULT_MAX_MESSAGES_PER_DAY;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Daily cap and session window.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Delays used by the local simulator.
    #[serde(default)]
    pub pacing: PacingConfig,

    /// External automation bridge.
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Rate-limit seeds for the in-memory config store.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum sends per session window.
    #[serde(default = "default_max_messages_per_day")]
    pub max_messages_per_day: u64,

    /// Session window length in hours.
    #[serde(default = "default_max_window_hours")]
    pub max_window_hours: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_messages_per_day: default_max_messages_per_day(),
            max_window_hours: default_max_window_hours(),
        }
    }
}

/// Dispatch pacing for the simulator.
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    /// Minimum delay between two dispatches.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Random extra delay in `[0, jitter_ms)`.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// How often a paused driver re-checks its flags.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            jitter_ms: default_jitter_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Host automation bridge settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeConfig {
    /// Base URL of the host automation service. `None` disables the bridge.
    #[serde(default)]
    pub url: Option<String>,
}

// Default value functions for serde

fn default_max_messages_per_day() -> u64 {
    DEFAULT_MAX_MESSAGES_PER_DAY
}
fn default_max_window_hours() -> f64 {
    10.0
}
fn default_base_delay_ms() -> u64 {
    1_500
}
fn default_jitter_ms() -> u64 {
    1_500
}
fn default_poll_interval_ms() -> u64 {
    250
}

impl Config {
    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in tests).
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("OUTREACH_MAX_PER_DAY") {
            match v.parse() {
                Ok(n) => self.limits.max_messages_per_day = n,
                Err(_) => tracing::warn!(
                    var = "OUTREACH_MAX_PER_DAY",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("OUTREACH_WINDOW_HOURS") {
            match v.parse() {
                Ok(h) => self.limits.max_window_hours = h,
                Err(_) => tracing::warn!(
                    var = "OUTREACH_WINDOW_HOURS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("OUTREACH_BRIDGE_URL") {
            self.bridge.url = Some(v).filter(|u| !u.trim().is_empty());
        }
    }
}

/// Parse configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is malformed.
pub fn parse_config(toml_str: &str) -> anyhow::Result<Config> {
    toml::from_str(toml_str).context("failed to parse config TOML")
}

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    Ok(config)
}

/// Load `path`, or defaults when the file does not exist, then apply env overrides.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> anyhow::Result<Config> {
    let mut config = if path.exists() {
        tracing::info!(path = %path.display(), "loading config from file");
        load_config(path)?
    } else {
        tracing::info!("no config file found, using defaults");
        Config::default()
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

/// Load `~/.outreach/config.toml` (defaults when missing) with env overrides.
///
/// # Errors
///
/// Returns an error if the home directory cannot be resolved or the file
/// is malformed.
pub fn load_default_config() -> anyhow::Result<Config> {
    load_or_default(&config_dir()?.join("config.toml"))
}

/// Resolve the default config directory (`~/.outreach/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".outreach"))
}
