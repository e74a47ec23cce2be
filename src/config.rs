//! Engine Configuration
//!
//! Defaults match the remote service's published rate limits; every value
//! can be overridden from the environment.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::entry::MAX_TOP_ENTRIES;
use crate::remote::Collection;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value found.
        value: String,
    },
}

/// Sync engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Minimum spacing between per-level dispatch pairs.
    pub level_pacing: Duration,
    /// Rows requested for the global score top list (1..=5).
    pub global_top_limit: usize,
    /// Rows requested per level time list.
    pub level_top_limit: usize,
    /// Which player collection the queries rank against.
    pub collection: Collection,
    /// Drop responses that belong to a superseded refresh cycle.
    pub discard_stale_responses: bool,
    /// Location of the durable key/value file.
    pub store_path: PathBuf,
    /// Display name used until the remote reports a real one.
    pub default_display_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            level_pacing: Duration::from_millis(500),
            global_top_limit: MAX_TOP_ENTRIES,
            level_top_limit: 1,
            collection: Collection::Public,
            discard_stale_responses: true,
            store_path: PathBuf::from("leaderboard_state.json"),
            default_display_name: "Player".to_string(),
        }
    }
}

impl SyncConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = env_value("LEADERBOARD_PACING_MS") {
            let ms = parse(&raw, "LEADERBOARD_PACING_MS")?;
            config.level_pacing = Duration::from_millis(ms);
        }

        if let Some(raw) = env_value("LEADERBOARD_TOP_LIMIT") {
            let limit: usize = parse(&raw, "LEADERBOARD_TOP_LIMIT")?;
            config.global_top_limit = limit.clamp(1, MAX_TOP_ENTRIES);
        }

        if let Some(raw) = env_value("LEADERBOARD_COLLECTION") {
            config.collection = match raw.to_ascii_lowercase().as_str() {
                "public" => Collection::Public,
                "social" => Collection::Social,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "LEADERBOARD_COLLECTION",
                        value: raw,
                    })
                }
            };
        }

        if let Some(raw) = env_value("LEADERBOARD_DISCARD_STALE") {
            config.discard_stale_responses = match raw.as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "LEADERBOARD_DISCARD_STALE",
                        value: raw,
                    })
                }
            };
        }

        if let Some(raw) = env_value("LEADERBOARD_STORE_PATH") {
            config.store_path = PathBuf::from(raw);
        }

        Ok(config)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T: std::str::FromStr>(raw: &str, key: &'static str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
