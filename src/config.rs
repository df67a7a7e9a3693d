//! Application-level configuration loading: matchmaking policy, rate limits, storage selection.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_DUEL_BACK_CONFIG_PATH";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_TROPHY_WINDOW: u32 = 100;
const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";

/// Rule deciding whether a waiting room may accept a new participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MatchPolicy {
    /// Pair with the oldest waiting room, whatever its occupant's trophies.
    FirstAvailable,
    /// Pair only when both trophy counts are within `trophy_window` of each other.
    TrophyProximity {
        #[serde(default = "default_trophy_window")]
        trophy_window: u32,
    },
}

impl MatchPolicy {
    /// Whether a newcomer with `candidate` trophies may join someone holding `waiting` trophies.
    pub fn accepts(&self, candidate: u32, waiting: u32) -> bool {
        match self {
            MatchPolicy::FirstAvailable => true,
            MatchPolicy::TrophyProximity { trophy_window } => {
                candidate.abs_diff(waiting) <= *trophy_window
            }
        }
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        MatchPolicy::TrophyProximity {
            trophy_window: DEFAULT_TROPHY_WINDOW,
        }
    }
}

/// Sliding-window limits applied to REST requests per client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs.max(1))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_secs: 60,
        }
    }
}

/// Which profile store backend to install at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub backend: StoreBackend,
    pub mongo_uri: String,
    pub mongo_db: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Mongo,
            mongo_uri: DEFAULT_MONGO_URI.into(),
            mongo_db: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub port: u16,
    pub matchmaking: MatchPolicy,
    pub rate_limit: RateLimitConfig,
    /// Capacity of the queue between finished matches and the persistence worker.
    pub settlement_queue_capacity: usize,
    pub leaderboard_limit: usize,
    /// Origins allowed by CORS; an empty list allows any origin.
    pub cors_allowed_origins: Vec<String>,
    pub storage: StorageConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            matchmaking: MatchPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            settlement_queue_capacity: 256,
            leaderboard_limit: 10,
            cors_allowed_origins: vec!["http://localhost:5173".into()],
            storage: StorageConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load the configuration from disk, then apply environment overrides.
    ///
    /// A missing or unreadable file falls back to built-in defaults.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        config.apply_env_overrides(|key| env::var(key).ok());
        config
    }

    fn load_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        policy = ?config.matchmaking,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT")
            .or_else(|| lookup("SERVER_PORT"))
            .and_then(|value| value.parse::<u16>().ok())
        {
            self.port = port;
        }
        if let Some(uri) = lookup("MONGO_URI").filter(|value| !value.is_empty()) {
            self.storage.mongo_uri = uri;
        }
        if let Some(db) = lookup("MONGO_DB").filter(|value| !value.is_empty()) {
            self.storage.mongo_db = Some(db);
        }
        match lookup("STORE_BACKEND").as_deref() {
            Some("mongo") => self.storage.backend = StoreBackend::Mongo,
            Some("memory") => self.storage.backend = StoreBackend::Memory,
            Some(other) => warn!(value = other, "ignoring unknown STORE_BACKEND"),
            None => {}
        }
    }
}

fn default_trophy_window() -> u32 {
    DEFAULT_TROPHY_WINDOW
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "matchmaking": { "policy": "first_available" }, "leaderboardLimit": 5 }"#,
        )
        .unwrap();

        assert_eq!(config.matchmaking, MatchPolicy::FirstAvailable);
        assert_eq!(config.leaderboard_limit, 5);
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        assert_eq!(config.storage.backend, StoreBackend::Mongo);
    }

    #[test]
    fn trophy_window_defaults_to_one_hundred() {
        let policy: MatchPolicy =
            serde_json::from_str(r#"{ "policy": "trophy_proximity" }"#).unwrap();
        assert_eq!(policy, MatchPolicy::TrophyProximity { trophy_window: 100 });

        let policy: MatchPolicy =
            serde_json::from_str(r#"{ "policy": "trophy_proximity", "trophyWindow": 20 }"#)
                .unwrap();
        assert_eq!(policy, MatchPolicy::TrophyProximity { trophy_window: 20 });
    }

    #[test]
    fn proximity_policy_is_inclusive() {
        let policy = MatchPolicy::default();
        assert!(policy.accepts(200, 100));
        assert!(policy.accepts(100, 200));
        assert!(!policy.accepts(201, 100));
        assert!(MatchPolicy::FirstAvailable.accepts(0, 5_000));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("SERVER_PORT", "9000"),
            ("MONGO_DB", "duels"),
            ("STORE_BACKEND", "memory"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.port, 9000);
        assert_eq!(config.storage.mongo_db.as_deref(), Some("duels"));
        assert_eq!(config.storage.backend, StoreBackend::Memory);
        assert_eq!(config.storage.mongo_uri, DEFAULT_MONGO_URI);
    }
}
