use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Settings for event aggregation and match persistence
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub database_url: Option<String>,
    /// Count overkill-capped damage instead of the raw value
    pub use_real_damage: bool,
    pub min_players: usize,
    /// Healers below this much healing are not persisted
    pub min_healer_healing: i64,
    pub finalize_timeout: Duration,
    pub min_killstreak: i32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            use_real_damage: false,
            min_players: 6,
            min_healer_healing: 500,
            finalize_timeout: Duration::from_secs(30),
            min_killstreak: 3,
        }
    }
}

impl IngestConfig {
    /// Defaults overridden by `DATABASE_URL` and `MATCHSTATS_*` variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if let Some(value) = parse(&lookup, "MATCHSTATS_USE_REAL_DAMAGE")? {
            config.use_real_damage = value;
        }
        if let Some(value) = parse(&lookup, "MATCHSTATS_MIN_PLAYERS")? {
            config.min_players = value;
        }
        if let Some(value) = parse(&lookup, "MATCHSTATS_MIN_HEALER_HEALING")? {
            config.min_healer_healing = value;
        }
        if let Some(secs) = parse::<u64, _>(&lookup, "MATCHSTATS_FINALIZE_TIMEOUT_SECS")? {
            config.finalize_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = parse(&lookup, "MATCHSTATS_MIN_KILLSTREAK")? {
            config.min_killstreak = value;
        }

        Ok(config)
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_real_damage(mut self, enabled: bool) -> Self {
        self.use_real_damage = enabled;
        self
    }

    pub fn with_min_players(mut self, min_players: usize) -> Self {
        self.min_players = min_players;
        self
    }

    pub fn with_finalize_timeout(mut self, timeout: Duration) -> Self {
        self.finalize_timeout = timeout;
        self
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = IngestConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, IngestConfig::default());
        assert_eq!(config.min_players, 6);
        assert_eq!(config.min_healer_healing, 500);
    }

    #[test]
    fn environment_overrides() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/matchstats"),
            ("MATCHSTATS_USE_REAL_DAMAGE", "true"),
            ("MATCHSTATS_MIN_PLAYERS", "12"),
            ("MATCHSTATS_FINALIZE_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/matchstats")
        );
        assert!(config.use_real_damage);
        assert_eq!(config.min_players, 12);
        assert_eq!(config.finalize_timeout, Duration::from_secs(5));
    }

    #[test]
    fn malformed_value_names_the_key() {
        let err = IngestConfig::from_lookup(lookup(&[("MATCHSTATS_MIN_PLAYERS", "six")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "MATCHSTATS_MIN_PLAYERS",
                value: "six".into()
            }
        );
    }

    #[test]
    fn deserializes_partial_config() {
        let config: IngestConfig =
            serde_json::from_str(r#"{"use_real_damage": true, "min_players": 2}"#).unwrap();
        assert!(config.use_real_damage);
        assert_eq!(config.min_players, 2);
        assert_eq!(config.min_healer_healing, 500);
    }
}
