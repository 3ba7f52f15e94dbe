//! Runtime configuration
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file by the binary before `SearchConfig::from_env` is called.

use crate::error::{Result, SearchError};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub enum_cache_ttl: Duration,
    pub suggestion_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 10,
            db_acquire_timeout: Duration::from_secs(30),
            openai_api_key: None,
            openai_model: DEFAULT_MODEL.to_string(),
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            enum_cache_ttl: Duration::from_secs(60 * 60),
            suggestion_limit: 7,
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_acquire_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.db_acquire_timeout.as_secs(),
            )?),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_model: non_empty("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: non_empty("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            enum_cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "ENUM_CACHE_TTL_SECS",
                defaults.enum_cache_ttl.as_secs(),
            )?),
            suggestion_limit: parse_or(&lookup, "SUGGESTION_LIMIT", defaults.suggestion_limit)?,
        })
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| SearchError::Config("DATABASE_URL not set. Add it to the environment or .env".to_string()))
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| SearchError::Config("OPENAI_API_KEY not set. Add it to the environment or .env".to_string()))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| SearchError::Config(format!("{} must be a number, got '{}'", key, raw))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = SearchConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.enum_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.openai_model, DEFAULT_MODEL);
        assert_eq!(config.suggestion_limit, 7);
        assert!(config.require_database_url().is_err());
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let config = SearchConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/gems"),
            ("ENUM_CACHE_TTL_SECS", "120"),
            ("OPENAI_MODEL", "gpt-4"),
        ]))
        .unwrap();
        assert_eq!(config.require_database_url().unwrap(), "postgres://localhost/gems");
        assert_eq!(config.enum_cache_ttl, Duration::from_secs(120));
        assert_eq!(config.openai_model, "gpt-4");

        let err = SearchConfig::from_lookup(lookup_from(&[("DB_MAX_CONNECTIONS", "lots")])).unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }
}
