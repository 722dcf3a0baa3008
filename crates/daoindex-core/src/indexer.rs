//! Indexer configuration and state types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

/// Environment variables read by [`IndexerConfig::from_env`].
pub mod env {
    pub const START_BLOCK: &str = "DAOINDEX_START_BLOCK";
    pub const BATCH_SIZE: &str = "DAOINDEX_BATCH_SIZE";
    pub const POLL_INTERVAL_MS: &str = "DAOINDEX_POLL_INTERVAL_MS";
    pub const MAX_CONCURRENT_FETCHES: &str = "DAOINDEX_MAX_CONCURRENT_FETCHES";
    pub const DAO_ADDRESS: &str = "DAO_ADDRESS";
}

/// Configuration for an indexer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// First block to index. Never fetched below, even with an empty checkpoint.
    pub start_block: u64,
    /// Maximum blocks per log query (provider range cap).
    pub batch_size: u64,
    /// Live polling interval (milliseconds).
    pub poll_interval_ms: u64,
    /// How many sub-ranges may be in flight at once during a fetch.
    pub max_concurrent_fetches: usize,
    /// Governance contract address, for log sources that need it.
    pub contract_address: Option<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            start_block: 0,
            batch_size: 5000,
            poll_interval_ms: 5000,
            max_concurrent_fetches: 4,
            contract_address: None,
        }
    }
}

impl IndexerConfig {
    /// Live polling interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject values the index loop cannot run with.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.batch_size == 0 {
            return Err(IndexerError::Config("batch_size must be > 0".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(IndexerError::Config("poll_interval_ms must be > 0".into()));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(IndexerError::Config("max_concurrent_fetches must be > 0".into()));
        }
        Ok(())
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, IndexerError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| IndexerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from the process environment.
    pub fn from_env() -> Result<Self, IndexerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = lookup(env::START_BLOCK) {
            config.start_block = parse_var(env::START_BLOCK, &v)?;
        }
        if let Some(v) = lookup(env::BATCH_SIZE) {
            config.batch_size = parse_var(env::BATCH_SIZE, &v)?;
        }
        if let Some(v) = lookup(env::POLL_INTERVAL_MS) {
            config.poll_interval_ms = parse_var(env::POLL_INTERVAL_MS, &v)?;
        }
        if let Some(v) = lookup(env::MAX_CONCURRENT_FETCHES) {
            config.max_concurrent_fetches = parse_var(env::MAX_CONCURRENT_FETCHES, &v)?;
        }
        if let Some(v) = lookup(env::DAO_ADDRESS) {
            let v = v.trim();
            if !v.is_empty() {
                config.contract_address = Some(v.to_string());
            }
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, IndexerError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| IndexerError::Config(format!("{key}={value:?}: {e}")))
}

/// Runtime state of the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexerState {
    /// Not yet started.
    Idle,
    /// Backfilling from the checkpoint to the head observed at startup.
    CatchingUp,
    /// Polling for new blocks.
    Live,
    /// Shut down.
    Stopped,
}

impl std::fmt::Display for IndexerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CatchingUp => write!(f, "catching-up"),
            Self::Live => write!(f, "live"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = IndexerConfig::default();
        assert_eq!(cfg.start_block, 0);
        assert_eq!(cfg.batch_size, 5000);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        cfg.validate().unwrap();
    }

    #[test]
    fn env_overrides_defaults() {
        let cfg = IndexerConfig::from_lookup(lookup(&[
            (env::START_BLOCK, "19000000"),
            (env::BATCH_SIZE, " 2000 "),
            (env::DAO_ADDRESS, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        ]))
        .unwrap();
        assert_eq!(cfg.start_block, 19_000_000);
        assert_eq!(cfg.batch_size, 2000);
        assert_eq!(cfg.poll_interval_ms, 5000);
        assert_eq!(
            cfg.contract_address.as_deref(),
            Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")
        );
    }

    #[test]
    fn env_rejects_bad_values() {
        let err = IndexerConfig::from_lookup(lookup(&[(env::BATCH_SIZE, "lots")])).unwrap_err();
        assert!(matches!(err, IndexerError::Config(_)));
        assert!(err.to_string().contains(env::BATCH_SIZE));

        let err = IndexerConfig::from_lookup(lookup(&[(env::BATCH_SIZE, "0")])).unwrap_err();
        assert!(matches!(err, IndexerError::Config(_)));
    }

    #[test]
    fn json_fills_missing_fields() {
        let cfg = IndexerConfig::from_json_str(r#"{ "start_block": 100, "poll_interval_ms": 250 }"#)
            .unwrap();
        assert_eq!(cfg.start_block, 100);
        assert_eq!(cfg.poll_interval_ms, 250);
        assert_eq!(cfg.batch_size, 5000);
        assert!(IndexerConfig::from_json_str(r#"{ "max_concurrent_fetches": 0 }"#).is_err());
    }
}
