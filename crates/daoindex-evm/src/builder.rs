//! Fluent builder API for creating governance indexers.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use daoindex_evm::{IndexerBuilder, MemoryLogSource};
//!
//! let indexer = IndexerBuilder::new()
//!     .start_block(19_000_000)
//!     .batch_size(2_000)
//!     .poll_interval_ms(12_000)
//!     .build_in_memory(Arc::new(MemoryLogSource::new()))
//!     .unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

use daoindex_core::error::IndexerError;
use daoindex_core::indexer::IndexerConfig;
use daoindex_core::store::StateStore;
use daoindex_storage::InMemoryStateStore;

use crate::index_loop::Indexer;
use crate::source::LedgerLogSource;

/// Fluent builder for `IndexerConfig` and `Indexer`.
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Set the first block to index.
    pub fn start_block(mut self, block: u64) -> Self {
        self.config.start_block = block;
        self
    }

    /// Set the maximum number of blocks per log query.
    pub fn batch_size(mut self, size: u64) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set live mode polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set live mode polling interval.
    pub fn poll_interval(self, interval: Duration) -> Self {
        let ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.poll_interval_ms(ms)
    }

    /// Set how many sub-ranges may be fetched concurrently.
    pub fn max_concurrent_fetches(mut self, n: usize) -> Self {
        self.config.max_concurrent_fetches = n;
        self
    }

    /// Set the governance contract address.
    pub fn contract_address(mut self, address: impl Into<String>) -> Self {
        self.config.contract_address = Some(address.into());
        self
    }

    /// Build the `IndexerConfig`.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }

    /// Build an indexer writing to `store`.
    pub fn build<L: LedgerLogSource, S: StateStore>(
        self,
        source: L,
        store: Arc<S>,
    ) -> Result<Indexer<L, S>, IndexerError> {
        Indexer::new(self.config, source, store)
    }

    /// Build an indexer with a fresh in-memory store.
    pub fn build_in_memory<L: LedgerLogSource>(
        self,
        source: L,
    ) -> Result<Indexer<L, InMemoryStateStore>, IndexerError> {
        self.build(source, Arc::new(InMemoryStateStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryLogSource;

    #[test]
    fn builder_defaults() {
        let cfg = IndexerBuilder::new().build_config();
        assert_eq!(cfg.start_block, 0);
        assert_eq!(cfg.batch_size, 5000);
        assert_eq!(cfg.poll_interval_ms, 5000);
        assert!(cfg.contract_address.is_none());
    }

    #[test]
    fn builder_custom() {
        let cfg = IndexerBuilder::new()
            .start_block(50_000_000)
            .batch_size(500)
            .poll_interval(Duration::from_secs(12))
            .max_concurrent_fetches(8)
            .contract_address("0xdao")
            .build_config();

        assert_eq!(cfg.start_block, 50_000_000);
        assert_eq!(cfg.batch_size, 500);
        assert_eq!(cfg.poll_interval_ms, 12_000);
        assert_eq!(cfg.max_concurrent_fetches, 8);
        assert_eq!(cfg.contract_address.as_deref(), Some("0xdao"));
    }

    #[test]
    fn build_validates() {
        let err = IndexerBuilder::new()
            .poll_interval_ms(0)
            .build_in_memory(MemoryLogSource::new())
            .err()
            .unwrap();
        assert!(matches!(err, IndexerError::Config(_)));

        let idx = IndexerBuilder::new()
            .start_block(7)
            .build_in_memory(MemoryLogSource::new())
            .unwrap();
        assert_eq!(idx.config().start_block, 7);
    }
}
