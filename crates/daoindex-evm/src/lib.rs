//! daoindex-evm — governance log fetcher and index loop.

pub mod builder;
pub mod fetcher;
pub mod index_loop;
pub mod source;

pub use builder::IndexerBuilder;
pub use fetcher::{split_range, BatchFetcher, FetchedRange};
pub use index_loop::{Indexer, IndexerStats, IndexerStatus, PassOutcome, ShutdownHandle};
pub use source::{LedgerLogSource, LogQuery, MemoryLogSource};
