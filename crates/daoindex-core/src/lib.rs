//! daoindex-core — data model and reducers for the governance event indexer.
//!
//! # Architecture
//!
//! ```text
//! LedgerLogSource → BatchFetcher → EventProjector → StateStore
//!                                                     ├── Proposal aggregates
//!                                                     └── Checkpoint
//! ```
//!
//! This crate holds the chain-independent pieces: the aggregate types, the
//! projector, the checkpoint, and the store traits. Fetching and the index
//! loop live in `daoindex-evm`; the in-memory store lives in
//! `daoindex-storage`.

pub mod checkpoint;
pub mod error;
pub mod indexer;
pub mod projector;
pub mod store;
pub mod types;

pub use checkpoint::Checkpoint;
pub use error::{IndexerError, ProtocolAnomaly};
pub use indexer::{IndexerConfig, IndexerState};
pub use projector::{Applied, ApplyReport, EventProjector};
pub use store::{ProposalReader, StateStore};
pub use types::{
    EventKind, GovernanceEvent, IndexPhase, Proposal, ProposalSummary, RawEvent, Vote,
};
