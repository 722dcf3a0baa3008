//! daoindex-storage — state store backends for DaoIndex.
//!
//! Backends:
//! - [`memory`] — in-memory (no persistence; state is rebuilt from the chain on restart)

pub mod memory;

pub use memory::InMemoryStateStore;
