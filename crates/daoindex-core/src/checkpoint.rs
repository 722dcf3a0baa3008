//! Ingestion checkpoint — the highest block whose events are fully applied.
//!
//! The checkpoint only moves forward. Every pass reads from
//! `checkpoint + 1`, so a range is never fetched twice once it has been
//! checkpointed; a failed pass leaves the checkpoint where it was and the
//! next pass retries the same range.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

/// The indexer's position in the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Last block fully applied. `0` means nothing has been applied yet.
    pub block_number: u64,
    /// When the checkpoint last moved.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    pub fn new(block_number: u64) -> Self {
        Self {
            block_number,
            updated_at: None,
        }
    }

    /// Move the checkpoint to `block_number`.
    ///
    /// Fails with `InvariantViolation` if that would move it backwards.
    /// Re-setting the current value is allowed.
    pub fn advance(&mut self, block_number: u64) -> Result<(), IndexerError> {
        if block_number < self.block_number {
            return Err(IndexerError::InvariantViolation {
                current: self.block_number,
                attempted: block_number,
            });
        }
        self.block_number = block_number;
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Returns the next block to process (checkpoint + 1).
    pub fn next_block(&self) -> u64 {
        self.block_number.saturating_add(1)
    }

    /// First block of the next pass, never below `start_block`.
    pub fn resume_from(&self, start_block: u64) -> u64 {
        start_block.max(self.next_block())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_advance() {
        let mut cp = Checkpoint::new(100);
        cp.advance(150).unwrap();
        assert_eq!(cp.block_number, 150);
        assert!(cp.updated_at.is_some());
        // same value is not a regression
        cp.advance(150).unwrap();
    }

    #[test]
    fn checkpoint_refuses_regression() {
        let mut cp = Checkpoint::new(100);
        let err = cp.advance(99).unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(cp.block_number, 100);
    }

    #[test]
    fn resume_respects_start_block() {
        let cp = Checkpoint::default();
        assert_eq!(cp.resume_from(100), 100);
        assert_eq!(cp.resume_from(0), 1);

        let cp = Checkpoint::new(500);
        assert_eq!(cp.resume_from(100), 501);
    }
}
