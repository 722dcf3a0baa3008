//! State store traits.
//!
//! [`ProposalReader`] is the read surface handed to API layers.
//! [`StateStore`] adds the two mutations, which only the indexer's apply
//! phase calls. Implementations must make every call appear atomic.

use crate::error::IndexerError;
use crate::types::{Proposal, ProposalSummary, Vote};

/// Read-only view of indexed governance state.
pub trait ProposalReader: Send + Sync {
    /// Look up a proposal by its decimal id.
    fn get_proposal(&self, id: &str) -> Option<Proposal>;

    /// All proposals in insertion order.
    fn list_proposals(&self) -> Vec<Proposal>;

    /// Last block whose events are fully applied.
    fn get_checkpoint(&self) -> u64;

    /// Votes of one proposal in arrival order, `None` if the proposal is unknown.
    fn proposal_votes(&self, id: &str) -> Option<Vec<Vote>> {
        self.get_proposal(id).map(|p| p.votes)
    }

    /// Proposals without their vote lists, in insertion order.
    fn list_summaries(&self) -> Vec<ProposalSummary> {
        self.list_proposals().iter().map(ProposalSummary::from).collect()
    }

    fn proposal_count(&self) -> usize {
        self.list_proposals().len()
    }

    /// Number of executed proposals, derived by scanning.
    fn executed_count(&self) -> usize {
        self.list_proposals().iter().filter(|p| p.executed).count()
    }
}

/// A store the indexer can write to.
pub trait StateStore: ProposalReader {
    /// Insert or replace a proposal (last write wins on the full record).
    /// A replaced proposal keeps its original insertion position.
    fn put_proposal(&self, proposal: Proposal);

    /// Move the checkpoint forward.
    ///
    /// Fails with [`IndexerError::InvariantViolation`] if `block_number` is
    /// below the current checkpoint.
    fn set_checkpoint(&self, block_number: u64) -> Result<(), IndexerError>;
}
