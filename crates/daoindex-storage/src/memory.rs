//! In-memory storage backend.
//!
//! Stores proposal aggregates and the ingestion checkpoint in RAM.
//! All data is lost when the process exits.

use std::collections::HashMap;
use std::sync::RwLock;

use daoindex_core::checkpoint::Checkpoint;
use daoindex_core::error::IndexerError;
use daoindex_core::store::{ProposalReader, StateStore};
use daoindex_core::types::Proposal;

#[derive(Default)]
struct Inner {
    /// Proposals in insertion order.
    proposals: Vec<Proposal>,
    /// Proposal id → position in `proposals`.
    index: HashMap<String, usize>,
    checkpoint: Checkpoint,
}

/// In-memory proposal store.
///
/// A single lock guards proposals and checkpoint together, so every call is
/// atomic with respect to every other.
#[derive(Default)]
pub struct InMemoryStateStore {
    inner: RwLock<Inner>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing checkpoint.
    pub fn with_checkpoint(block_number: u64) -> Self {
        let store = Self::default();
        store.inner.write().unwrap().checkpoint = Checkpoint::new(block_number);
        store
    }

    /// The full checkpoint record, including when it last moved.
    pub fn checkpoint(&self) -> Checkpoint {
        self.inner.read().unwrap().checkpoint
    }
}

impl ProposalReader for InMemoryStateStore {
    fn get_proposal(&self, id: &str) -> Option<Proposal> {
        let inner = self.inner.read().unwrap();
        inner.index.get(id).map(|&i| inner.proposals[i].clone())
    }

    fn list_proposals(&self) -> Vec<Proposal> {
        self.inner.read().unwrap().proposals.clone()
    }

    fn get_checkpoint(&self) -> u64 {
        self.inner.read().unwrap().checkpoint.block_number
    }

    fn proposal_count(&self) -> usize {
        self.inner.read().unwrap().proposals.len()
    }

    fn executed_count(&self) -> usize {
        self.inner
            .read()
            .unwrap()
            .proposals
            .iter()
            .filter(|p| p.executed)
            .count()
    }
}

impl StateStore for InMemoryStateStore {
    fn put_proposal(&self, proposal: Proposal) {
        let mut inner = self.inner.write().unwrap();
        match inner.index.get(&proposal.id).copied() {
            Some(i) => inner.proposals[i] = proposal,
            None => {
                let pos = inner.proposals.len();
                inner.index.insert(proposal.id.clone(), pos);
                inner.proposals.push(proposal);
            }
        }
    }

    fn set_checkpoint(&self, block_number: u64) -> Result<(), IndexerError> {
        let mut inner = self.inner.write().unwrap();
        inner.checkpoint.advance(block_number).map_err(|e| {
            tracing::error!(error = %e, "Refusing checkpoint regression");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use chrono::{DateTime, Utc};

    fn proposal(id: &str) -> Proposal {
        Proposal::new(id, "0xabc", "desc", 1, "0x0", DateTime::<Utc>::UNIX_EPOCH)
    }

    #[test]
    fn insert_and_query_proposals() {
        let store = InMemoryStateStore::new();
        store.put_proposal(proposal("3"));
        store.put_proposal(proposal("1"));
        store.put_proposal(proposal("2"));

        let ids: Vec<_> = store.list_proposals().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert_eq!(store.proposal_count(), 3);
        assert!(store.get_proposal("1").is_some());
        assert!(store.get_proposal("4").is_none());
    }

    #[test]
    fn put_replaces_in_place() {
        let store = InMemoryStateStore::new();
        store.put_proposal(proposal("1"));
        store.put_proposal(proposal("2"));

        let mut updated = proposal("1");
        updated.executed = true;
        updated.vote_count_for = U256::from(9u64);
        store.put_proposal(updated);

        let all = store.list_proposals();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "1");
        assert!(all[0].executed);
        assert_eq!(all[0].vote_count_for, U256::from(9u64));
        assert_eq!(store.executed_count(), 1);
    }

    #[test]
    fn votes_and_summaries_pass_through() {
        let store = InMemoryStateStore::new();
        store.put_proposal(proposal("1"));
        assert_eq!(store.proposal_votes("1"), Some(vec![]));
        assert_eq!(store.proposal_votes("2"), None);
        assert_eq!(store.list_summaries()[0].id, "1");
    }

    #[test]
    fn checkpoint_only_moves_forward() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.get_checkpoint(), 0);
        store.set_checkpoint(100).unwrap();
        store.set_checkpoint(100).unwrap();
        store.set_checkpoint(105).unwrap();

        let err = store.set_checkpoint(104).unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(store.get_checkpoint(), 105);
        assert!(store.checkpoint().updated_at.is_some());
    }

    #[test]
    fn resume_from_saved_checkpoint() {
        let store = InMemoryStateStore::with_checkpoint(1000);
        assert_eq!(store.get_checkpoint(), 1000);
        assert!(store.set_checkpoint(999).is_err());
    }
}
