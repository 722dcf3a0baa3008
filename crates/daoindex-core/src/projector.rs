//! Event projector — reducers that fold governance events into proposals.
//!
//! Each reducer applies exactly one event. They are deterministic given the
//! ingestion timestamp and never fail: an event that contradicts the current
//! state is skipped and reported as a [`ProtocolAnomaly`].
//!
//! Reducers are not replay-safe. Applying the same `Voted` event twice counts
//! it twice; replay protection comes from the checkpoint, which never lets a
//! range be fetched again once applied.

use alloy_primitives::U256;
use chrono::{DateTime, Utc};

use crate::error::ProtocolAnomaly;
use crate::store::{ProposalReader, StateStore};
use crate::types::{EventKind, GovernanceEvent, Proposal, RawEvent, Vote};

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Created,
    VoteRecorded,
    Executed,
    Skipped(ProtocolAnomaly),
}

impl Applied {
    pub fn anomaly(&self) -> Option<&ProtocolAnomaly> {
        match self {
            Self::Skipped(a) => Some(a),
            _ => None,
        }
    }
}

/// Counts from one apply phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub created: usize,
    pub votes: usize,
    pub executed: usize,
    pub anomalies: Vec<ProtocolAnomaly>,
}

impl ApplyReport {
    /// Events that changed state.
    pub fn applied(&self) -> usize {
        self.created + self.votes + self.executed
    }

    fn record(&mut self, outcome: Applied) {
        match outcome {
            Applied::Created => self.created += 1,
            Applied::VoteRecorded => self.votes += 1,
            Applied::Executed => self.executed += 1,
            Applied::Skipped(a) => self.anomalies.push(a),
        }
    }
}

/// Applies decoded events to a [`StateStore`].
pub struct EventProjector<'a, S: StateStore + ?Sized> {
    store: &'a S,
    /// Ingestion time stamped on created proposals, votes and executions.
    now: DateTime<Utc>,
}

impl<'a, S: StateStore + ?Sized> EventProjector<'a, S> {
    pub fn new(store: &'a S, now: DateTime<Utc>) -> Self {
        Self { store, now }
    }

    /// Apply a batch in kind order: every `ProposalCreated`, then every
    /// `Voted`, then every `ProposalExecuted`, each group in chain order.
    ///
    /// Creations go first so that a vote or execution in the same batch as
    /// its proposal's creation always finds the proposal.
    pub fn apply_in_kind_order(
        &self,
        created: &[RawEvent],
        voted: &[RawEvent],
        executed: &[RawEvent],
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        for group in [created, voted, executed] {
            let mut ordered: Vec<&RawEvent> = group.iter().collect();
            ordered.sort_by_key(|e| e.position());
            for event in ordered {
                report.record(self.apply(event));
            }
        }
        report
    }

    /// Apply one event, dispatching on its kind.
    pub fn apply(&self, raw: &RawEvent) -> Applied {
        match &raw.event {
            GovernanceEvent::ProposalCreated {
                proposal_id,
                creator,
                description,
                start_block,
            } => self.apply_proposal_created(
                *proposal_id,
                creator,
                description,
                *start_block,
                &raw.transaction_hash,
            ),
            GovernanceEvent::Voted {
                proposal_id,
                voter,
                support,
                weight,
            } => self.apply_voted(
                *proposal_id,
                voter,
                *support,
                *weight,
                raw.block_number,
                &raw.transaction_hash,
            ),
            GovernanceEvent::ProposalExecuted { proposal_id } => {
                self.apply_proposal_executed(*proposal_id, raw.block_number, &raw.transaction_hash)
            }
        }
    }

    pub fn apply_proposal_created(
        &self,
        proposal_id: U256,
        creator: &str,
        description: &str,
        start_block: u64,
        tx_hash: &str,
    ) -> Applied {
        let id = proposal_id.to_string();
        if self.store.get_proposal(&id).is_some() {
            tracing::warn!(proposal_id = %id, tx = tx_hash, "Duplicate ProposalCreated, skipping");
            return Applied::Skipped(ProtocolAnomaly::DuplicateProposal { proposal_id: id });
        }

        tracing::debug!(proposal_id = %id, creator, start_block, "Proposal created");
        self.store.put_proposal(Proposal::new(
            id,
            creator,
            description,
            start_block,
            tx_hash,
            self.now,
        ));
        Applied::Created
    }

    pub fn apply_voted(
        &self,
        proposal_id: U256,
        voter: &str,
        support: bool,
        weight: U256,
        block_number: u64,
        tx_hash: &str,
    ) -> Applied {
        let id = proposal_id.to_string();
        let Some(mut proposal) = self.store.get_proposal(&id) else {
            tracing::error!(proposal_id = %id, block_number, tx = tx_hash, "Vote for unknown proposal, skipping");
            return Applied::Skipped(ProtocolAnomaly::UnknownProposal {
                proposal_id: id,
                kind: EventKind::Voted,
            });
        };

        let tally = if support {
            &mut proposal.vote_count_for
        } else {
            &mut proposal.vote_count_against
        };
        let Some(sum) = tally.checked_add(weight) else {
            tracing::error!(proposal_id = %id, %weight, "Vote weight overflows 256 bits, skipping");
            return Applied::Skipped(ProtocolAnomaly::WeightOverflow { proposal_id: id });
        };
        *tally = sum;

        proposal.votes.push(Vote {
            voter: voter.to_string(),
            support,
            weight,
            block_number,
            transaction_hash: tx_hash.to_string(),
            timestamp: self.now,
        });
        tracing::debug!(proposal_id = %id, voter, support, %weight, "Vote recorded");
        self.store.put_proposal(proposal);
        Applied::VoteRecorded
    }

    pub fn apply_proposal_executed(
        &self,
        proposal_id: U256,
        block_number: u64,
        tx_hash: &str,
    ) -> Applied {
        let id = proposal_id.to_string();
        let Some(mut proposal) = self.store.get_proposal(&id) else {
            tracing::error!(proposal_id = %id, block_number, tx = tx_hash, "Execution of unknown proposal, skipping");
            return Applied::Skipped(ProtocolAnomaly::UnknownProposal {
                proposal_id: id,
                kind: EventKind::ProposalExecuted,
            });
        };

        proposal.executed = true;
        proposal.executed_at = Some(self.now);
        tracing::debug!(proposal_id = %id, block_number, "Proposal executed");
        self.store.put_proposal(proposal);
        Applied::Executed
    }
}
