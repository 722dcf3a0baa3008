//! Shared types: decoded governance events and the proposal aggregate.

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── EventKind ────────────────────────────────────────────────────────────────

/// The three governance events the indexer tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ProposalCreated,
    Voted,
    ProposalExecuted,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProposalCreated => write!(f, "ProposalCreated"),
            Self::Voted => write!(f, "Voted"),
            Self::ProposalExecuted => write!(f, "ProposalExecuted"),
        }
    }
}

// ─── GovernanceEvent ─────────────────────────────────────────────────────────

/// Decoded arguments of a governance log, one variant per event kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GovernanceEvent {
    #[serde(rename_all = "camelCase")]
    ProposalCreated {
        #[serde(with = "decimal")]
        proposal_id: U256,
        creator: String,
        description: String,
        start_block: u64,
    },
    #[serde(rename_all = "camelCase")]
    Voted {
        #[serde(with = "decimal")]
        proposal_id: U256,
        voter: String,
        support: bool,
        #[serde(with = "decimal")]
        weight: U256,
    },
    #[serde(rename_all = "camelCase")]
    ProposalExecuted {
        #[serde(with = "decimal")]
        proposal_id: U256,
    },
}

impl GovernanceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ProposalCreated { .. } => EventKind::ProposalCreated,
            Self::Voted { .. } => EventKind::Voted,
            Self::ProposalExecuted { .. } => EventKind::ProposalExecuted,
        }
    }

    /// The proposal id in its storage key form (decimal string).
    pub fn proposal_key(&self) -> String {
        match self {
            Self::ProposalCreated { proposal_id, .. }
            | Self::Voted { proposal_id, .. }
            | Self::ProposalExecuted { proposal_id } => proposal_id.to_string(),
        }
    }
}

// ─── RawEvent ─────────────────────────────────────────────────────────────────

/// A governance log as delivered by a `LedgerLogSource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Block the log was emitted in.
    pub block_number: u64,
    /// Position of the log within its block.
    pub log_index: u32,
    /// Transaction hash (`0x…`).
    pub transaction_hash: String,
    /// Decoded arguments.
    pub event: GovernanceEvent,
}

impl RawEvent {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    /// Chain position used for ordering: `(block_number, log_index)`.
    pub fn position(&self) -> (u64, u32) {
        (self.block_number, self.log_index)
    }
}

// ─── Vote ─────────────────────────────────────────────────────────────────────

/// One cast vote, projected from a `Voted` event. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub voter: String,
    pub support: bool,
    #[serde(with = "decimal")]
    pub weight: U256,
    pub block_number: u64,
    pub transaction_hash: String,
    /// Ingestion time.
    pub timestamp: DateTime<Utc>,
}

// ─── Proposal ─────────────────────────────────────────────────────────────────

/// The proposal aggregate, rebuilt purely from its event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    /// Decimal string of the on-chain proposal id.
    pub id: String,
    pub creator: String,
    pub description: String,
    pub start_block: u64,
    /// Ingestion time of the creation event.
    pub created_at: DateTime<Utc>,
    pub end_block: Option<u64>,
    pub executed: bool,
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(with = "decimal")]
    pub vote_count_for: U256,
    #[serde(with = "decimal")]
    pub vote_count_against: U256,
    /// Hash of the transaction that created the proposal.
    pub transaction_hash: String,
    /// Votes in arrival order.
    pub votes: Vec<Vote>,
}

impl Proposal {
    /// A freshly created proposal: not executed, no votes.
    pub fn new(
        id: impl Into<String>,
        creator: impl Into<String>,
        description: impl Into<String>,
        start_block: u64,
        transaction_hash: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            creator: creator.into(),
            description: description.into(),
            start_block,
            created_at,
            end_block: None,
            executed: false,
            executed_at: None,
            vote_count_for: U256::ZERO,
            vote_count_against: U256::ZERO,
            transaction_hash: transaction_hash.into(),
            votes: Vec::new(),
        }
    }

    /// Sum of `support == true` weights recomputed from the vote list.
    pub fn recount_for(&self) -> Option<U256> {
        self.recount(true)
    }

    /// Sum of `support == false` weights recomputed from the vote list.
    pub fn recount_against(&self) -> Option<U256> {
        self.recount(false)
    }

    fn recount(&self, support: bool) -> Option<U256> {
        self.votes
            .iter()
            .filter(|v| v.support == support)
            .try_fold(U256::ZERO, |acc, v| acc.checked_add(v.weight))
    }
}

/// A proposal without its vote list, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalSummary {
    pub id: String,
    pub creator: String,
    pub description: String,
    pub start_block: u64,
    pub created_at: DateTime<Utc>,
    pub end_block: Option<u64>,
    pub executed: bool,
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(with = "decimal")]
    pub vote_count_for: U256,
    #[serde(with = "decimal")]
    pub vote_count_against: U256,
    pub transaction_hash: String,
    pub vote_count: usize,
}

impl From<&Proposal> for ProposalSummary {
    fn from(p: &Proposal) -> Self {
        Self {
            id: p.id.clone(),
            creator: p.creator.clone(),
            description: p.description.clone(),
            start_block: p.start_block,
            created_at: p.created_at,
            end_block: p.end_block,
            executed: p.executed,
            executed_at: p.executed_at,
            vote_count_for: p.vote_count_for,
            vote_count_against: p.vote_count_against,
            transaction_hash: p.transaction_hash.clone(),
            vote_count: p.votes.len(),
        }
    }
}

// ─── IndexPhase ───────────────────────────────────────────────────────────────

/// Which pass is applying events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexPhase {
    /// One-shot backfill from the checkpoint to the head observed at startup.
    CatchUp,
    /// Recurring incremental poll.
    Live,
}

impl std::fmt::Display for IndexPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CatchUp => write!(f, "catch-up"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Serde adapter writing a `U256` as a base-10 string.
pub mod decimal {
    use alloy_primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
        let s = String::deserialize(d)?;
        U256::from_str_radix(&s, 10).map_err(de::Error::custom)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(support: bool, weight: u64) -> Vote {
        Vote {
            voter: "0xdef".into(),
            support,
            weight: U256::from(weight),
            block_number: 1,
            transaction_hash: "0x1".into(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn proposal_serializes_weights_as_decimal_strings() {
        let mut p = Proposal::new("7", "0xabc", "Test", 100, "0xaaa", DateTime::<Utc>::UNIX_EPOCH);
        p.vote_count_for = U256::from(1_000_000_000_000_000_000u64);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["voteCountFor"], "1000000000000000000");
        assert_eq!(json["voteCountAgainst"], "0");
        assert_eq!(json["executed"], false);
        assert!(json["endBlock"].is_null());

        let back: Proposal = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn summary_drops_votes() {
        let mut p = Proposal::new("1", "0xabc", "d", 1, "0x0", DateTime::<Utc>::UNIX_EPOCH);
        p.votes.push(vote(true, 5));
        let json = serde_json::to_value(ProposalSummary::from(&p)).unwrap();
        assert!(json.get("votes").is_none());
        assert_eq!(json["voteCount"], 1);
    }

    #[test]
    fn recount_splits_by_support() {
        let mut p = Proposal::new("1", "0xabc", "d", 1, "0x0", DateTime::<Utc>::UNIX_EPOCH);
        p.votes.push(vote(true, 5));
        p.votes.push(vote(false, 3));
        p.votes.push(vote(true, 2));
        assert_eq!(p.recount_for(), Some(U256::from(7u64)));
        assert_eq!(p.recount_against(), Some(U256::from(3u64)));
    }

    #[test]
    fn event_proposal_key_is_decimal() {
        let e = GovernanceEvent::ProposalExecuted {
            proposal_id: U256::from(255u64),
        };
        assert_eq!(e.proposal_key(), "255");
        assert_eq!(e.kind(), EventKind::ProposalExecuted);
    }

    #[test]
    fn decimal_rejects_garbage() {
        let json = serde_json::json!({
            "kind": "proposalExecuted",
            "proposalId": "0xzz",
        });
        assert!(serde_json::from_value::<GovernanceEvent>(json).is_err());
    }
}
