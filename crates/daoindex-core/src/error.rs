//! Error types for the daoindex pipeline.

use thiserror::Error;

use crate::types::EventKind;

/// Errors that can occur during indexing.
#[derive(Debug, Clone, Error)]
pub enum IndexerError {
    /// Provider or network failure while reading logs or the chain head.
    /// Retried on the next scheduled tick.
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Checkpoint regression: current {current}, attempted {attempted}")]
    InvariantViolation { current: u64, attempted: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Indexer aborted: {reason}")]
    Aborted { reason: String },

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` if the next tick may succeed where this one failed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }

    /// Returns `true` if this is a checkpoint regression (a programming error).
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}

/// An event that contradicts the state built so far.
///
/// Anomalies are never propagated: the event is skipped, the anomaly is
/// logged and counted, and processing continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolAnomaly {
    #[error("proposal {proposal_id} already exists; creation event skipped")]
    DuplicateProposal { proposal_id: String },

    #[error("{kind} event references unknown proposal {proposal_id}")]
    UnknownProposal { proposal_id: String, kind: EventKind },

    #[error("vote weight overflow on proposal {proposal_id}")]
    WeightOverflow { proposal_id: String },
}

impl ProtocolAnomaly {
    /// The proposal the anomalous event referenced.
    pub fn proposal_id(&self) -> &str {
        match self {
            Self::DuplicateProposal { proposal_id }
            | Self::UnknownProposal { proposal_id, .. }
            | Self::WeightOverflow { proposal_id } => proposal_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_are_transient() {
        assert!(IndexerError::Fetch("connection reset".into()).is_transient());
        assert!(!IndexerError::Config("batch_size".into()).is_transient());
        let regression = IndexerError::InvariantViolation { current: 10, attempted: 9 };
        assert!(regression.is_invariant_violation());
        assert!(!regression.is_transient());
    }

    #[test]
    fn anomaly_display_names_kind() {
        let a = ProtocolAnomaly::UnknownProposal {
            proposal_id: "42".into(),
            kind: EventKind::Voted,
        };
        assert_eq!(a.to_string(), "Voted event references unknown proposal 42");
        assert_eq!(a.proposal_id(), "42");
    }
}
