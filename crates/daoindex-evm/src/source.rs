//! Ledger log source — the seam between the indexer and the chain client.
//!
//! The RPC client that talks to a node (log filters, ABI decoding) lives
//! outside this crate; it only has to implement [`LedgerLogSource`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use daoindex_core::error::IndexerError;
use daoindex_core::types::{EventKind, RawEvent};

/// Trait for reading governance logs from a chain.
#[async_trait]
pub trait LedgerLogSource: Send + Sync {
    /// All logs of `kind` in the inclusive range `[from, to]`, ordered by
    /// `(block_number, log_index)`.
    ///
    /// Network and node failures (including "block out of range" from a
    /// node that has not seen `to` yet) are reported as
    /// [`IndexerError::Fetch`].
    async fn query_logs(
        &self,
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawEvent>, IndexerError>;

    /// Latest block number known to the node.
    async fn current_head(&self) -> Result<u64, IndexerError>;
}

#[async_trait]
impl<T: LedgerLogSource + ?Sized> LedgerLogSource for Arc<T> {
    async fn query_logs(
        &self,
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawEvent>, IndexerError> {
        (**self).query_logs(kind, from, to).await
    }

    async fn current_head(&self) -> Result<u64, IndexerError> {
        (**self).current_head().await
    }
}

// ─── In-memory source (for testing) ───────────────────────────────────────────

/// One recorded `query_logs` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub kind: EventKind,
    pub from: u64,
    pub to: u64,
}

#[derive(Default)]
struct MemoryChain {
    head: u64,
    events: Vec<RawEvent>,
    queries: Vec<LogQuery>,
    failing_queries: u32,
    failing_heads: u32,
    latency: Option<Duration>,
}

/// In-memory log source for tests and demos.
///
/// Holds a fake chain of events and a head number, records every query, and
/// can be told to fail the next N calls.
#[derive(Default)]
pub struct MemoryLogSource {
    chain: Mutex<MemoryChain>,
}

impl MemoryLogSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the chain head.
    pub fn set_head(&self, head: u64) {
        self.chain.lock().unwrap().head = head;
    }

    /// Append an event to the fake chain.
    pub fn push(&self, event: RawEvent) {
        self.chain.lock().unwrap().events.push(event);
    }

    /// Fail the next `n` `query_logs` calls with a fetch error.
    pub fn fail_next_queries(&self, n: u32) {
        self.chain.lock().unwrap().failing_queries = n;
    }

    /// Fail the next `n` `current_head` calls with a fetch error.
    pub fn fail_next_heads(&self, n: u32) {
        self.chain.lock().unwrap().failing_heads = n;
    }

    /// Delay every `query_logs` call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.chain.lock().unwrap().latency = Some(latency);
    }

    /// Every `query_logs` call made so far, in call order.
    pub fn queries(&self) -> Vec<LogQuery> {
        self.chain.lock().unwrap().queries.clone()
    }
}

#[async_trait]
impl LedgerLogSource for MemoryLogSource {
    async fn query_logs(
        &self,
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawEvent>, IndexerError> {
        let latency = self.chain.lock().unwrap().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut chain = self.chain.lock().unwrap();
        chain.queries.push(LogQuery { kind, from, to });
        if chain.failing_queries > 0 {
            chain.failing_queries -= 1;
            return Err(IndexerError::Fetch("injected query failure".into()));
        }
        if to > chain.head {
            return Err(IndexerError::Fetch(format!(
                "block range extends beyond head: to {to} > head {}",
                chain.head
            )));
        }

        let mut logs: Vec<RawEvent> = chain
            .events
            .iter()
            .filter(|e| e.kind() == kind && (from..=to).contains(&e.block_number))
            .cloned()
            .collect();
        logs.sort_by_key(|e| e.position());
        Ok(logs)
    }

    async fn current_head(&self) -> Result<u64, IndexerError> {
        let mut chain = self.chain.lock().unwrap();
        if chain.failing_heads > 0 {
            chain.failing_heads -= 1;
            return Err(IndexerError::Fetch("injected head failure".into()));
        }
        Ok(chain.head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use daoindex_core::types::GovernanceEvent;

    fn executed(id: u64, block: u64, log_index: u32) -> RawEvent {
        RawEvent {
            block_number: block,
            log_index,
            transaction_hash: format!("0x{block}{log_index}"),
            event: GovernanceEvent::ProposalExecuted {
                proposal_id: U256::from(id),
            },
        }
    }

    #[tokio::test]
    async fn memory_source_filters_and_orders() {
        let source = MemoryLogSource::new();
        source.set_head(200);
        source.push(executed(1, 150, 1));
        source.push(executed(2, 150, 0));
        source.push(executed(3, 120, 0));
        source.push(executed(4, 201, 0));

        let logs = source
            .query_logs(EventKind::ProposalExecuted, 100, 200)
            .await
            .unwrap();
        let positions: Vec<_> = logs.iter().map(|e| e.position()).collect();
        assert_eq!(positions, vec![(120, 0), (150, 0), (150, 1)]);

        let none = source.query_logs(EventKind::Voted, 100, 200).await.unwrap();
        assert!(none.is_empty());
        assert_eq!(source.queries().len(), 2);
    }

    #[tokio::test]
    async fn memory_source_rejects_ranges_past_head() {
        let source = MemoryLogSource::new();
        source.set_head(10);
        let err = source
            .query_logs(EventKind::Voted, 5, 11)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let source = Arc::new(MemoryLogSource::new());
        source.set_head(10);
        source.fail_next_queries(1);
        source.fail_next_heads(1);

        assert!(source.current_head().await.is_err());
        assert_eq!(source.current_head().await.unwrap(), 10);
        assert!(source.query_logs(EventKind::Voted, 1, 10).await.is_err());
        assert!(source.query_logs(EventKind::Voted, 1, 10).await.is_ok());
    }
}
