//! Batch fetcher — reads a block range as bounded sub-ranges.
//!
//! Providers cap how many blocks one log query may span, so a range is cut
//! into consecutive sub-ranges of at most `batch_size` blocks. The three
//! event kinds of a sub-range are queried concurrently, and up to
//! `max_concurrent` sub-ranges are in flight at once. Results are always
//! concatenated in ascending block order.
//!
//! A fetch is all-or-nothing: if any query fails the whole range fails, so
//! the caller never applies a prefix of a range.

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::watch;

use daoindex_core::error::IndexerError;
use daoindex_core::types::{EventKind, RawEvent};

use crate::source::LedgerLogSource;

/// Events of one fetched range, grouped by kind, each in chain order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedRange {
    pub created: Vec<RawEvent>,
    pub voted: Vec<RawEvent>,
    pub executed: Vec<RawEvent>,
}

impl FetchedRange {
    /// Total number of events across all kinds.
    pub fn len(&self) -> usize {
        self.created.len() + self.voted.len() + self.executed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&mut self, mut other: FetchedRange) {
        self.created.append(&mut other.created);
        self.voted.append(&mut other.voted);
        self.executed.append(&mut other.executed);
    }
}

/// Split `[from, to]` into consecutive inclusive chunks of at most
/// `batch_size` blocks. Empty if `to < from` or `batch_size == 0`.
pub fn split_range(from: u64, to: u64, batch_size: u64) -> Vec<(u64, u64)> {
    let mut ranges = Vec::new();
    if to < from || batch_size == 0 {
        return ranges;
    }
    let mut start = from;
    loop {
        let end = start.saturating_add(batch_size - 1).min(to);
        ranges.push((start, end));
        if end == to {
            break;
        }
        start = end + 1;
    }
    ranges
}

/// Fetcher that wraps a `LedgerLogSource` and adds range batching.
pub struct BatchFetcher<L> {
    source: L,
    batch_size: u64,
    max_concurrent: usize,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<L: LedgerLogSource> BatchFetcher<L> {
    pub fn new(source: L, batch_size: u64, max_concurrent: usize) -> Self {
        Self {
            source,
            batch_size: batch_size.max(1),
            max_concurrent: max_concurrent.max(1),
            shutdown: None,
        }
    }

    /// Abort fetches once `shutdown` reads `true`. Checked before each sub-range.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Fetch the current chain head block number.
    pub async fn current_head(&self) -> Result<u64, IndexerError> {
        self.source.current_head().await
    }

    /// Fetch every tracked event in `[from, to]`.
    ///
    /// Returns an empty result when `to < from`.
    pub async fn fetch_range(&self, from: u64, to: u64) -> Result<FetchedRange, IndexerError> {
        let ranges = split_range(from, to, self.batch_size);
        if ranges.is_empty() {
            return Ok(FetchedRange::default());
        }
        tracing::debug!(from, to, sub_ranges = ranges.len(), "Fetching range");

        let parts: Vec<FetchedRange> = stream::iter(ranges)
            .map(|(start, end)| self.fetch_sub_range(start, end))
            .buffered(self.max_concurrent)
            .try_collect()
            .await?;

        let mut fetched = FetchedRange::default();
        for part in parts {
            fetched.append(part);
        }
        Ok(fetched)
    }

    async fn fetch_sub_range(&self, from: u64, to: u64) -> Result<FetchedRange, IndexerError> {
        if self.is_shutting_down() {
            return Err(IndexerError::Aborted {
                reason: format!("shutdown before sub-range {from}..={to}"),
            });
        }

        let (created, voted, executed) = futures::try_join!(
            self.query(EventKind::ProposalCreated, from, to),
            self.query(EventKind::Voted, from, to),
            self.query(EventKind::ProposalExecuted, from, to),
        )?;

        tracing::debug!(
            from,
            to,
            created = created.len(),
            voted = voted.len(),
            executed = executed.len(),
            "Sub-range fetched"
        );
        Ok(FetchedRange {
            created,
            voted,
            executed,
        })
    }

    async fn query(
        &self,
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawEvent>, IndexerError> {
        let logs = self.source.query_logs(kind, from, to).await?;
        if let Some(stray) = logs
            .iter()
            .find(|e| e.kind() != kind || !(from..=to).contains(&e.block_number))
        {
            return Err(IndexerError::Fetch(format!(
                "{kind} query for {from}..={to} returned a {} log at block {}",
                stray.kind(),
                stray.block_number
            )));
        }
        Ok(logs)
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}
