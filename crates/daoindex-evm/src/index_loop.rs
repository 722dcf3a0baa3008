//! The main index loop — orchestrates catch-up and live phases.
//!
//! # Phase 1: CATCH-UP
//! Read the head once, fetch `[max(start_block, checkpoint + 1), head]`,
//! apply everything, then move the checkpoint to `head`. A failure leaves
//! the checkpoint untouched and the loop moves on to live mode regardless.
//!
//! # Phase 2: LIVE
//! Every `poll_interval_ms`, run the same fetch → apply → checkpoint
//! protocol over the blocks produced since the checkpoint. A failed tick is
//! logged and the next tick retries from the same checkpoint.
//!
//! Passes never overlap: a pass that starts while another is running is
//! dropped, and missed timer ticks are skipped rather than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use daoindex_core::checkpoint::Checkpoint;
use daoindex_core::error::IndexerError;
use daoindex_core::indexer::{IndexerConfig, IndexerState};
use daoindex_core::projector::{ApplyReport, EventProjector};
use daoindex_core::store::{ProposalReader, StateStore};
use daoindex_core::types::IndexPhase;

use crate::fetcher::BatchFetcher;
use crate::source::LedgerLogSource;

/// What a single catch-up pass or live tick did.
#[derive(Debug)]
pub enum PassOutcome {
    /// Events in `[from, to]` were applied and the checkpoint moved to `to`.
    Applied {
        from: u64,
        to: u64,
        report: ApplyReport,
    },
    /// Nothing new since the checkpoint.
    UpToDate { checkpoint: u64 },
    /// Another pass was still running.
    Skipped,
    /// The pass failed; the checkpoint did not move.
    Failed(IndexerError),
}

impl PassOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Counters for observability.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexerStats {
    pub catch_up_passes: u64,
    pub live_ticks: u64,
    /// Ticks dropped because a pass was already running.
    pub skipped_ticks: u64,
    pub failed_passes: u64,
    pub events_applied: u64,
    pub anomalies: u64,
    pub last_head: Option<u64>,
    pub last_error: Option<String>,
}

/// A point-in-time view of the indexer.
#[derive(Debug, Clone, Serialize)]
pub struct IndexerStatus {
    pub state: IndexerState,
    pub checkpoint: u64,
    pub stats: IndexerStats,
}

/// Stops a running indexer. Cloneable; any clone may trigger shutdown.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Stop the live loop and abort any in-flight fetch at its next sub-range.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Clears the single-flight flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The governance indexer: owns the fetcher and is the only writer of the store.
pub struct Indexer<L: LedgerLogSource, S: StateStore> {
    config: IndexerConfig,
    fetcher: BatchFetcher<L>,
    store: Arc<S>,
    state: Mutex<IndexerState>,
    stats: Mutex<IndexerStats>,
    busy: AtomicBool,
    shutdown: ShutdownHandle,
}

impl<L: LedgerLogSource, S: StateStore> Indexer<L, S> {
    pub fn new(config: IndexerConfig, source: L, store: Arc<S>) -> Result<Self, IndexerError> {
        config.validate()?;
        let (tx, rx) = watch::channel(false);
        let fetcher = BatchFetcher::new(source, config.batch_size, config.max_concurrent_fetches)
            .with_shutdown(rx);
        Ok(Self {
            config,
            fetcher,
            store,
            state: Mutex::new(IndexerState::Idle),
            stats: Mutex::new(IndexerStats::default()),
            busy: AtomicBool::new(false),
            shutdown: ShutdownHandle { tx: Arc::new(tx) },
        })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// The store this indexer writes to.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn state(&self) -> IndexerState {
        *self.state.lock().unwrap()
    }

    pub fn status(&self) -> IndexerStatus {
        IndexerStatus {
            state: self.state(),
            checkpoint: self.store.get_checkpoint(),
            stats: self.stats.lock().unwrap().clone(),
        }
    }

    /// Run catch-up, then poll until shutdown.
    pub async fn run(&self) {
        let mut shutdown = self.shutdown.tx.subscribe();
        tracing::info!(
            start_block = self.config.start_block,
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval_ms,
            checkpoint = self.store.get_checkpoint(),
            "Starting governance indexer"
        );

        if !*shutdown.borrow() {
            self.catch_up().await;
        }

        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately; live polling starts one interval later
        ticker.tick().await;

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.set_state(IndexerState::Stopped);
        tracing::info!(checkpoint = self.store.get_checkpoint(), "Indexer stopped");
    }

    /// One-shot backfill from the checkpoint to the current head.
    ///
    /// Runs only from `Idle`; otherwise returns `Skipped` without touching
    /// state. Always leaves the indexer in `Live` (or `Stopped` after
    /// shutdown), whether or not the pass succeeded.
    pub async fn catch_up(&self) -> PassOutcome {
        {
            let mut current = self.state.lock().unwrap();
            let state = *current;
            if state != IndexerState::Idle {
                tracing::debug!(%state, "Catch-up already done, skipping");
                return PassOutcome::Skipped;
            }
            *current = IndexerState::CatchingUp;
        }

        let outcome = self.run_pass(IndexPhase::CatchUp).await;
        if self.shutdown.is_shutdown() {
            self.set_state(IndexerState::Stopped);
        } else {
            self.set_state(IndexerState::Live);
        }
        outcome
    }

    /// One live tick: fetch and apply whatever arrived since the checkpoint.
    pub async fn poll_once(&self) -> PassOutcome {
        self.run_pass(IndexPhase::Live).await
    }

    async fn run_pass(&self, phase: IndexPhase) -> PassOutcome {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            tracing::debug!(%phase, "Previous pass still running, dropping this one");
            self.stats.lock().unwrap().skipped_ticks += 1;
            return PassOutcome::Skipped;
        }
        let _guard = PassGuard(&self.busy);

        let result = self.fetch_and_apply(phase).await;

        let mut stats = self.stats.lock().unwrap();
        match phase {
            IndexPhase::CatchUp => stats.catch_up_passes += 1,
            IndexPhase::Live => stats.live_ticks += 1,
        }
        match result {
            Ok(outcome) => {
                if let PassOutcome::Applied { report, .. } = &outcome {
                    stats.events_applied += report.applied() as u64;
                    stats.anomalies += report.anomalies.len() as u64;
                }
                outcome
            }
            Err(e) => {
                stats.failed_passes += 1;
                stats.last_error = Some(e.to_string());
                match &e {
                    IndexerError::Aborted { .. } => {
                        tracing::info!(%phase, reason = %e, "Pass aborted")
                    }
                    IndexerError::InvariantViolation { .. } => {
                        tracing::error!(%phase, error = %e, "Pass aborted on invariant violation")
                    }
                    _ => tracing::warn!(
                        %phase,
                        error = %e,
                        checkpoint = self.store.get_checkpoint(),
                        "Pass failed, will retry from the same checkpoint"
                    ),
                }
                PassOutcome::Failed(e)
            }
        }
    }

    async fn fetch_and_apply(&self, phase: IndexPhase) -> Result<PassOutcome, IndexerError> {
        let checkpoint = self.store.get_checkpoint();
        let from = Checkpoint::new(checkpoint).resume_from(self.config.start_block);
        let to = self.fetcher.current_head().await?;
        self.stats.lock().unwrap().last_head = Some(to);

        if from > to {
            tracing::debug!(%phase, checkpoint, head = to, "No new blocks");
            return Ok(PassOutcome::UpToDate { checkpoint });
        }

        tracing::info!(%phase, from, to, "Fetching governance logs");
        let fetched = self.fetcher.fetch_range(from, to).await?;

        // the range was chosen from `checkpoint`; if it moved meanwhile, applying would double-count
        let current = self.store.get_checkpoint();
        if current != checkpoint {
            return Err(IndexerError::InvariantViolation {
                current,
                attempted: to,
            });
        }

        let report = EventProjector::new(self.store.as_ref(), Utc::now()).apply_in_kind_order(
            &fetched.created,
            &fetched.voted,
            &fetched.executed,
        );

        // an empty range still advances: `to` was a valid head and nothing below it was missed
        self.store.set_checkpoint(to)?;

        tracing::info!(
            %phase,
            from,
            to,
            created = report.created,
            votes = report.votes,
            executed = report.executed,
            anomalies = report.anomalies.len(),
            "Range applied"
        );
        Ok(PassOutcome::Applied { from, to, report })
    }

    fn set_state(&self, state: IndexerState) {
        let mut current = self.state.lock().unwrap();
        let previous = *current;
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Indexer state change");
            *current = state;
        }
    }
}

impl<L: LedgerLogSource, S: StateStore + 'static> Indexer<L, S> {
    /// Read-only handle to the indexed state, for API layers.
    pub fn reader(&self) -> Arc<dyn ProposalReader> {
        self.store.clone()
    }
}
