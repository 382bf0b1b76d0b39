//! Auto-Indexing Manager: the state machine that owns indexing lifecycle.
//!
//! The manager is the sole authoritative source of index status. It drives
//! [`crate::incremental::IncrementalIndexer`] on a background task and
//! publishes every transition through a `tokio::sync::watch` channel, so
//! `check_index_availability` can wait on a signal instead of polling.
//!
//! States: `Idle -> Estimating -> Waiting -> Indexing -> {Completed, Failed,
//! Cancelled}`. The `Idle -> Estimating` transition is published before the
//! worker task is spawned, closing the race where a concurrent query would
//! otherwise observe a stale `Idle`.

use crate::errors::ToolError;
use crate::incremental::{IncrementalIndexer, IndexOptions, IndexReport};
use crate::state::CodeIndex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub enum IndexStatus {
    Idle,
    Estimating,
    Waiting { estimated_files: usize },
    Indexing { processed: usize, total: usize },
    Completed { report: IndexReportSummary },
    Failed { reason: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexReportSummary {
    pub total_files: usize,
    pub parsed_files: usize,
    pub skipped_files: usize,
    pub removed_files: usize,
}

impl From<&IndexReport> for IndexReportSummary {
    fn from(r: &IndexReport) -> Self {
        Self {
            total_files: r.total_files,
            parsed_files: r.parsed_files,
            skipped_files: r.skipped_files,
            removed_files: r.removed_files,
        }
    }
}

/// Whether a query should proceed immediately, wait, or fail given the
/// current status.
pub enum Availability {
    Available,
    Wait,
    Unavailable { reason: String },
}

fn classify(status: &IndexStatus) -> Availability {
    match status {
        IndexStatus::Idle | IndexStatus::Completed { .. } | IndexStatus::Cancelled => {
            Availability::Available
        }
        IndexStatus::Failed { reason } => Availability::Unavailable {
            reason: reason.clone(),
        },
        IndexStatus::Estimating | IndexStatus::Waiting { .. } | IndexStatus::Indexing { .. } => {
            Availability::Wait
        }
    }
}

pub struct IndexManager {
    state: Arc<CodeIndex>,
    root: PathBuf,
    indexer: IncrementalIndexer,
    status_tx: watch::Sender<IndexStatus>,
    status_rx: watch::Receiver<IndexStatus>,
    cancelled: Arc<AtomicBool>,
    wait_timeout: Duration,
}

impl IndexManager {
    pub fn new(state: Arc<CodeIndex>, root: PathBuf, wait_timeout: Duration) -> Self {
        let (status_tx, status_rx) = watch::channel(IndexStatus::Idle);
        Self {
            state,
            root,
            indexer: IncrementalIndexer::new(),
            status_tx,
            status_rx,
            cancelled: Arc::new(AtomicBool::new(false)),
            wait_timeout,
        }
    }

    pub fn status(&self) -> IndexStatus {
        self.status_rx.borrow().clone()
    }

    fn publish(&self, status: IndexStatus) {
        tracing::debug!(?status, "index manager transition");
        let _ = self.status_tx.send(status);
    }

    /// Start (or restart) indexing in the background. Publishes
    /// `Estimating` synchronously before returning, so a query issued right
    /// after this call never observes a stale `Idle`.
    pub fn start(self: &Arc<Self>, options: IndexOptions) {
        self.cancelled.store(false, Ordering::SeqCst);
        self.publish(IndexStatus::Estimating);

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run(options).await;
        });
    }

    async fn run(self: Arc<Self>, options: IndexOptions) {
        let discovery = crate::discovery::FileDiscovery::new();
        let estimated_files = discovery
            .discover(&self.root)
            .map(|files| files.len())
            .unwrap_or(0);

        if self.cancelled.load(Ordering::SeqCst) {
            self.publish(IndexStatus::Cancelled);
            return;
        }
        self.publish(IndexStatus::Waiting { estimated_files });
        self.publish(IndexStatus::Indexing {
            processed: 0,
            total: estimated_files,
        });

        let result = self
            .indexer
            .index(&self.state, &self.root, &options)
            .await;

        if self.cancelled.load(Ordering::SeqCst) {
            self.publish(IndexStatus::Cancelled);
            return;
        }

        match result {
            Ok(report) => {
                crate::effects::seed_local_pass(&self.state);
                crate::effects::propagate(&self.state);
                crate::annotations::seed_direct_annotations(&self.state);
                crate::annotations::propagate(
                    &self.state,
                    &crate::annotations::PropagationConfig::default(),
                );
                self.publish(IndexStatus::Completed {
                    report: IndexReportSummary::from(&report),
                });
            }
            Err(e) => {
                tracing::error!("indexing failed: {e:#}");
                self.publish(IndexStatus::Failed {
                    reason: e.to_string(),
                });
            }
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.publish(IndexStatus::Cancelled);
    }

    /// Check whether queries may proceed right now, waiting on the
    /// completion signal (not polling) up to the configured timeout when the
    /// manager is mid-run.
    pub async fn check_index_availability(&self) -> Result<(), ToolError> {
        let mut rx = self.status_rx.clone();
        loop {
            let current = rx.borrow().clone();
            match classify(&current) {
                Availability::Available => return Ok(()),
                Availability::Unavailable { reason } => {
                    return Err(ToolError::not_available(reason));
                }
                Availability::Wait => {
                    match tokio::time::timeout(self.wait_timeout, rx.changed()).await {
                        Ok(Ok(())) => continue,
                        Ok(Err(_)) => {
                            return Err(ToolError::not_available(
                                "index manager shut down".to_string(),
                            ));
                        }
                        Err(_) => {
                            return Err(ToolError::not_ready(
                                "index is still building; try again shortly".to_string(),
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Block until the manager leaves `Estimating`/`Waiting`/`Indexing`, or
    /// the timeout elapses. Used by callers that want to wait once rather
    /// than loop on `check_index_availability`.
    pub async fn wait_for_completion(&self, timeout: Duration) -> Result<IndexStatus, ToolError> {
        let mut rx = self.status_rx.clone();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let current = rx.borrow().clone();
            if !matches!(
                current,
                IndexStatus::Estimating | IndexStatus::Waiting { .. } | IndexStatus::Indexing { .. }
            ) {
                return Ok(current);
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(ToolError::not_ready("timed out waiting for index".to_string()));
            }
            match tokio::time::timeout(remaining, rx.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => {
                    return Err(ToolError::not_available(
                        "index manager shut down".to_string(),
                    ));
                }
                Err(_) => return Err(ToolError::not_ready("timed out waiting for index".to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_and_completed_are_available() {
        assert!(matches!(
            classify(&IndexStatus::Idle),
            Availability::Available
        ));
        assert!(matches!(
            classify(&IndexStatus::Completed {
                report: IndexReportSummary {
                    total_files: 0,
                    parsed_files: 0,
                    skipped_files: 0,
                    removed_files: 0,
                }
            }),
            Availability::Available
        ));
    }

    #[test]
    fn indexing_waits() {
        assert!(matches!(
            classify(&IndexStatus::Indexing {
                processed: 1,
                total: 2
            }),
            Availability::Wait
        ));
    }

    #[test]
    fn failed_is_unavailable_with_reason() {
        match classify(&IndexStatus::Failed {
            reason: "disk full".to_string(),
        }) {
            Availability::Unavailable { reason } => assert_eq!(reason, "disk full"),
            _ => panic!("expected unavailable"),
        }
    }
}
