//! # AI Completion Orchestrator
//!
//! Runs one optimizer task per incomplete node and applies the results.
//!
//! ```text
//!   plan (read lock) ──► tasks ──► worker pool ──► channel ──► apply (write lock)
//! ```
//!
//! - `workers == 1`: strictly sequential, each request awaited before the next
//! - `workers > 1`: at most `workers` requests in flight (semaphore + join set)
//!
//! Results are applied by the orchestrator alone, one short write lock per
//! result, so the store stays usable while the batch runs. A result planned
//! against an older node version is discarded as stale. The cancel token is
//! checked before each dispatch; requests already in flight finish and are
//! applied. The finished batch is recorded as a single history entry.

use crate::optimizer::{Optimizer, OptimizerError};
use carbonflow_core::{CompletionTask, EnrichmentOutcome, GraphStore, LcaError, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, Semaphore, mpsc};
use tokio::task::JoinSet;

// =============================================================================
// CANCELLATION
// =============================================================================

/// Cooperative cancellation flag shared with whoever may abort the batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop dispatching further tasks.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// A node whose optimizer call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionFailure {
    pub node_id: NodeId,
    pub message: String,
}

/// Outcome of one completion batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub requested: usize,
    pub applied: usize,
    pub failed: Vec<CompletionFailure>,
    pub stale: usize,
    pub cancelled: bool,
    /// Tasks never dispatched because of cancellation.
    pub skipped: usize,
}

type TaskResult = (CompletionTask, Result<Map<String, Value>, OptimizerError>);

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// Completion batch runner.
#[derive(Debug, Clone, Copy)]
pub struct Orchestrator {
    workers: usize,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Orchestrator {
    /// A runner with at most `workers` requests in flight (minimum one).
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Complete every node that needs it.
    pub async fn run(
        &self,
        store: &RwLock<GraphStore>,
        optimizer: Arc<dyn Optimizer>,
        cancel: &CancelToken,
    ) -> Result<CompletionReport, LcaError> {
        let tasks = store.read().await.completion_tasks()?;
        let mut report = CompletionReport {
            requested: tasks.len(),
            ..CompletionReport::default()
        };
        tracing::info!(
            "Completion batch: {} node(s), {} worker(s)",
            tasks.len(),
            self.workers
        );

        if self.workers == 1 {
            self.run_sequential(store, optimizer.as_ref(), tasks, cancel, &mut report)
                .await;
        } else {
            self.run_pool(store, optimizer, tasks, cancel, &mut report)
                .await;
        }

        if report.applied > 0 {
            store.write().await.checkpoint();
        }
        tracing::info!(
            "Completion batch done: {} applied, {} failed, {} stale, {} skipped",
            report.applied,
            report.failed.len(),
            report.stale,
            report.skipped
        );
        Ok(report)
    }

    async fn run_sequential(
        &self,
        store: &RwLock<GraphStore>,
        optimizer: &dyn Optimizer,
        tasks: Vec<CompletionTask>,
        cancel: &CancelToken,
        report: &mut CompletionReport,
    ) {
        let total = tasks.len();
        for (index, task) in tasks.into_iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                report.skipped = total - index;
                break;
            }
            let result = optimizer.optimize(task.stage, &task.request).await;
            apply(store, (task, result), report).await;
        }
    }

    async fn run_pool(
        &self,
        store: &RwLock<GraphStore>,
        optimizer: Arc<dyn Optimizer>,
        tasks: Vec<CompletionTask>,
        cancel: &CancelToken,
        report: &mut CompletionReport,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let (tx, mut rx) = mpsc::unbounded_channel::<TaskResult>();
        let mut set = JoinSet::new();

        let total = tasks.len();
        for (index, task) in tasks.into_iter().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            while let Ok(result) = rx.try_recv() {
                apply(store, result, report).await;
            }
            if cancel.is_cancelled() {
                report.cancelled = true;
                report.skipped = total - index;
                break;
            }

            let optimizer = Arc::clone(&optimizer);
            let tx = tx.clone();
            set.spawn(async move {
                let result = optimizer.optimize(task.stage, &task.request).await;
                drop(permit);
                // The receiver outlives every worker.
                let _ = tx.send((task, result));
            });
        }
        drop(tx);

        while let Some(result) = rx.recv().await {
            apply(store, result, report).await;
        }
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Completion worker aborted: {}", e);
            }
        }
    }
}

/// Fold one result into the store and the report.
async fn apply(store: &RwLock<GraphStore>, (task, result): TaskResult, report: &mut CompletionReport) {
    match result {
        Ok(data) => {
            let outcome = store
                .write()
                .await
                .apply_enrichment(&task.node_id, task.version, &data);
            match outcome {
                EnrichmentOutcome::Applied => {
                    report.applied += 1;
                    tracing::info!("Node {} enriched ({})", task.node_id, task.stage);
                }
                EnrichmentOutcome::Stale => {
                    report.stale += 1;
                    tracing::debug!("Node {} changed during completion; result dropped", task.node_id);
                }
            }
        }
        Err(e) => {
            tracing::warn!("Completion failed for node {}: {}", task.node_id, e);
            report.failed.push(CompletionFailure {
                node_id: task.node_id,
                message: e.to_string(),
            });
        }
    }
}
