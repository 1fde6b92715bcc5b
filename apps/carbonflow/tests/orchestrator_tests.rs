//! Integration tests for the AI completion orchestrator.
//!
//! The optimizer is replaced by in-process mocks; no network is involved.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use async_trait::async_trait;
use carbonflow::optimizer::{Optimizer, OptimizerError};
use carbonflow::orchestrator::{CancelToken, Orchestrator};
use carbonflow_core::{
    CompletionStatus, DataSource, GraphStore, NodeAttributes, NodeId, NodeUpdate, Position, Stage,
};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

// =============================================================================
// HELPERS
// =============================================================================

fn response() -> Map<String, Value> {
    json!({"weight": 2.0, "carbonFactor": 3.0, "uncertaintyScore": 20})
        .as_object()
        .cloned()
        .unwrap()
}

/// Store with `count` blank manual nodes of the given stage.
fn store_with_blanks(count: usize) -> (RwLock<GraphStore>, Vec<NodeId>) {
    let mut store = GraphStore::default();
    let ids = (0..count)
        .map(|i| {
            store.add_node(
                format!("blank-{i}"),
                Position::default(),
                NodeAttributes {
                    stage: Stage::Manufacturing,
                    ..NodeAttributes::default()
                },
            )
        })
        .collect();
    (RwLock::new(store), ids)
}

/// Counts calls and the peak number of calls in flight.
#[derive(Default)]
struct CountingOptimizer {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Optimizer for CountingOptimizer {
    async fn optimize(
        &self,
        _stage: Stage,
        _attributes: &Value,
    ) -> Result<Map<String, Value>, OptimizerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(response())
    }
}

/// Fails for nodes labelled "bad".
struct PickyOptimizer;

#[async_trait]
impl Optimizer for PickyOptimizer {
    async fn optimize(
        &self,
        _stage: Stage,
        attributes: &Value,
    ) -> Result<Map<String, Value>, OptimizerError> {
        if attributes["label"] == json!("bad") {
            return Err(OptimizerError::ServerError(500, "model crashed".to_string()));
        }
        Ok(response())
    }
}

/// Cancels the batch from inside the first call.
struct CancellingOptimizer {
    cancel: CancelToken,
}

#[async_trait]
impl Optimizer for CancellingOptimizer {
    async fn optimize(
        &self,
        _stage: Stage,
        _attributes: &Value,
    ) -> Result<Map<String, Value>, OptimizerError> {
        self.cancel.cancel();
        Ok(response())
    }
}

/// Edits the node it is asked about while the request is in flight.
struct EditingOptimizer {
    store: Arc<RwLock<GraphStore>>,
}

#[async_trait]
impl Optimizer for EditingOptimizer {
    async fn optimize(
        &self,
        _stage: Stage,
        attributes: &Value,
    ) -> Result<Map<String, Value>, OptimizerError> {
        let label = attributes["label"].as_str().unwrap_or_default().to_string();
        let id = {
            let store = self.store.read().await;
            store
                .graph()
                .nodes()
                .find(|n| n.label == label)
                .map(|n| n.id.clone())
                .unwrap()
        };
        let update = NodeUpdate {
            weight: Some(9.0),
            ..NodeUpdate::default()
        };
        self.store.write().await.update_node_data(&id, update).unwrap();
        Ok(response())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn sequential_batch_enriches_every_blank() {
    let (store, ids) = store_with_blanks(3);
    let optimizer = Arc::new(CountingOptimizer::default());

    let report = Orchestrator::new(1)
        .run(&store, optimizer.clone(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(report.requested, 3);
    assert_eq!(report.applied, 3);
    assert!(report.failed.is_empty());
    assert_eq!(optimizer.peak.load(Ordering::SeqCst), 1);

    let store = store.read().await;
    for id in &ids {
        let node = store.graph().node(id).unwrap();
        assert_eq!(node.attrs.completion_status, CompletionStatus::AiSupplemented);
        assert_eq!(node.attrs.data_source, DataSource::AiGenerated);
        assert!((node.attrs.carbon_footprint - 6.0).abs() < 1e-9);
    }
}

#[tokio::test]
async fn pool_never_exceeds_worker_count() {
    let (store, _) = store_with_blanks(8);
    let optimizer = Arc::new(CountingOptimizer::default());

    let report = Orchestrator::new(3)
        .run(&store, optimizer.clone(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(report.applied, 8);
    assert_eq!(optimizer.calls.load(Ordering::SeqCst), 8);
    assert!(optimizer.peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn batch_is_one_history_entry() {
    let (store, _) = store_with_blanks(4);
    let before = store.read().await.history().len();

    Orchestrator::new(2)
        .run(&store, Arc::new(CountingOptimizer::default()), &CancelToken::new())
        .await
        .unwrap();

    let mut store = store.write().await;
    assert_eq!(store.history().len(), before + 1);
    // One undo reverts the whole batch.
    assert!(store.undo());
    assert!(
        store
            .graph()
            .nodes()
            .all(|n| n.attrs.completion_status == CompletionStatus::ManualRequired)
    );
}

#[tokio::test]
async fn failures_are_reported_not_fatal() {
    let mut inner = GraphStore::default();
    let good = inner.add_node("good", Position::default(), NodeAttributes::default());
    let bad = inner.add_node("bad", Position::default(), NodeAttributes::default());
    let store = RwLock::new(inner);

    let report = Orchestrator::new(1)
        .run(&store, Arc::new(PickyOptimizer), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].node_id, bad);

    let store = store.read().await;
    assert_eq!(
        store.graph().node(&good).unwrap().attrs.completion_status,
        CompletionStatus::AiSupplemented
    );
    assert_eq!(
        store.graph().node(&bad).unwrap().attrs.completion_status,
        CompletionStatus::ManualRequired
    );
}

#[tokio::test]
async fn cancel_stops_dispatch() {
    let (store, _) = store_with_blanks(3);
    let cancel = CancelToken::new();
    let optimizer = Arc::new(CancellingOptimizer {
        cancel: cancel.clone(),
    });

    let report = Orchestrator::new(1)
        .run(&store, optimizer, &cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped, 2);
}

#[tokio::test]
async fn pool_cancelled_mid_batch_keeps_one_history_entry() {
    let (store, _) = store_with_blanks(5);
    let before = store.read().await.history().len();
    let cancel = CancelToken::new();
    let optimizer = Arc::new(CancellingOptimizer {
        cancel: cancel.clone(),
    });

    let report = Orchestrator::new(2)
        .run(&store, optimizer, &cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(report.applied >= 1);
    assert!(report.skipped >= 1);
    assert_eq!(report.applied + report.skipped, report.requested);

    let mut store = store.write().await;
    assert_eq!(store.history().len(), before + 1);
    assert!(store.undo());
    assert!(
        store
            .graph()
            .nodes()
            .all(|n| n.attrs.completion_status == CompletionStatus::ManualRequired)
    );
}

#[tokio::test]
async fn edited_node_result_is_stale() {
    let (store, ids) = store_with_blanks(1);
    let store = Arc::new(store);
    let optimizer = Arc::new(EditingOptimizer {
        store: Arc::clone(&store),
    });

    let report = Orchestrator::new(1)
        .run(&store, optimizer, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(report.stale, 1);
    assert_eq!(report.applied, 0);
    let store = store.read().await;
    let node = store.graph().node(&ids[0]).unwrap();
    assert!((node.attrs.weight - 9.0).abs() < 1e-9);
    assert_eq!(node.attrs.completion_status, CompletionStatus::ManualRequired);
}

#[tokio::test]
async fn nothing_to_do_records_nothing() {
    let mut inner = GraphStore::default();
    inner.add_node(
        "done",
        Position::default(),
        NodeAttributes {
            stage: Stage::RawMaterial,
            weight: 1.0,
            carbon_factor: 2.0,
            completion_status: CompletionStatus::Completed,
            ..NodeAttributes::default()
        },
    );
    let store = RwLock::new(inner);
    let before = store.read().await.history().len();

    let report = Orchestrator::new(4)
        .run(&store, Arc::new(CountingOptimizer::default()), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(report.requested, 0);
    assert_eq!(store.read().await.history().len(), before);
}
