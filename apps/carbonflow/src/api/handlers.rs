//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        AddEdgeRequest, AddNodeRequest, AddStageNodeRequest, CommandResponse, CompleteResponse,
        DropRequest, EdgeIdsRequest, GraphResponse, HealthResponse, HistoryResponse,
        ImportRequest, ImportResponse, NodeIdsRequest, PositionRequest, WorkflowLoadResponse,
    },
};
use crate::log_import_report;
use crate::optimizer::Optimizer;
use crate::orchestrator::{CancelToken, CompletionReport};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use carbonflow_core::{
    Graph, LcaError, NodeId, NodeUpdate, SaveWorkflowRequest, Stage, WorkflowRecord,
};
use std::sync::Arc;

/// HTTP status for an engine error.
fn status_for(error: &LcaError) -> StatusCode {
    match error {
        LcaError::NodeNotFound(_) | LcaError::EdgeNotFound(_) => StatusCode::NOT_FOUND,
        LcaError::DuplicateEdge(_, _) | LcaError::NoPendingImport => StatusCode::CONFLICT,
        LcaError::Serialization(_) | LcaError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

// =============================================================================
// HEALTH & READ HANDLERS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// The live graph.
pub async fn graph_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.read().await;
    (StatusCode::OK, Json(GraphResponse::from_store(&store)))
}

/// The latest credibility report.
pub async fn credibility_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.read().await;
    (StatusCode::OK, Json(store.credibility().clone()))
}

/// Save-time summary metrics.
pub async fn summary_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.read().await;
    (StatusCode::OK, Json(store.summary()))
}

// =============================================================================
// NODE HANDLERS
// =============================================================================

/// Add a node.
pub async fn add_node_handler(
    State(state): State<AppState>,
    Json(request): Json<AddNodeRequest>,
) -> impl IntoResponse {
    let mut store = state.store.write().await;
    let id = store.add_node(request.label, request.position, request.data);
    (
        StatusCode::CREATED,
        Json(CommandResponse::success(store.revision()).with_node(id)),
    )
}

/// Merge a partial update into a node.
pub async fn update_node_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<NodeUpdate>,
) -> impl IntoResponse {
    let mut store = state.store.write().await;
    match store.update_node_data(&NodeId::new(id), update) {
        Ok(revision) => (StatusCode::OK, Json(CommandResponse::success(revision))),
        Err(e) => (status_for(&e), Json(CommandResponse::error(e.to_string()))),
    }
}

/// Delete nodes and their edges.
pub async fn delete_nodes_handler(
    State(state): State<AppState>,
    Json(request): Json<NodeIdsRequest>,
) -> impl IntoResponse {
    let mut store = state.store.write().await;
    match store.delete_nodes(&request.ids) {
        Ok(revision) => (StatusCode::OK, Json(CommandResponse::success(revision))),
        Err(e) => (status_for(&e), Json(CommandResponse::error(e.to_string()))),
    }
}

// =============================================================================
// CANVAS HANDLERS
// =============================================================================

/// Add a template node for one stage.
pub async fn add_stage_node_handler(
    State(state): State<AppState>,
    Json(request): Json<AddStageNodeRequest>,
) -> impl IntoResponse {
    if request.stage == Stage::Unclassified {
        return (
            StatusCode::BAD_REQUEST,
            Json(CommandResponse::error("Unknown lifecycle stage")),
        );
    }
    let mut store = state.store.write().await;
    let id = store.add_stage_node(request.stage, request.position);
    (
        StatusCode::CREATED,
        Json(CommandResponse::success(store.revision()).with_node(id)),
    )
}

/// Add template nodes for every stage after raw material.
pub async fn add_all_stages_handler(
    State(state): State<AppState>,
    Json(request): Json<PositionRequest>,
) -> impl IntoResponse {
    let mut store = state.store.write().await;
    let ids = store.add_all_stages(request.position);
    (
        StatusCode::CREATED,
        Json(CommandResponse::success(store.revision()).with_nodes(ids)),
    )
}

/// Copy a node without its edges.
pub async fn duplicate_node_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut store = state.store.write().await;
    match store.duplicate_node(&NodeId::new(id)) {
        Ok(copy) => (
            StatusCode::CREATED,
            Json(CommandResponse::success(store.revision()).with_node(copy)),
        ),
        Err(e) => (status_for(&e), Json(CommandResponse::error(e.to_string()))),
    }
}

/// Arrange nodes in lifecycle-order columns.
pub async fn auto_layout_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut store = state.store.write().await;
    match store.auto_layout() {
        Ok(revision) => (StatusCode::OK, Json(CommandResponse::success(revision))),
        Err(e) => (status_for(&e), Json(CommandResponse::error(e.to_string()))),
    }
}

// =============================================================================
// EDGE HANDLERS
// =============================================================================

/// Connect two nodes.
pub async fn add_edge_handler(
    State(state): State<AppState>,
    Json(request): Json<AddEdgeRequest>,
) -> impl IntoResponse {
    let mut store = state.store.write().await;
    match store.add_edge(&request.source, &request.target) {
        Ok(id) => (
            StatusCode::CREATED,
            Json(CommandResponse::success(store.revision()).with_edge(id)),
        ),
        Err(e) => (status_for(&e), Json(CommandResponse::error(e.to_string()))),
    }
}

/// Remove edges.
pub async fn remove_edges_handler(
    State(state): State<AppState>,
    Json(request): Json<EdgeIdsRequest>,
) -> impl IntoResponse {
    let mut store = state.store.write().await;
    match store.remove_edges(&request.ids) {
        Ok(revision) => (StatusCode::OK, Json(CommandResponse::success(revision))),
        Err(e) => (status_for(&e), Json(CommandResponse::error(e.to_string()))),
    }
}

// =============================================================================
// CALCULATION HANDLER
// =============================================================================

/// Footprint calculation over the given ids, or the selection when empty.
pub async fn calculate_handler(
    State(state): State<AppState>,
    Json(request): Json<NodeIdsRequest>,
) -> impl IntoResponse {
    let mut store = state.store.write().await;
    let result = if request.ids.is_empty() {
        store.calculate_selection()
    } else {
        store.calculate_carbon_footprint(&request.ids)
    };
    match result {
        Ok(changed) => (
            StatusCode::OK,
            Json(CommandResponse::success(store.revision()).with_changed(changed)),
        ),
        Err(e) => (status_for(&e), Json(CommandResponse::error(e.to_string()))),
    }
}

// =============================================================================
// IMPORT HANDLERS
// =============================================================================

/// Import tabular text at a position.
pub async fn import_handler(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> impl IntoResponse {
    let mut store = state.store.write().await;
    match store.import_table(&request.payload(), request.position) {
        Ok(report) => {
            log_import_report(&report);
            (
                StatusCode::OK,
                Json(ImportResponse::success(store.revision(), report)),
            )
        }
        Err(e) => {
            tracing::warn!("Import rejected: {}", e);
            (status_for(&e), Json(ImportResponse::error(e.to_string())))
        }
    }
}

/// Hold tabular text until it is dropped.
pub async fn stage_import_handler(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> impl IntoResponse {
    let mut store = state.store.write().await;
    store.stage_import(request.payload());
    (StatusCode::ACCEPTED, Json(ImportResponse::staged(store.revision())))
}

/// Import the staged payload at the drop point.
pub async fn drop_import_handler(
    State(state): State<AppState>,
    Json(request): Json<DropRequest>,
) -> impl IntoResponse {
    let mut store = state.store.write().await;
    match store.drop_import(request.position) {
        Ok(report) => {
            log_import_report(&report);
            (
                StatusCode::OK,
                Json(ImportResponse::success(store.revision(), report)),
            )
        }
        Err(e) => (status_for(&e), Json(ImportResponse::error(e.to_string()))),
    }
}

// =============================================================================
// HISTORY HANDLERS
// =============================================================================

/// Step back one action.
pub async fn undo_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut store = state.store.write().await;
    let moved = store.undo();
    (StatusCode::OK, Json(HistoryResponse::from_store(moved, &store)))
}

/// Step forward one action.
pub async fn redo_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut store = state.store.write().await;
    let moved = store.redo();
    (StatusCode::OK, Json(HistoryResponse::from_store(moved, &store)))
}

// =============================================================================
// COMPLETION HANDLERS
// =============================================================================

/// Run an AI completion batch to the end.
///
/// The batch runs in its own task, so a client that disconnects early does
/// not cut it short: results already applied still get their history entry
/// and the running slot is always released.
pub async fn complete_handler(State(state): State<AppState>) -> impl IntoResponse {
    let Some(optimizer) = state.optimizer.clone() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(CompleteResponse::error("No optimizer configured")),
        );
    };

    let cancel = CancelToken::new();
    {
        let mut running = state.running.lock().await;
        if running.is_some() {
            return (
                StatusCode::CONFLICT,
                Json(CompleteResponse::error("A completion batch is already running")),
            );
        }
        *running = Some(cancel.clone());
    }

    let batch = tokio::spawn(run_batch(state, optimizer, cancel));
    match batch.await {
        Ok(Ok(report)) => (StatusCode::OK, Json(CompleteResponse::success(report))),
        Ok(Err(e)) => (status_for(&e), Json(CompleteResponse::error(e.to_string()))),
        Err(e) => {
            tracing::error!("Completion batch aborted: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CompleteResponse::error("Completion batch aborted")),
            )
        }
    }
}

/// One batch from start to release of the running slot.
async fn run_batch(
    state: AppState,
    optimizer: Arc<dyn Optimizer>,
    cancel: CancelToken,
) -> Result<CompletionReport, LcaError> {
    let result = state.orchestrator.run(&state.store, optimizer, &cancel).await;
    *state.running.lock().await = None;
    result
}

/// Stop dispatching the running batch.
pub async fn cancel_complete_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.running.lock().await.as_ref() {
        Some(token) => {
            token.cancel();
            (StatusCode::ACCEPTED, Json(CompleteResponse::default()))
        }
        None => (
            StatusCode::CONFLICT,
            Json(CompleteResponse::error("No completion batch is running")),
        ),
    }
}

// =============================================================================
// WORKFLOW HANDLERS
// =============================================================================

/// The graph as a save request: records plus summary.
pub async fn get_workflow_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.read().await;
    let name = state.workflow_name.read().await.clone();
    match SaveWorkflowRequest::for_graph(store.graph(), name) {
        Ok(request) => (StatusCode::OK, Json(Some(request))),
        Err(e) => {
            tracing::error!("Workflow export failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(None))
        }
    }
}

/// Replace the graph with a loaded workflow and start a fresh history.
pub async fn put_workflow_handler(
    State(state): State<AppState>,
    Json(record): Json<WorkflowRecord>,
) -> impl IntoResponse {
    let name = record.name.clone();
    let (graph, skipped_edges) = match Graph::from_records(record) {
        Ok(loaded) => loaded,
        Err(e) => {
            return (
                status_for(&e),
                Json(WorkflowLoadResponse::error(e.to_string())),
            );
        }
    };
    if skipped_edges > 0 {
        tracing::warn!("Workflow '{}': skipped {} invalid edge(s)", name, skipped_edges);
    }

    let node_count = graph.node_count();
    let revision = state.store.write().await.replace_graph(graph);
    *state.workflow_name.write().await = name;
    (
        StatusCode::OK,
        Json(WorkflowLoadResponse {
            success: true,
            revision: Some(revision),
            node_count,
            skipped_edges,
            error: None,
        }),
    )
}
