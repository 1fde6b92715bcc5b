//! # Carbonflow HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /graph` - Live nodes, edges and history flags
//! - `POST /nodes` - Add a node
//! - `PATCH /nodes/{id}` - Merge a partial update into a node
//! - `POST /nodes/delete` - Delete nodes
//! - `POST /nodes/stage` / `POST /nodes/stages` - Add stage template nodes
//! - `POST /nodes/{id}/duplicate` - Copy a node
//! - `POST /layout` - Arrange nodes in lifecycle-order columns
//! - `POST /edges` - Connect two nodes
//! - `POST /edges/delete` - Remove edges
//! - `POST /calculate` - Footprint calculation for ids (or the selection)
//! - `POST /import` - Import tabular text at a position
//! - `POST /import/stage` / `POST /import/drop` - Two-step drag-and-drop import
//! - `POST /undo` / `POST /redo` - History navigation
//! - `GET /credibility` - Latest credibility report
//! - `GET /summary` - Save-time summary metrics
//! - `POST /complete` / `POST /complete/cancel` - AI completion batch
//! - `GET /workflow` / `PUT /workflow` - Save-format export and load
//!
//! ## Configuration (Environment Variables)
//!
//! - `CARBONFLOW_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)

mod handlers;
mod types;

// Re-export handlers and types for integration tests (via `carbonflow::api::*`)
#[allow(unused_imports)]
pub use handlers::{
    add_all_stages_handler, add_edge_handler, add_node_handler, add_stage_node_handler,
    auto_layout_handler, calculate_handler, cancel_complete_handler, complete_handler,
    credibility_handler, delete_nodes_handler, drop_import_handler, duplicate_node_handler,
    get_workflow_handler, graph_handler, health_handler, import_handler, put_workflow_handler,
    redo_handler, remove_edges_handler, stage_import_handler, summary_handler, undo_handler,
    update_node_handler,
};
#[allow(unused_imports)]
pub use types::{
    AddEdgeRequest, AddNodeRequest, AddStageNodeRequest, CommandResponse, CompleteResponse,
    DropRequest, EdgeIdsRequest, GraphResponse, HealthResponse, HistoryResponse, ImportRequest,
    ImportResponse, NodeIdsRequest, PositionRequest, WorkflowLoadResponse,
};

use crate::error::AppError;
use crate::optimizer::Optimizer;
use crate::orchestrator::{CancelToken, Orchestrator};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, patch, post},
};
use carbonflow_core::GraphStore;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PATCH,
    Method::PUT,
    Method::OPTIONS,
];

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the graph store.
#[derive(Clone)]
pub struct AppState {
    /// The live graph with its history.
    pub store: Arc<RwLock<GraphStore>>,
    /// Absent when no optimizer is configured; `/complete` then answers 503.
    pub optimizer: Option<Arc<dyn Optimizer>>,
    pub orchestrator: Orchestrator,
    /// Name written into exported workflow records.
    pub workflow_name: Arc<RwLock<String>>,
    /// Cancel token of the batch in progress, if any.
    pub running: Arc<Mutex<Option<CancelToken>>>,
}

impl AppState {
    /// Create new app state around a store.
    #[must_use]
    pub fn new(store: GraphStore) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            optimizer: None,
            orchestrator: Orchestrator::default(),
            workflow_name: Arc::new(RwLock::new(String::new())),
            running: Arc::new(Mutex::new(None)),
        }
    }

    /// Enable AI completion.
    #[must_use]
    pub fn with_optimizer(mut self, optimizer: Arc<dyn Optimizer>, workers: usize) -> Self {
        self.optimizer = Some(optimizer);
        self.orchestrator = Orchestrator::new(workers);
        self
    }

    #[must_use]
    pub fn with_workflow_name(self, name: impl Into<String>) -> Self {
        Self {
            workflow_name: Arc::new(RwLock::new(name.into())),
            ..self
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `CARBONFLOW_CORS_ORIGINS`:
/// - If "*": allows all origins
/// - If not set: defaults to localhost only
/// - Otherwise: parses comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("CARBONFLOW_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (CARBONFLOW_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in CARBONFLOW_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(CORS_METHODS)
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No CARBONFLOW_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = ["localhost", "127.0.0.1"]
        .iter()
        .flat_map(|host| [3000, 8080].map(|port| format!("http://{host}:{port}")))
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();
    if state.optimizer.is_none() {
        tracing::info!("No optimizer configured; /complete is disabled");
    }

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/graph", get(handlers::graph_handler))
        .route("/nodes", post(handlers::add_node_handler))
        .route("/nodes/{id}", patch(handlers::update_node_handler))
        .route("/nodes/delete", post(handlers::delete_nodes_handler))
        .route("/nodes/stage", post(handlers::add_stage_node_handler))
        .route("/nodes/stages", post(handlers::add_all_stages_handler))
        .route(
            "/nodes/{id}/duplicate",
            post(handlers::duplicate_node_handler),
        )
        .route("/layout", post(handlers::auto_layout_handler))
        .route("/edges", post(handlers::add_edge_handler))
        .route("/edges/delete", post(handlers::remove_edges_handler))
        .route("/calculate", post(handlers::calculate_handler))
        .route("/import", post(handlers::import_handler))
        .route("/import/stage", post(handlers::stage_import_handler))
        .route("/import/drop", post(handlers::drop_import_handler))
        .route("/undo", post(handlers::undo_handler))
        .route("/redo", post(handlers::redo_handler))
        .route("/credibility", get(handlers::credibility_handler))
        .route("/summary", get(handlers::summary_handler))
        .route("/complete", post(handlers::complete_handler))
        .route("/complete/cancel", post(handlers::cancel_complete_handler))
        .route(
            "/workflow",
            get(handlers::get_workflow_handler).put(handlers::put_workflow_handler),
        )
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), AppError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Carbonflow HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| AppError::Io(format!("Server error: {}", e)))
}
