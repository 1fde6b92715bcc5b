//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use crate::orchestrator::CompletionReport;
use carbonflow_core::{
    Edge, EdgeId, GraphStore, ImportPayload, ImportReport, ImportTarget, NodeAttributes, NodeId,
    Node, Position, Revision, Stage,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// GRAPH RESPONSE
// =============================================================================

/// The live graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphResponse {
    pub revision: Revision,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub pending_import: bool,
}

impl GraphResponse {
    #[must_use]
    pub fn from_store(store: &GraphStore) -> Self {
        let graph = store.graph();
        Self {
            revision: store.revision(),
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().cloned().collect(),
            can_undo: store.history().can_undo(),
            can_redo: store.history().can_redo(),
            pending_import: store.pending_import().is_some(),
        }
    }
}

// =============================================================================
// COMMAND REQUESTS
// =============================================================================

/// Add a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNodeRequest {
    pub label: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: NodeAttributes,
}

/// Add a template node for one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddStageNodeRequest {
    pub stage: Stage,
    /// Point the node fans out from.
    #[serde(default)]
    pub position: Position,
}

/// A canvas point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionRequest {
    #[serde(default)]
    pub position: Position,
}

/// Connect two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddEdgeRequest {
    pub source: NodeId,
    pub target: NodeId,
}

/// A set of node ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeIdsRequest {
    #[serde(default)]
    pub ids: Vec<NodeId>,
}

/// A set of edge ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeIdsRequest {
    #[serde(default)]
    pub ids: Vec<EdgeId>,
}

/// Tabular text to import, now or on a later drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub text: String,
    pub target: ImportTarget,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub position: Position,
}

impl ImportRequest {
    /// The payload part of the request.
    #[must_use]
    pub fn payload(&self) -> ImportPayload {
        let payload = ImportPayload::new(self.text.clone(), self.target);
        match &self.source_name {
            Some(name) if !name.trim().is_empty() => payload.with_source_name(name.clone()),
            _ => payload,
        }
    }
}

/// Drop the staged payload at a position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DropRequest {
    #[serde(default)]
    pub position: Position,
}

// =============================================================================
// COMMAND RESPONSE
// =============================================================================

/// Outcome of a graph command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub revision: Option<Revision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_ids: Vec<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<EdgeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed: Vec<NodeId>,
    pub error: Option<String>,
}

impl CommandResponse {
    /// A successful command that reached `revision`.
    #[must_use]
    pub fn success(revision: Revision) -> Self {
        Self {
            success: true,
            revision: Some(revision),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_node(mut self, id: NodeId) -> Self {
        self.node_id = Some(id);
        self
    }

    #[must_use]
    pub fn with_nodes(mut self, ids: Vec<NodeId>) -> Self {
        self.node_ids = ids;
        self
    }

    #[must_use]
    pub fn with_edge(mut self, id: EdgeId) -> Self {
        self.edge_id = Some(id);
        self
    }

    #[must_use]
    pub fn with_changed(mut self, ids: Vec<NodeId>) -> Self {
        self.changed = ids;
        self
    }

    /// Create an error response.
    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
            ..Self::default()
        }
    }
}

// =============================================================================
// IMPORT RESPONSE
// =============================================================================

/// Outcome of an import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResponse {
    pub success: bool,
    pub revision: Option<Revision>,
    pub report: Option<ImportReport>,
    pub error: Option<String>,
}

impl ImportResponse {
    #[must_use]
    pub fn success(revision: Revision, report: ImportReport) -> Self {
        Self {
            success: true,
            revision: Some(revision),
            report: Some(report),
            error: None,
        }
    }

    /// Staging accepted; nothing imported yet.
    #[must_use]
    pub fn staged(revision: Revision) -> Self {
        Self {
            success: true,
            revision: Some(revision),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
            ..Self::default()
        }
    }
}

// =============================================================================
// HISTORY RESPONSE
// =============================================================================

/// Outcome of undo/redo. `moved` is false at either end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub moved: bool,
    pub revision: Revision,
    pub can_undo: bool,
    pub can_redo: bool,
}

impl HistoryResponse {
    #[must_use]
    pub fn from_store(moved: bool, store: &GraphStore) -> Self {
        Self {
            moved,
            revision: store.revision(),
            can_undo: store.history().can_undo(),
            can_redo: store.history().can_redo(),
        }
    }
}

// =============================================================================
// COMPLETION RESPONSE
// =============================================================================

/// Outcome of an AI completion batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub success: bool,
    pub report: Option<CompletionReport>,
    pub error: Option<String>,
}

impl CompleteResponse {
    #[must_use]
    pub fn success(report: CompletionReport) -> Self {
        Self {
            success: true,
            report: Some(report),
            error: None,
        }
    }

    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            report: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// WORKFLOW RESPONSE
// =============================================================================

/// Outcome of loading a workflow record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowLoadResponse {
    pub success: bool,
    pub revision: Option<Revision>,
    pub node_count: usize,
    pub skipped_edges: usize,
    pub error: Option<String>,
}

impl WorkflowLoadResponse {
    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
            ..Self::default()
        }
    }
}
