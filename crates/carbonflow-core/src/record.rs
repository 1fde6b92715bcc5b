//! # Persistence Records
//!
//! Flat node/edge records in the shape the workflow persistence API stores.
//!
//! The engine never persists anything itself. Callers turn the live graph into
//! a [`WorkflowRecord`] with [`Graph::to_records`], attach a
//! [`WorkflowSummary`] when saving, and rebuild a graph with
//! [`Graph::from_records`] after loading.

use crate::graph::Graph;
use crate::summary::WorkflowSummary;
use crate::{Edge, EdgeId, LcaError, Node, NodeAttributes, NodeId, Position};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node type tag used by the canvas for lifecycle nodes.
pub const LIFECYCLE_NODE_TYPE: &str = "lifecycle";

/// One persisted node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: NodeId,
    #[serde(default = "default_node_type")]
    pub node_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub position_x: f64,
    #[serde(default)]
    pub position_y: f64,
    /// Node attributes in their camelCase wire form.
    #[serde(default)]
    pub data: Value,
}

fn default_node_type() -> String {
    LIFECYCLE_NODE_TYPE.to_string()
}

/// One persisted edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub edge_id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

/// A workflow as loaded from or sent to the persistence API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

/// Save request: the workflow plus derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveWorkflowRequest {
    #[serde(flatten)]
    pub workflow: WorkflowRecord,
    pub total_carbon_footprint: f64,
    pub summary: WorkflowSummary,
}

impl SaveWorkflowRequest {
    /// Build a save request for `graph` under `name`.
    pub fn for_graph(graph: &Graph, name: impl Into<String>) -> Result<Self, LcaError> {
        let summary = WorkflowSummary::from_graph(graph);
        Ok(Self {
            workflow: graph.to_records(name)?,
            total_carbon_footprint: summary.total_carbon_footprint,
            summary,
        })
    }
}

impl NodeRecord {
    fn from_node(node: &Node) -> Result<Self, LcaError> {
        Ok(Self {
            node_id: node.id.clone(),
            node_type: default_node_type(),
            label: node.label.clone(),
            position_x: node.position.x,
            position_y: node.position.y,
            data: serde_json::to_value(&node.attrs)?,
        })
    }

    fn into_node(self) -> Result<Node, LcaError> {
        let label = if self.label.is_empty() {
            self.data
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        } else {
            self.label
        };
        let mut data = self.data;
        if let Value::Object(map) = &mut data {
            map.remove("label");
        }
        let attrs: NodeAttributes = if data.is_null() {
            NodeAttributes::default()
        } else {
            serde_json::from_value(data)?
        };
        Ok(Node::new(
            self.node_id,
            label,
            Position::new(self.position_x, self.position_y),
            attrs,
        ))
    }
}

impl Graph {
    /// Flatten the graph into a workflow record.
    pub fn to_records(&self, name: impl Into<String>) -> Result<WorkflowRecord, LcaError> {
        let nodes = self
            .nodes()
            .map(NodeRecord::from_node)
            .collect::<Result<Vec<_>, _>>()?;
        let edges = self
            .edges()
            .map(|e| EdgeRecord {
                edge_id: e.id.clone(),
                source: e.source.clone(),
                target: e.target.clone(),
            })
            .collect();
        Ok(WorkflowRecord {
            name: name.into(),
            nodes,
            edges,
            ..WorkflowRecord::default()
        })
    }

    /// Rebuild a graph from a workflow record.
    ///
    /// Edges with unknown endpoints, self loops or a repeated
    /// `(source, target)` pair are skipped; the number skipped is returned.
    pub fn from_records(record: WorkflowRecord) -> Result<(Self, usize), LcaError> {
        let mut graph = Self::new();
        for node in record.nodes {
            graph.insert_node(node.into_node()?);
        }
        let mut skipped = 0;
        for edge in record.edges {
            let edge = Edge {
                id: edge.edge_id,
                source: edge.source,
                target: edge.target,
            };
            if graph.insert_edge(edge).is_err() {
                skipped += 1;
            }
        }
        Ok((graph, skipped))
    }
}
