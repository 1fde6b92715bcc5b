//! # Core Type Definitions
//!
//! This module contains all core types for the Carbonflow lifecycle graph:
//! - Node and edge identifiers (`NodeId`, `EdgeId`)
//! - Lifecycle vocabulary (`Stage`, `CompletionStatus`, `DataSource`)
//! - Node payload (`NodeAttributes`, `Position`, `Node`, `Edge`)
//! - Error types (`LcaError`)
//!
//! ## Serialization
//!
//! Node attributes serialize in the camelCase shape used by workflow records,
//! so a node's `data` object round-trips through the persistence API unchanged.
//! Numeric fields are read leniently: numbers, numeric strings and `null` are
//! all accepted, anything else reads as `0`.

use crate::primitives::round2;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// NODE & EDGE IDENTIFIERS
// =============================================================================

/// Unique identifier for a node, stable for the node's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a node id from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for an edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    /// Create an edge id from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The conventional id of the edge `source -> target`.
    #[must_use]
    pub fn between(source: &NodeId, target: &NodeId) -> Self {
        Self(format!("edge-{}-{}", source, target))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Monotonic counter of committed store states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(pub u64);

impl Revision {
    /// The revision following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

// =============================================================================
// LIFECYCLE STAGE
// =============================================================================

/// Lifecycle stage of a node.
///
/// Serialized as the display label used by workflow records (`原材料`, ...).
/// Parsing also accepts the snake_case keys used by optimizer routes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(from = "String", into = "String")]
pub enum Stage {
    RawMaterial,
    Manufacturing,
    Distribution,
    Usage,
    Disposal,
    FinalProduct,
    #[default]
    Unclassified,
}

impl Stage {
    /// The five stages a complete lifecycle model covers.
    pub const CANONICAL: [Stage; 5] = [
        Stage::RawMaterial,
        Stage::Manufacturing,
        Stage::Distribution,
        Stage::Usage,
        Stage::Disposal,
    ];

    /// Display label as stored in workflow records.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RawMaterial => "原材料",
            Self::Manufacturing => "生产制造",
            Self::Distribution => "分销和储存",
            Self::Usage => "产品使用",
            Self::Disposal => "废弃处置",
            Self::FinalProduct => "最终产品",
            Self::Unclassified => "未分类",
        }
    }

    /// Machine key, used for optimizer routes and CLI arguments.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::RawMaterial => "raw_material",
            Self::Manufacturing => "manufacturing",
            Self::Distribution => "distribution",
            Self::Usage => "usage",
            Self::Disposal => "disposal",
            Self::FinalProduct => "final_product",
            Self::Unclassified => "unclassified",
        }
    }

    /// Parse a label or key. Unknown text maps to `Unclassified`.
    #[must_use]
    pub fn from_label(text: &str) -> Self {
        let text = text.trim();
        Self::CANONICAL
            .into_iter()
            .chain([Self::FinalProduct])
            .find(|stage| stage.label() == text || stage.key().eq_ignore_ascii_case(text))
            .unwrap_or(Self::Unclassified)
    }

    /// Whether this is the synthetic aggregate stage.
    #[must_use]
    pub const fn is_final_product(self) -> bool {
        matches!(self, Self::FinalProduct)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Stage {
    fn from(s: String) -> Self {
        Self::from_label(&s)
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        stage.label().to_string()
    }
}

// =============================================================================
// COMPLETION STATUS
// =============================================================================

/// Whether a node's data is human-entered, AI-filled, or still missing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionStatus {
    #[serde(alias = "已完成")]
    Completed,
    #[serde(alias = "AI补充")]
    AiSupplemented,
    #[default]
    #[serde(alias = "待补充")]
    ManualRequired,
}

impl CompletionStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::AiSupplemented => "ai-supplemented",
            Self::ManualRequired => "manual-required",
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionStatus {
    type Err = LcaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "completed" | "已完成" => Ok(Self::Completed),
            "ai-supplemented" | "AI补充" => Ok(Self::AiSupplemented),
            "manual-required" | "待补充" => Ok(Self::ManualRequired),
            other => Err(LcaError::InvalidValue(format!(
                "unknown completion status '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// DATA SOURCE
// =============================================================================

/// Provenance of a node's numbers.
///
/// Open-ended: free text that is not one of the known tags is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataSource {
    #[default]
    Manual,
    TabularImport,
    AiGenerated,
    Aggregated,
    Measured,
    Other(String),
}

impl DataSource {
    /// Display label as stored in workflow records.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Manual => "手动输入",
            Self::TabularImport => "表格导入",
            Self::AiGenerated => "AI生成",
            Self::Aggregated => "累加计算",
            Self::Measured => "实测数据",
            Self::Other(text) => text,
        }
    }

    /// Parse a label or key, keeping unknown text as `Other`.
    #[must_use]
    pub fn from_label(text: &str) -> Self {
        match text.trim() {
            "" | "manual" | "手动输入" => Self::Manual,
            "tabular_import" | "tabular import" | "表格导入" | "文件导入" => {
                Self::TabularImport
            }
            "ai_generated" | "AI生成" | "AI补充" => Self::AiGenerated,
            "aggregated" | "累加计算" => Self::Aggregated,
            "measured" | "实测数据" => Self::Measured,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the numbers come from direct measurement (primary data).
    #[must_use]
    pub fn is_primary(&self) -> bool {
        match self {
            Self::Measured => true,
            Self::Other(text) => text.contains("实测") || text.contains("直接测量"),
            _ => false,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for DataSource {
    fn from(s: String) -> Self {
        Self::from_label(&s)
    }
}

impl From<DataSource> for String {
    fn from(source: DataSource) -> Self {
        source.label().to_string()
    }
}

// =============================================================================
// NODE
// =============================================================================

/// Canvas position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The data carried by a node.
///
/// `weight` is in kg, `carbon_factor` in kgCO2e/kg and `carbon_footprint` in
/// kgCO2e. The `init_*` fields hold the node's intrinsic baseline, restored
/// when the node loses its last inbound edge. Stage-specific attributes the
/// engine never interprets live in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeAttributes {
    #[serde(rename = "lifecycleStage")]
    pub stage: Stage,
    #[serde(deserialize_with = "lenient_number")]
    pub weight: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub carbon_factor: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub carbon_footprint: f64,
    pub data_source: DataSource,
    pub completion_status: CompletionStatus,
    #[serde(deserialize_with = "lenient_number")]
    pub uncertainty_score: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub init_weight: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub init_carbon_footprint: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub init_carbon_factor: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl NodeAttributes {
    /// Attributes for an unconnected node with measured weight and factor.
    ///
    /// The footprint is derived and the baseline captured.
    #[must_use]
    pub fn leaf(stage: Stage, weight: f64, carbon_factor: f64) -> Self {
        let mut attrs = Self {
            stage,
            weight,
            carbon_factor,
            carbon_footprint: round2(weight * carbon_factor),
            ..Self::default()
        };
        attrs.capture_baseline();
        attrs
    }

    /// Record the current numbers as the node's intrinsic baseline.
    pub fn capture_baseline(&mut self) {
        self.init_weight = self.weight;
        self.init_carbon_footprint = self.carbon_footprint;
        self.init_carbon_factor = self.carbon_factor;
    }

    /// Put the intrinsic baseline back into the live numbers.
    pub fn restore_baseline(&mut self) {
        self.weight = self.init_weight;
        self.carbon_footprint = self.init_carbon_footprint;
        self.carbon_factor = self.init_carbon_factor;
    }

    /// Text value of a pass-through attribute, if present.
    #[must_use]
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// A node in the lifecycle graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub position: Position,
    pub attrs: NodeAttributes,
    /// Bumped on every change to the node; used to detect stale enrichment.
    #[serde(default)]
    pub version: u64,
}

impl Node {
    /// Create a new node at version 0.
    #[must_use]
    pub fn new(
        id: NodeId,
        label: impl Into<String>,
        position: Position,
        attrs: NodeAttributes,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            position,
            attrs,
            version: 0,
        }
    }

    /// Mark the node as changed.
    pub fn touch(&mut self) {
        self.version = self.version.saturating_add(1);
    }

    /// Shorthand for the node's stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.attrs.stage
    }
}

// =============================================================================
// EDGE
// =============================================================================

/// A directed edge: the output of `source` flows into `target`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    /// Create an edge with the conventional id.
    #[must_use]
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: EdgeId::between(&source, &target),
            source,
            target,
        }
    }
}

// =============================================================================
// NUMERIC LENIENCY
// =============================================================================

/// Read a JSON value as a number: numbers and numeric strings pass, anything
/// else is `None`.
#[must_use]
pub fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value).unwrap_or(0.0))
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Carbonflow engine.
///
/// - Structural failures abort the whole command; the graph is left untouched
/// - Per-cell and per-node problems are reported, never raised
/// - The engine never panics; all errors are recoverable
#[derive(Debug, Error)]
pub enum LcaError {
    /// An edge between the same pair of nodes already exists.
    #[error("Edge already exists: {0} -> {1}")]
    DuplicateEdge(NodeId, NodeId),

    /// An edge from a node to itself was requested.
    #[error("Self loop rejected on node {0}")]
    SelfLoop(NodeId),

    /// The requested node was not found in the graph.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// The requested edge was not found in the graph.
    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeId),

    /// A command that needs target nodes was given none.
    #[error("No nodes selected")]
    EmptySelection,

    /// The tabular text has no header row.
    #[error("Table has no header row")]
    MissingHeader,

    /// The header lacks columns the import target requires.
    #[error("Missing required columns for {target}: {}", .missing.join(", "))]
    MissingRequiredColumns { target: String, missing: Vec<String> },

    /// Every data row was skipped.
    #[error("No valid rows in table")]
    NoValidRows,

    /// The import target name is not recognised.
    #[error("Unknown import target: {0}")]
    UnknownImportTarget(String),

    /// A drop was requested with nothing staged.
    #[error("No pending import")]
    NoPendingImport,

    /// Stage-column layout needs a final product to arrange around.
    #[error("No final product node to lay out around")]
    NoFinalProduct,

    /// A value could not be interpreted.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for LcaError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stage_accepts_labels_and_keys() {
        assert_eq!(Stage::from_label("生产制造"), Stage::Manufacturing);
        assert_eq!(Stage::from_label("distribution"), Stage::Distribution);
        assert_eq!(Stage::from_label("Final_Product"), Stage::FinalProduct);
        assert_eq!(Stage::from_label("whatever"), Stage::Unclassified);
    }

    #[test]
    fn stage_serializes_as_label() {
        let json = serde_json::to_string(&Stage::Usage).expect("serialize");
        assert_eq!(json, "\"产品使用\"");
    }

    #[test]
    fn completion_status_wire_names() {
        let json = serde_json::to_string(&CompletionStatus::AiSupplemented).expect("serialize");
        assert_eq!(json, "\"ai-supplemented\"");
        let parsed: CompletionStatus = serde_json::from_str("\"已完成\"").expect("parse");
        assert_eq!(parsed, CompletionStatus::Completed);
    }

    #[test]
    fn data_source_keeps_unknown_text() {
        let source = DataSource::from_label("供应商直接测量");
        assert_eq!(source, DataSource::Other("供应商直接测量".to_string()));
        assert!(source.is_primary());
        assert!(!DataSource::TabularImport.is_primary());
    }

    #[test]
    fn attributes_read_numeric_strings() {
        let attrs: NodeAttributes = serde_json::from_value(json!({
            "lifecycleStage": "原材料",
            "weight": "2.50",
            "carbonFactor": 4,
            "carbonFootprint": null,
            "material": "steel"
        }))
        .expect("parse");

        assert_eq!(attrs.stage, Stage::RawMaterial);
        assert!((attrs.weight - 2.5).abs() < f64::EPSILON);
        assert!((attrs.carbon_factor - 4.0).abs() < f64::EPSILON);
        assert!(attrs.carbon_footprint.abs() < f64::EPSILON);
        assert_eq!(attrs.extra_str("material"), Some("steel"));
    }

    #[test]
    fn leaf_captures_baseline() {
        let attrs = NodeAttributes::leaf(Stage::RawMaterial, 3.0, 1.5);
        assert!((attrs.carbon_footprint - 4.5).abs() < 1e-9);
        assert!((attrs.init_weight - 3.0).abs() < 1e-9);
        assert!((attrs.init_carbon_footprint - 4.5).abs() < 1e-9);
    }

    #[test]
    fn edge_id_convention() {
        let edge = Edge::new(NodeId::from("a"), NodeId::from("b"));
        assert_eq!(edge.id.as_str(), "edge-a-b");
    }
}
