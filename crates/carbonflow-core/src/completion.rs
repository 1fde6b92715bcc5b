//! # Completion Planning
//!
//! Decides which nodes need AI enrichment and merges optimizer responses.
//!
//! The engine never talks to the optimizer itself. [`plan`] turns the graph
//! into one [`CompletionTask`] per incomplete node; the caller dispatches the
//! tasks and hands each response back to the store, which applies it with
//! [`merge`] unless the node changed since the task was planned.

use crate::graph::Graph;
use crate::primitives::{MAX_UNCERTAINTY, round2};
use crate::types::number_from_value;
use crate::{CompletionStatus, DataSource, LcaError, Node, NodeAttributes, NodeId, Stage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys in an optimizer response that never overwrite engine-owned state.
const PROTECTED_KEYS: &[&str] = &[
    "id",
    "stage",
    "lifecycleStage",
    "completionStatus",
    "initWeight",
    "initCarbonFootprint",
    "initCarbonFactor",
];

/// Keys merged into typed fields rather than `extra`.
const CORE_KEYS: &[&str] = &[
    "weight",
    "carbonFactor",
    "carbonFootprint",
    "uncertaintyScore",
    "uncertainty",
    "dataSource",
    "label",
];

/// One node's enrichment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionTask {
    pub node_id: NodeId,
    pub stage: Stage,
    /// Node version when the task was planned.
    pub version: u64,
    /// Full current attribute set, plus `label`.
    pub request: Value,
}

/// Whether a node is a candidate for AI completion.
#[must_use]
pub fn needs_completion(node: &Node) -> bool {
    if node.stage().is_final_product() {
        return false;
    }
    let attrs = &node.attrs;
    attrs.completion_status != CompletionStatus::Completed
        || attrs.weight <= 0.0
        || attrs.carbon_factor <= 0.0
        || attrs.carbon_footprint <= 0.0
}

/// Build the request body for a node.
pub fn request_for(node: &Node) -> Result<Value, LcaError> {
    let mut request = serde_json::to_value(&node.attrs)?;
    if let Value::Object(map) = &mut request {
        map.insert("label".to_string(), Value::from(node.label.clone()));
    }
    Ok(request)
}

/// One task per candidate node, in id order.
pub fn plan(graph: &Graph) -> Result<Vec<CompletionTask>, LcaError> {
    graph
        .nodes()
        .filter(|n| needs_completion(n))
        .map(|n| {
            Ok(CompletionTask {
                node_id: n.id.clone(),
                stage: n.stage(),
                version: n.version,
                request: request_for(n)?,
            })
        })
        .collect()
}

/// Merge an optimizer response into a node.
///
/// Numeric fields take numbers or numeric strings and otherwise keep their
/// previous value. A missing footprint is derived from weight and factor.
/// Unknown keys land in `extra`. The node ends up `AiSupplemented`.
pub fn merge(label: &mut String, attrs: &mut NodeAttributes, response: &Map<String, Value>) {
    let number = |key: &str| response.get(key).and_then(number_from_value);

    if let Some(w) = number("weight") {
        attrs.weight = w.max(0.0);
    }
    if let Some(f) = number("carbonFactor") {
        attrs.carbon_factor = f.max(0.0);
    }
    match number("carbonFootprint") {
        Some(fp) => attrs.carbon_footprint = fp.max(0.0),
        None if response.contains_key("weight") || response.contains_key("carbonFactor") => {
            attrs.carbon_footprint = round2(attrs.weight * attrs.carbon_factor);
        }
        None => {}
    }
    if let Some(u) = number("uncertaintyScore").or_else(|| number("uncertainty")) {
        attrs.uncertainty_score = u.clamp(0.0, MAX_UNCERTAINTY);
    }
    attrs.data_source = response
        .get("dataSource")
        .and_then(Value::as_str)
        .map_or(DataSource::AiGenerated, DataSource::from_label);
    if let Some(text) = response.get("label").and_then(Value::as_str)
        && !text.trim().is_empty()
    {
        *label = text.to_string();
    }

    for (key, value) in response {
        if CORE_KEYS.contains(&key.as_str()) || PROTECTED_KEYS.contains(&key.as_str()) {
            continue;
        }
        attrs.extra.insert(key.clone(), value.clone());
    }

    attrs.completion_status = CompletionStatus::AiSupplemented;
}
