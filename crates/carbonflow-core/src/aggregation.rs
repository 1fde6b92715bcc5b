//! # Aggregation Engine
//!
//! Keeps a node's derived totals consistent with its direct predecessors.
//!
//! A node `T` with sources `P` holds `weight = round2(Σ p.weight)`,
//! `carbonFootprint = round2(Σ p.carbonFootprint)` and, when the summed weight
//! is positive, `carbonFactor = round2(footprint / weight)`. With no sources
//! the node falls back to its intrinsic baseline.
//!
//! Aggregation never fails: unknown targets are ignored and every input
//! yields a well-defined result.

use crate::graph::Graph;
use crate::primitives::round2;
use crate::{CompletionStatus, DataSource, LcaError, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// PROPAGATION POLICY
// =============================================================================

/// How far a change travels downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationPolicy {
    /// Only nodes whose inbound edge set changed are recomputed.
    #[default]
    OneHop,
    /// Affected nodes and everything downstream, in topological order.
    Descendants,
}

impl fmt::Display for PropagationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneHop => f.write_str("one_hop"),
            Self::Descendants => f.write_str("descendants"),
        }
    }
}

impl FromStr for PropagationPolicy {
    type Err = LcaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "one_hop" | "one-hop" | "onehop" => Ok(Self::OneHop),
            "descendants" | "multi_hop" | "multi-hop" => Ok(Self::Descendants),
            other => Err(LcaError::InvalidValue(format!(
                "unknown propagation policy '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// SINGLE-NODE RECOMPUTATION
// =============================================================================

/// Sum of weight and footprint over the distinct predecessors of `target`.
fn source_totals(graph: &Graph, target: &NodeId) -> Option<(f64, f64)> {
    let sources = graph.predecessors(target);
    if sources.is_empty() {
        return None;
    }
    let totals = sources
        .iter()
        .filter_map(|id| graph.node(id))
        .fold((0.0, 0.0), |(weight, footprint), node| {
            (
                weight + node.attrs.weight,
                footprint + node.attrs.carbon_footprint,
            )
        });
    Some(totals)
}

/// Recompute `target` from its direct predecessors.
///
/// Returns `true` if any field changed.
pub fn recompute(graph: &mut Graph, target: &NodeId) -> bool {
    let Some(current) = graph.node(target) else {
        return false;
    };
    let mut next = current.attrs.clone();

    match source_totals(graph, target) {
        Some((weight, footprint)) => {
            next.weight = round2(weight);
            next.carbon_footprint = round2(footprint);
            if weight > 0.0 {
                next.carbon_factor = round2(footprint / weight);
            }
            next.data_source = DataSource::Aggregated;
        }
        None => next.restore_baseline(),
    }

    if next == current.attrs {
        return false;
    }
    if let Some(node) = graph.node_mut(target) {
        node.attrs = next;
        node.touch();
    }
    true
}

// =============================================================================
// MULTI-NODE RE-EVALUATION
// =============================================================================

/// Re-aggregate every node whose inbound edge set changed.
///
/// Under `Descendants` the downstream closure is re-evaluated too, sources
/// before targets; nodes left on a cycle are evaluated once each in id order.
/// Returns the ids of nodes that changed.
pub fn reaggregate(
    graph: &mut Graph,
    affected: &BTreeSet<NodeId>,
    policy: PropagationPolicy,
) -> Vec<NodeId> {
    let order = match policy {
        PropagationPolicy::OneHop => affected.iter().cloned().collect(),
        PropagationPolicy::Descendants => {
            let mut scope = graph.descendants(affected);
            scope.extend(affected.iter().cloned());
            topological_order(graph, &scope)
        }
    };

    order
        .into_iter()
        .filter(|id| recompute(graph, id))
        .collect()
}

/// Kahn ordering of `scope`, counting only edges inside the scope.
fn topological_order(graph: &Graph, scope: &BTreeSet<NodeId>) -> Vec<NodeId> {
    let mut in_degree: BTreeMap<&NodeId, usize> = scope.iter().map(|id| (id, 0)).collect();
    for edge in graph.edges() {
        if scope.contains(&edge.source)
            && let Some(degree) = in_degree.get_mut(&edge.target)
        {
            *degree += 1;
        }
    }

    let mut ready: BTreeSet<NodeId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| (*id).clone())
        .collect();
    let mut order = Vec::with_capacity(scope.len());
    let mut placed = BTreeSet::new();

    while let Some(current) = ready.pop_first() {
        for next in graph.successors(&current) {
            if let Some(degree) = in_degree.get_mut(&next) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 && !placed.contains(&next) {
                    ready.insert(next);
                }
            }
        }
        placed.insert(current.clone());
        order.push(current);
    }

    // Cycle members never reach in-degree zero.
    order.extend(scope.iter().filter(|id| !placed.contains(*id)).cloned());
    order
}

// =============================================================================
// ON-DEMAND CALCULATION
// =============================================================================

/// User-triggered footprint calculation over `targets`.
///
/// Nodes without inbound edges keep their intrinsic values. Connected nodes
/// are summed from their predecessors; `FinalProduct` nodes are then marked
/// `Completed`. Returns the ids of nodes that changed.
pub fn calculate_carbon_footprint(graph: &mut Graph, targets: &[NodeId]) -> Vec<NodeId> {
    let mut changed = Vec::new();
    for id in targets {
        if !graph.has_inbound(id) {
            continue;
        }
        let mut updated = recompute(graph, id);
        let finalize = graph.node(id).is_some_and(|n| {
            n.stage().is_final_product() && n.attrs.completion_status != CompletionStatus::Completed
        });
        if finalize && let Some(node) = graph.node_mut(id) {
            node.attrs.completion_status = CompletionStatus::Completed;
            node.touch();
            updated = true;
        }
        if updated {
            changed.push(id.clone());
        }
    }
    changed
}

// =============================================================================
// TESTS
// =============================================================================
