//! # Workflow Summary
//!
//! Read-only projection over a graph, computed when a workflow is saved.
//!
//! `FinalProduct` nodes are excluded: they restate the totals of their inputs
//! and would double count. Percentages are `0..=100`, rounded to 2 places.

use crate::graph::Graph;
use crate::primitives::{
    HOTSPOT_LIMIT, QUALITY_COMPLETENESS_WEIGHT, QUALITY_PRIMARY_WEIGHT, QUALITY_VERIFIED_WEIGHT,
    round2,
};
use crate::{CompletionStatus, Node, NodeId, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Emissions attributed to one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEmission {
    pub stage: Stage,
    pub emissions: f64,
    pub percentage: f64,
    pub nodes_count: usize,
}

/// A node contributing disproportionately to the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub id: NodeId,
    pub label: String,
    pub stage: Stage,
    pub carbon_footprint: f64,
    pub percentage: f64,
}

/// Derived metrics persisted alongside a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub total_carbon_footprint: f64,
    pub total_weight: f64,
    /// kgCO2e per kg of modelled weight.
    pub carbon_intensity: f64,
    pub node_count: usize,
    pub data_completeness: f64,
    pub primary_data_rate: f64,
    pub verified_data_rate: f64,
    /// Weighted blend: 40% completeness, 30% primary, 30% verified.
    pub overall_data_quality: f64,
    pub stage_emissions: Vec<StageEmission>,
    pub carbon_factor_sources: BTreeMap<String, usize>,
    pub hotspot_nodes: Vec<Hotspot>,
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        round2(part / whole * 100.0)
    } else {
        0.0
    }
}

fn is_complete(node: &Node) -> bool {
    node.attrs.completion_status == CompletionStatus::Completed
        || (node.attrs.carbon_footprint > 0.0 && node.attrs.weight > 0.0)
}

fn is_verified(node: &Node) -> bool {
    node.attrs.extra_str("verificationStatus") == Some("verified")
}

impl WorkflowSummary {
    /// Compute the summary of `graph`.
    #[must_use]
    pub fn from_graph(graph: &Graph) -> Self {
        let nodes: Vec<&Node> = graph
            .nodes()
            .filter(|n| !n.stage().is_final_product())
            .collect();
        let count = nodes.len();
        let total_footprint: f64 = nodes.iter().map(|n| n.attrs.carbon_footprint).sum();
        let total_weight: f64 = nodes.iter().map(|n| n.attrs.weight).sum();
        let share = |predicate: fn(&Node) -> bool| {
            let matched = nodes.iter().filter(|n| predicate(n)).count();
            percent(matched as f64, count as f64)
        };

        let mut by_stage: BTreeMap<Stage, (f64, usize)> = BTreeMap::new();
        let mut sources: BTreeMap<String, usize> = BTreeMap::new();
        for node in &nodes {
            let entry = by_stage.entry(node.stage()).or_default();
            entry.0 += node.attrs.carbon_footprint;
            entry.1 += 1;
            *sources
                .entry(node.attrs.data_source.label().to_string())
                .or_default() += 1;
        }
        let stage_emissions = by_stage
            .into_iter()
            .map(|(stage, (emissions, nodes_count))| StageEmission {
                stage,
                emissions: round2(emissions),
                percentage: percent(emissions, total_footprint),
                nodes_count,
            })
            .collect();

        let mut ranked: Vec<&Node> = nodes
            .iter()
            .copied()
            .filter(|n| n.attrs.carbon_footprint > 0.0)
            .collect();
        ranked.sort_by(|a, b| {
            b.attrs
                .carbon_footprint
                .total_cmp(&a.attrs.carbon_footprint)
                .then_with(|| a.id.cmp(&b.id))
        });
        let hotspot_nodes = ranked
            .into_iter()
            .take(HOTSPOT_LIMIT)
            .map(|n| Hotspot {
                id: n.id.clone(),
                label: n.label.clone(),
                stage: n.stage(),
                carbon_footprint: round2(n.attrs.carbon_footprint),
                percentage: percent(n.attrs.carbon_footprint, total_footprint),
            })
            .collect();

        let data_completeness = share(is_complete);
        let primary_data_rate = share(|n| n.attrs.data_source.is_primary());
        let verified_data_rate = share(is_verified);
        let carbon_intensity = if total_weight > 0.0 {
            round2(total_footprint / total_weight)
        } else {
            0.0
        };

        Self {
            total_carbon_footprint: round2(total_footprint),
            total_weight: round2(total_weight),
            carbon_intensity,
            node_count: count,
            data_completeness,
            primary_data_rate,
            verified_data_rate,
            overall_data_quality: round2(
                data_completeness * QUALITY_COMPLETENESS_WEIGHT
                    + primary_data_rate * QUALITY_PRIMARY_WEIGHT
                    + verified_data_rate * QUALITY_VERIFIED_WEIGHT,
            ),
            stage_emissions,
            carbon_factor_sources: sources,
            hotspot_nodes,
        }
    }
}
