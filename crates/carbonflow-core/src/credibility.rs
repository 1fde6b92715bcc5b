//! # Credibility Module
//!
//! Aggregate trust score over the current node set.
//!
//! - Completed nodes count fully
//! - AI-supplemented nodes count by their certainty, `1 - uncertainty/100`
//! - Manual-required nodes count zero
//!
//! The score is `(completed + Σ certainty) / total`, in `[0, 1]`, and `0` for
//! an empty graph. Assessment is a pure function of the node set.

use crate::primitives::{MAX_UNCERTAINTY, UNCERTAIN_AI_THRESHOLD, round2};
use crate::{CompletionStatus, Node, NodeId, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A node reference for follow-up lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: NodeId,
    pub label: String,
}

impl From<&Node> for NodeRef {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            label: node.label.clone(),
        }
    }
}

/// The node whose data is both uncertain and high-impact.
///
/// Only AI-supplemented nodes carry an uncertainty, so only they can be
/// chosen; completed and manual nodes always score 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizableNode {
    pub id: NodeId,
    pub label: String,
    /// `uncertainty/100 * carbonFootprint`.
    pub score: f64,
    /// Human-readable reason. The completeness figure is the node's
    /// certainty (`100 - uncertainty`), not a field-fill ratio.
    pub reason: String,
}

/// Result of a credibility assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredibilityReport {
    pub credibility_score: f64,
    pub completed: usize,
    pub ai_supplemented: usize,
    pub manual_required: usize,
    pub missing_stages: Vec<Stage>,
    pub optimizable_node: Option<OptimizableNode>,
    pub manual_required_nodes: Vec<NodeRef>,
    pub uncertain_ai_nodes: Vec<NodeRef>,
}

/// Uncertainty of a node in `[0, 100]`; only AI-supplemented data carries any.
fn uncertainty(node: &Node) -> f64 {
    if node.attrs.completion_status == CompletionStatus::AiSupplemented {
        node.attrs.uncertainty_score.clamp(0.0, MAX_UNCERTAINTY)
    } else {
        0.0
    }
}

/// Assess a node set.
pub fn assess<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> CredibilityReport {
    let mut report = CredibilityReport::default();
    let mut certainty_sum = 0.0;
    let mut present = BTreeSet::new();

    for node in nodes {
        present.insert(node.stage());
        match node.attrs.completion_status {
            CompletionStatus::Completed => report.completed += 1,
            CompletionStatus::AiSupplemented => {
                report.ai_supplemented += 1;
                let u = uncertainty(node);
                certainty_sum += 1.0 - u / MAX_UNCERTAINTY;
                if u > UNCERTAIN_AI_THRESHOLD {
                    report.uncertain_ai_nodes.push(NodeRef::from(node));
                }
            }
            CompletionStatus::ManualRequired => {
                report.manual_required += 1;
                report.manual_required_nodes.push(NodeRef::from(node));
            }
        }

        let score = uncertainty(node) / MAX_UNCERTAINTY * node.attrs.carbon_footprint;
        let better = report
            .optimizable_node
            .as_ref()
            .is_none_or(|best| score > best.score);
        if score > 0.0 && better {
            report.optimizable_node = Some(OptimizableNode {
                id: node.id.clone(),
                label: node.label.clone(),
                score,
                reason: format!(
                    "完成度({:.0}%), 碳足迹高({:.2} kgCO₂e)",
                    MAX_UNCERTAINTY - uncertainty(node),
                    node.attrs.carbon_footprint
                ),
            });
        }
    }

    let total = report.completed + report.ai_supplemented + report.manual_required;
    if total > 0 {
        let score = (report.completed as f64 + certainty_sum) / total as f64;
        report.credibility_score = score.clamp(0.0, 1.0);
    }
    report.missing_stages = Stage::CANONICAL
        .into_iter()
        .filter(|stage| !present.contains(stage))
        .collect();
    report
}

impl CredibilityReport {
    /// Score as a whole percentage, for display.
    #[must_use]
    pub fn percent(&self) -> f64 {
        round2(self.credibility_score * 100.0)
    }
}
