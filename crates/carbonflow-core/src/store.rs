//! # Graph Store
//!
//! The single owner of the live graph and the command layer over it.
//!
//! Every mutating command validates first, applies, re-aggregates whatever
//! lost or gained a source, pushes exactly one history entry, reassesses
//! credibility and bumps the [`Revision`]. A failing command leaves the graph,
//! history and revision untouched.
//!
//! The store also holds the one pending import payload: a table staged by
//! an upload is dropped onto the canvas later with [`GraphStore::drop_import`].

use crate::aggregation::{self, PropagationPolicy};
use crate::canvas;
use crate::completion::{self, CompletionTask};
use crate::credibility::{self, CredibilityReport};
use crate::graph::Graph;
use crate::history::History;
use crate::import::layout::LayoutConfig;
use crate::import::{self, ImportPayload, ImportReport};
use crate::primitives::{
    DEFAULT_HISTORY_LIMIT, DEFAULT_LAYOUT_SEED, DUPLICATE_OFFSET, MAX_UNCERTAINTY, round2,
};
use crate::summary::WorkflowSummary;
use crate::{
    CompletionStatus, DataSource, Edge, EdgeId, LcaError, Node, NodeAttributes, NodeId, Position,
    Revision, Stage,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// SETTINGS
// =============================================================================

/// Tunables fixed for the lifetime of a store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub propagation: PropagationPolicy,
    pub layout: LayoutConfig,
    pub history_limit: usize,
    /// Seed for import layout jitter.
    pub seed: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            propagation: PropagationPolicy::default(),
            layout: LayoutConfig::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            seed: DEFAULT_LAYOUT_SEED,
        }
    }
}

// =============================================================================
// COMMAND INPUTS & OUTCOMES
// =============================================================================

/// Partial attribute update for [`GraphStore::update_node_data`].
///
/// Absent fields are left alone. Keys not named here go to the node's
/// `extra` map; a `null` value removes the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeUpdate {
    pub label: Option<String>,
    pub position: Option<Position>,
    #[serde(alias = "stage")]
    pub lifecycle_stage: Option<Stage>,
    pub weight: Option<f64>,
    pub carbon_factor: Option<f64>,
    pub carbon_footprint: Option<f64>,
    pub data_source: Option<DataSource>,
    pub completion_status: Option<CompletionStatus>,
    pub uncertainty_score: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// What happened to one enrichment result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentOutcome {
    Applied,
    /// The node changed or vanished after the task was planned.
    Stale,
}

// =============================================================================
// GRAPH STORE
// =============================================================================

/// Owner of the live graph, its history and the derived credibility report.
#[derive(Debug)]
pub struct GraphStore {
    graph: Graph,
    history: History,
    selection: BTreeSet<NodeId>,
    pending_import: Option<ImportPayload>,
    credibility: CredibilityReport,
    settings: StoreSettings,
    revision: Revision,
    next_id: u64,
    rng: StdRng,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new(StoreSettings::default())
    }
}

/// Next `node-<n>` id not already present in `graph`.
fn next_free_id(graph: &Graph, counter: &mut u64) -> NodeId {
    loop {
        *counter = counter.saturating_add(1);
        let id = NodeId::new(format!("node-{}", counter));
        if !graph.contains_node(&id) {
            return id;
        }
    }
}

impl GraphStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(settings: StoreSettings) -> Self {
        Self::with_graph(Graph::new(), settings)
    }

    /// Create a store around an existing graph, e.g. one loaded from records.
    #[must_use]
    pub fn with_graph(graph: Graph, settings: StoreSettings) -> Self {
        let credibility = credibility::assess(graph.nodes());
        Self {
            history: History::new(graph.clone(), settings.history_limit),
            graph,
            selection: BTreeSet::new(),
            pending_import: None,
            credibility,
            settings,
            revision: Revision::default(),
            next_id: 0,
            rng: StdRng::seed_from_u64(settings.seed),
        }
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// A copy-on-write clone of the live graph.
    #[must_use]
    pub fn snapshot(&self) -> Graph {
        self.graph.clone()
    }

    #[must_use]
    pub fn revision(&self) -> Revision {
        self.revision
    }

    #[must_use]
    pub fn credibility(&self) -> &CredibilityReport {
        &self.credibility
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    #[must_use]
    pub fn selection(&self) -> &BTreeSet<NodeId> {
        &self.selection
    }

    #[must_use]
    pub fn pending_import(&self) -> Option<&ImportPayload> {
        self.pending_import.as_ref()
    }

    /// Save-time metrics over the live graph.
    #[must_use]
    pub fn summary(&self) -> WorkflowSummary {
        WorkflowSummary::from_graph(&self.graph)
    }

    /// Change how far aggregation travels for subsequent commands.
    pub fn set_propagation(&mut self, policy: PropagationPolicy) {
        self.settings.propagation = policy;
    }

    // -------------------------------------------------------------------------
    // Bookkeeping
    // -------------------------------------------------------------------------

    fn refresh(&mut self) -> Revision {
        self.credibility = credibility::assess(self.graph.nodes());
        self.revision = self.revision.next();
        self.revision
    }

    fn commit(&mut self) -> Revision {
        self.history.push(self.graph.clone());
        self.refresh()
    }

    fn propagate(&mut self, affected: &BTreeSet<NodeId>) -> Vec<NodeId> {
        aggregation::reaggregate(&mut self.graph, affected, self.settings.propagation)
    }

    /// Downstream nodes that read `id`'s values, when the policy follows them.
    fn propagate_from(&mut self, id: &NodeId) {
        if self.settings.propagation == PropagationPolicy::Descendants {
            let affected: BTreeSet<NodeId> = self.graph.successors(id).into_iter().collect();
            self.propagate(&affected);
        }
    }

    // -------------------------------------------------------------------------
    // Node commands
    // -------------------------------------------------------------------------

    /// Add an unconnected node.
    ///
    /// With positive weight and factor the footprint is derived; otherwise the
    /// given footprint stands. The result becomes the node's baseline.
    pub fn add_node(
        &mut self,
        label: impl Into<String>,
        position: Position,
        mut attrs: NodeAttributes,
    ) -> NodeId {
        attrs.weight = attrs.weight.max(0.0);
        attrs.carbon_factor = attrs.carbon_factor.max(0.0);
        attrs.carbon_footprint = attrs.carbon_footprint.max(0.0);
        if attrs.weight > 0.0 && attrs.carbon_factor > 0.0 {
            attrs.carbon_footprint = round2(attrs.weight * attrs.carbon_factor);
        }
        attrs.capture_baseline();

        let id = next_free_id(&self.graph, &mut self.next_id);
        self.graph
            .insert_node(Node::new(id.clone(), label, position, attrs));
        self.commit();
        id
    }

    /// Merge a partial update into a node.
    ///
    /// On a node without inbound edges a weight or factor change re-derives
    /// the footprint, and the numbers become the new baseline. Aggregated
    /// nodes take the numbers as given and keep their baseline.
    pub fn update_node_data(
        &mut self,
        id: &NodeId,
        update: NodeUpdate,
    ) -> Result<Revision, LcaError> {
        let connected = self.graph.has_inbound(id);
        let node = self
            .graph
            .node_mut(id)
            .ok_or_else(|| LcaError::NodeNotFound(id.clone()))?;

        if let Some(label) = update.label {
            node.label = label;
        }
        if let Some(position) = update.position {
            node.position = position;
        }
        let attrs = &mut node.attrs;
        if let Some(stage) = update.lifecycle_stage {
            attrs.stage = stage;
        }
        let before = (attrs.weight, attrs.carbon_factor);
        if let Some(w) = update.weight {
            attrs.weight = w.max(0.0);
        }
        if let Some(f) = update.carbon_factor {
            attrs.carbon_factor = f.max(0.0);
        }
        if let Some(fp) = update.carbon_footprint {
            attrs.carbon_footprint = fp.max(0.0);
        }
        if let Some(source) = update.data_source {
            attrs.data_source = source;
        }
        if let Some(status) = update.completion_status {
            attrs.completion_status = status;
        }
        if let Some(u) = update.uncertainty_score {
            attrs.uncertainty_score = u.clamp(0.0, MAX_UNCERTAINTY);
        }
        for (key, value) in update.extra {
            if value.is_null() {
                attrs.extra.remove(&key);
            } else {
                attrs.extra.insert(key, value);
            }
        }

        let numbers_changed = before != (attrs.weight, attrs.carbon_factor);
        if !connected && (numbers_changed || update.carbon_footprint.is_some()) {
            if numbers_changed {
                attrs.carbon_footprint = round2(attrs.weight * attrs.carbon_factor);
            }
            attrs.capture_baseline();
        }
        node.touch();

        self.propagate_from(id);
        Ok(self.commit())
    }

    /// Delete nodes and every edge touching them.
    ///
    /// Surviving nodes that lost a source are re-aggregated.
    pub fn delete_nodes(&mut self, ids: &[NodeId]) -> Result<Revision, LcaError> {
        if ids.is_empty() {
            return Err(LcaError::EmptySelection);
        }
        if let Some(missing) = ids.iter().find(|id| !self.graph.contains_node(id)) {
            return Err(LcaError::NodeNotFound(missing.clone()));
        }

        let mut lost_source = BTreeSet::new();
        for id in ids {
            if let Some((_, edges)) = self.graph.remove_node(id) {
                lost_source.extend(edges.into_iter().map(|e| e.target));
            }
            self.selection.remove(id);
        }
        lost_source.retain(|id| self.graph.contains_node(id));
        self.propagate(&lost_source);
        Ok(self.commit())
    }

    /// The distinct direct predecessors of a node.
    pub fn get_predecessors(&self, id: &NodeId) -> Result<Vec<NodeId>, LcaError> {
        if !self.graph.contains_node(id) {
            return Err(LcaError::NodeNotFound(id.clone()));
        }
        Ok(self.graph.predecessors(id))
    }

    // -------------------------------------------------------------------------
    // Canvas commands
    // -------------------------------------------------------------------------

    fn insert_stage_node(&mut self, stage: Stage, anchor: Position) -> NodeId {
        let id = next_free_id(&self.graph, &mut self.next_id);
        self.graph.insert_node(Node::new(
            id.clone(),
            stage.label(),
            canvas::stage_position(stage, anchor),
            canvas::stage_attributes(stage),
        ));
        id
    }

    /// Add a template node for `stage` near `anchor`.
    pub fn add_stage_node(&mut self, stage: Stage, anchor: Position) -> NodeId {
        let id = self.insert_stage_node(stage, anchor);
        self.commit();
        id
    }

    /// Add a template node for every stage after raw material, as one
    /// history entry.
    pub fn add_all_stages(&mut self, anchor: Position) -> Vec<NodeId> {
        let ids = canvas::TEMPLATE_STAGES
            .into_iter()
            .map(|stage| self.insert_stage_node(stage, anchor))
            .collect();
        self.commit();
        ids
    }

    /// Copy a node without its edges, offset down and to the right.
    ///
    /// The copy is unconnected, so its current numbers become its baseline.
    pub fn duplicate_node(&mut self, id: &NodeId) -> Result<NodeId, LcaError> {
        let original = self
            .graph
            .node(id)
            .ok_or_else(|| LcaError::NodeNotFound(id.clone()))?;
        let label = original.label.clone();
        let position = Position::new(
            original.position.x + DUPLICATE_OFFSET,
            original.position.y + DUPLICATE_OFFSET,
        );
        let mut attrs = original.attrs.clone();
        attrs.capture_baseline();

        let copy = next_free_id(&self.graph, &mut self.next_id);
        self.graph
            .insert_node(Node::new(copy.clone(), label, position, attrs));
        self.commit();
        Ok(copy)
    }

    /// Arrange nodes in lifecycle-order columns with the final product to
    /// their right. Edges and node data are untouched.
    pub fn auto_layout(&mut self) -> Result<Revision, LcaError> {
        for (id, position) in canvas::stage_columns(&self.graph)? {
            if let Some(node) = self.graph.node_mut(&id) {
                node.position = position;
            }
        }
        Ok(self.commit())
    }

    // -------------------------------------------------------------------------
    // Edge commands
    // -------------------------------------------------------------------------

    /// Connect `source` into `target` and re-aggregate the target.
    pub fn add_edge(&mut self, source: &NodeId, target: &NodeId) -> Result<EdgeId, LcaError> {
        let id = self
            .graph
            .insert_edge(Edge::new(source.clone(), target.clone()))?;
        self.propagate(&BTreeSet::from([target.clone()]));
        self.commit();
        Ok(id)
    }

    /// Remove edges and re-aggregate their targets.
    pub fn remove_edges(&mut self, ids: &[EdgeId]) -> Result<Revision, LcaError> {
        if ids.is_empty() {
            return Err(LcaError::EmptySelection);
        }
        if let Some(missing) = ids.iter().find(|id| self.graph.edge(id).is_none()) {
            return Err(LcaError::EdgeNotFound(missing.clone()));
        }

        let mut targets = BTreeSet::new();
        for id in ids {
            if let Some(edge) = self.graph.remove_edge(id) {
                targets.insert(edge.target);
            }
        }
        self.propagate(&targets);
        Ok(self.commit())
    }

    /// Remove the edge between two nodes, if present.
    pub fn disconnect(&mut self, source: &NodeId, target: &NodeId) -> Result<Revision, LcaError> {
        let id = self
            .graph
            .find_edge(source, target)
            .map(|e| e.id.clone())
            .ok_or_else(|| LcaError::EdgeNotFound(EdgeId::between(source, target)))?;
        self.remove_edges(&[id])
    }

    // -------------------------------------------------------------------------
    // Calculation
    // -------------------------------------------------------------------------

    /// User-triggered footprint calculation over `ids`.
    ///
    /// Returns the nodes that changed; nothing is recorded when none did.
    pub fn calculate_carbon_footprint(&mut self, ids: &[NodeId]) -> Result<Vec<NodeId>, LcaError> {
        if ids.is_empty() {
            return Err(LcaError::EmptySelection);
        }
        let mut changed = aggregation::calculate_carbon_footprint(&mut self.graph, ids);
        if self.settings.propagation == PropagationPolicy::Descendants && !changed.is_empty() {
            let roots: BTreeSet<NodeId> = changed.iter().cloned().collect();
            let downstream = self.graph.descendants(&roots);
            for id in self.propagate(&downstream) {
                if !changed.contains(&id) {
                    changed.push(id);
                }
            }
        }
        if !changed.is_empty() {
            self.commit();
        }
        Ok(changed)
    }

    /// [`Self::calculate_carbon_footprint`] over the current selection.
    pub fn calculate_selection(&mut self) -> Result<Vec<NodeId>, LcaError> {
        let ids: Vec<NodeId> = self.selection.iter().cloned().collect();
        self.calculate_carbon_footprint(&ids)
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    /// Replace the selection. Unknown ids are ignored.
    pub fn select(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.selection = ids
            .into_iter()
            .filter(|id| self.graph.contains_node(id))
            .collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // -------------------------------------------------------------------------
    // History
    // -------------------------------------------------------------------------

    fn restore(&mut self, graph: Graph) {
        self.graph = graph;
        self.selection.clear();
        self.refresh();
    }

    /// Step back one action. Returns `false` at the oldest entry.
    pub fn undo(&mut self) -> bool {
        match self.history.undo().cloned() {
            Some(graph) => {
                self.restore(graph);
                true
            }
            None => false,
        }
    }

    /// Step forward one action. Returns `false` at the newest entry.
    pub fn redo(&mut self) -> bool {
        match self.history.redo().cloned() {
            Some(graph) => {
                self.restore(graph);
                true
            }
            None => false,
        }
    }

    /// Record the live graph as one history entry if it differs from the
    /// entry at the cursor.
    pub fn checkpoint(&mut self) -> bool {
        if self.history.current() == Some(&self.graph) {
            return false;
        }
        self.commit();
        true
    }

    /// Swap in a whole new graph and start a fresh history.
    pub fn replace_graph(&mut self, graph: Graph) -> Revision {
        self.history = History::new(graph.clone(), self.settings.history_limit);
        self.graph = graph;
        self.selection.clear();
        self.pending_import = None;
        self.refresh()
    }

    // -------------------------------------------------------------------------
    // Import
    // -------------------------------------------------------------------------

    /// Hold a payload until it is dropped. Replaces any earlier payload.
    pub fn stage_import(&mut self, payload: ImportPayload) {
        self.pending_import = Some(payload);
    }

    /// Import the pending payload at `position`.
    ///
    /// The payload is consumed whether or not the import succeeds.
    pub fn drop_import(&mut self, position: Position) -> Result<ImportReport, LcaError> {
        let payload = self
            .pending_import
            .take()
            .ok_or(LcaError::NoPendingImport)?;
        self.import_table(&payload, position)
    }

    /// Import tabular text at `position` as one history entry.
    pub fn import_table(
        &mut self,
        payload: &ImportPayload,
        position: Position,
    ) -> Result<ImportReport, LcaError> {
        let mut counter = self.next_id;
        let current = &self.graph;
        let plan = import::plan_import(
            payload,
            position,
            &self.settings.layout,
            || next_free_id(current, &mut counter),
            &mut self.rng,
        )?;

        let mut next = self.graph.clone();
        for node in plan.nodes {
            next.insert_node(node);
        }
        for edge in plan.edges {
            next.insert_edge(edge)?;
        }

        self.next_id = counter;
        self.graph = next;
        self.commit();
        Ok(plan.report)
    }

    // -------------------------------------------------------------------------
    // AI completion
    // -------------------------------------------------------------------------

    /// One task per node that needs enrichment.
    pub fn completion_tasks(&self) -> Result<Vec<CompletionTask>, LcaError> {
        completion::plan(&self.graph)
    }

    /// Apply an optimizer response planned against `version` of a node.
    ///
    /// Responses for nodes that changed or vanished since planning are
    /// discarded. No history entry is pushed; call [`Self::checkpoint`] once
    /// the batch is done.
    pub fn apply_enrichment(
        &mut self,
        id: &NodeId,
        version: u64,
        response: &Map<String, Value>,
    ) -> EnrichmentOutcome {
        let connected = self.graph.has_inbound(id);
        let Some(node) = self.graph.node_mut(id) else {
            return EnrichmentOutcome::Stale;
        };
        if node.version != version {
            return EnrichmentOutcome::Stale;
        }

        completion::merge(&mut node.label, &mut node.attrs, response);
        if !connected {
            node.attrs.capture_baseline();
        }
        node.touch();

        self.propagate_from(id);
        self.refresh();
        EnrichmentOutcome::Applied
    }
}

// =============================================================================
// TESTS
// =============================================================================
