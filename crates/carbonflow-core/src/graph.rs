//! # Graph
//!
//! The node/edge collections of one lifecycle model.
//!
//! Both maps are held behind `Arc` and every node and edge is itself an
//! `Arc`, so cloning a `Graph` is O(1) and a snapshot shares all unchanged
//! nodes with the live graph. Mutation goes through `Arc::make_mut`, which
//! copies only the map spine and the node being edited.
//!
//! All collections are `BTreeMap` for deterministic iteration order.

use crate::{Edge, EdgeId, LcaError, Node, NodeId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// A lifecycle graph with copy-on-write storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: Arc<BTreeMap<NodeId, Arc<Node>>>,
    edges: Arc<BTreeMap<EdgeId, Arc<Edge>>>,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().map(AsRef::as_ref)
    }

    /// Get all edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values().map(AsRef::as_ref)
    }

    /// Lookup a node.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id).map(AsRef::as_ref)
    }

    /// Lookup an edge.
    #[must_use]
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id).map(AsRef::as_ref)
    }

    #[must_use]
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Whether two graphs share their node storage (no copy happened yet).
    #[must_use]
    pub fn shares_nodes_with(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes)
    }

    /// Whether a node in both graphs is the same allocation.
    #[must_use]
    pub fn shares_node_with(&self, other: &Graph, id: &NodeId) -> bool {
        match (self.nodes.get(id), other.nodes.get(id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Insert or replace a node.
    pub fn insert_node(&mut self, node: Node) {
        Arc::make_mut(&mut self.nodes).insert(node.id.clone(), Arc::new(node));
    }

    /// Mutable access to a node, copying it out of any shared snapshot.
    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        if !self.nodes.contains_key(id) {
            return None;
        }
        Arc::make_mut(&mut self.nodes).get_mut(id).map(Arc::make_mut)
    }

    /// Remove a node and every edge touching it.
    ///
    /// Returns the removed edges so callers can re-aggregate their targets.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<(Node, Vec<Edge>)> {
        if !self.nodes.contains_key(id) {
            return None;
        }
        let touching: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| &e.source == id || &e.target == id)
            .map(|e| e.id.clone())
            .collect();
        let removed_edges = touching
            .iter()
            .filter_map(|edge_id| self.remove_edge(edge_id))
            .collect();
        let node = Arc::make_mut(&mut self.nodes).remove(id)?;
        Some((Arc::unwrap_or_clone(node), removed_edges))
    }

    /// Insert an edge and return the id it was stored under.
    ///
    /// Rejects unknown endpoints, self loops, and a second edge between the
    /// same (source, target) pair. An id already held by a different pair
    /// gets a numeric suffix.
    pub fn insert_edge(&mut self, mut edge: Edge) -> Result<EdgeId, LcaError> {
        if !self.contains_node(&edge.source) {
            return Err(LcaError::NodeNotFound(edge.source));
        }
        if !self.contains_node(&edge.target) {
            return Err(LcaError::NodeNotFound(edge.target));
        }
        if edge.source == edge.target {
            return Err(LcaError::SelfLoop(edge.source));
        }
        if self.find_edge(&edge.source, &edge.target).is_some() {
            return Err(LcaError::DuplicateEdge(edge.source, edge.target));
        }
        edge.id = self.free_edge_id(edge.id);
        let id = edge.id.clone();
        Arc::make_mut(&mut self.edges).insert(id.clone(), Arc::new(edge));
        Ok(id)
    }

    /// `id` itself, or `id-<n>` with the smallest free `n >= 2`.
    fn free_edge_id(&self, id: EdgeId) -> EdgeId {
        if !self.edges.contains_key(&id) {
            return id;
        }
        let mut n: u64 = 1;
        loop {
            n = n.saturating_add(1);
            let candidate = EdgeId::new(format!("{}-{}", id, n));
            if !self.edges.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Remove an edge by id.
    pub fn remove_edge(&mut self, id: &EdgeId) -> Option<Edge> {
        if !self.edges.contains_key(id) {
            return None;
        }
        Arc::make_mut(&mut self.edges)
            .remove(id)
            .map(Arc::unwrap_or_clone)
    }

    // -------------------------------------------------------------------------
    // Adjacency
    // -------------------------------------------------------------------------

    /// The edge from `source` to `target`, if any.
    #[must_use]
    pub fn find_edge(&self, source: &NodeId, target: &NodeId) -> Option<&Edge> {
        self.edges()
            .find(|e| &e.source == source && &e.target == target)
    }

    /// Distinct direct predecessors of a node, in id order.
    #[must_use]
    pub fn predecessors(&self, id: &NodeId) -> Vec<NodeId> {
        self.edges()
            .filter(|e| &e.target == id)
            .map(|e| e.source.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct direct successors of a node, in id order.
    #[must_use]
    pub fn successors(&self, id: &NodeId) -> Vec<NodeId> {
        self.edges()
            .filter(|e| &e.source == id)
            .map(|e| e.target.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether any edge targets this node.
    #[must_use]
    pub fn has_inbound(&self, id: &NodeId) -> bool {
        self.edges().any(|e| &e.target == id)
    }

    /// Every node reachable downstream of `roots`, excluding the roots
    /// themselves unless they lie on a cycle through another root.
    #[must_use]
    pub fn descendants(&self, roots: &BTreeSet<NodeId>) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<NodeId> = roots.iter().cloned().collect();
        while let Some(current) = stack.pop() {
            for next in self.successors(&current) {
                if seen.insert(next.clone()) {
                    stack.push(next);
                }
            }
        }
        seen
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeAttributes, Position, Stage};

    fn node(id: &str) -> Node {
        Node::new(
            NodeId::from(id),
            id,
            Position::default(),
            NodeAttributes::leaf(Stage::RawMaterial, 1.0, 1.0),
        )
    }

    fn graph_with(ids: &[&str]) -> Graph {
        let mut graph = Graph::new();
        for id in ids {
            graph.insert_node(node(id));
        }
        graph
    }

    #[test]
    fn duplicate_pair_rejected() {
        let mut graph = graph_with(&["a", "b"]);
        graph
            .insert_edge(Edge::new("a".into(), "b".into()))
            .expect("first edge");

        let second = Edge {
            id: EdgeId::from("other"),
            source: "a".into(),
            target: "b".into(),
        };
        let result = graph.insert_edge(second);
        assert!(matches!(result, Err(LcaError::DuplicateEdge(_, _))));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn distinct_pairs_with_colliding_ids_both_insert() {
        // "edge-a-b-c" reads the same for a -> b-c and a-b -> c.
        let mut graph = graph_with(&["a", "b-c", "a-b", "c"]);
        let first = graph
            .insert_edge(Edge::new("a".into(), "b-c".into()))
            .expect("first edge");
        let second = graph
            .insert_edge(Edge::new("a-b".into(), "c".into()))
            .expect("second edge");

        assert_eq!(first.as_str(), "edge-a-b-c");
        assert_eq!(second.as_str(), "edge-a-b-c-2");
        assert_eq!(graph.edge_count(), 2);
        let stored = graph.edge(&second).expect("stored under returned id");
        assert_eq!(stored.source.as_str(), "a-b");
        assert_eq!(stored.target.as_str(), "c");
        assert_eq!(graph.predecessors(&"c".into()), vec![NodeId::from("a-b")]);
    }

    #[test]
    fn self_loop_and_unknown_endpoint_rejected() {
        let mut graph = graph_with(&["a"]);
        assert!(matches!(
            graph.insert_edge(Edge::new("a".into(), "a".into())),
            Err(LcaError::SelfLoop(_))
        ));
        assert!(matches!(
            graph.insert_edge(Edge::new("a".into(), "zz".into())),
            Err(LcaError::NodeNotFound(_))
        ));
    }

    #[test]
    fn remove_node_cascades_edges() {
        let mut graph = graph_with(&["a", "b", "c"]);
        graph
            .insert_edge(Edge::new("a".into(), "b".into()))
            .expect("edge");
        graph
            .insert_edge(Edge::new("b".into(), "c".into()))
            .expect("edge");

        let (removed, edges) = graph.remove_node(&"b".into()).expect("remove");
        assert_eq!(removed.id.as_str(), "b");
        assert_eq!(edges.len(), 2);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn predecessors_are_sorted_and_distinct() {
        let mut graph = graph_with(&["a", "b", "t"]);
        graph
            .insert_edge(Edge::new("b".into(), "t".into()))
            .expect("edge");
        graph
            .insert_edge(Edge::new("a".into(), "t".into()))
            .expect("edge");

        let preds = graph.predecessors(&"t".into());
        assert_eq!(preds, vec![NodeId::from("a"), NodeId::from("b")]);
        assert!(graph.has_inbound(&"t".into()));
        assert!(!graph.has_inbound(&"a".into()));
    }

    #[test]
    fn clone_shares_until_mutated() {
        let mut live = graph_with(&["a", "b"]);
        let snapshot = live.clone();
        assert!(live.shares_nodes_with(&snapshot));

        if let Some(n) = live.node_mut(&"a".into()) {
            n.attrs.weight = 42.0;
        }

        assert!(!live.shares_nodes_with(&snapshot));
        assert!(live.shares_node_with(&snapshot, &"b".into()));
        assert!(!live.shares_node_with(&snapshot, &"a".into()));
        let old = snapshot.node(&"a".into()).expect("node");
        assert!((old.attrs.weight - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn descendants_terminate_on_cycles() {
        let mut graph = graph_with(&["a", "b", "c"]);
        graph
            .insert_edge(Edge::new("a".into(), "b".into()))
            .expect("edge");
        graph
            .insert_edge(Edge::new("b".into(), "c".into()))
            .expect("edge");
        graph
            .insert_edge(Edge::new("c".into(), "b".into()))
            .expect("edge");

        let roots = BTreeSet::from([NodeId::from("a")]);
        let reached = graph.descendants(&roots);
        assert_eq!(reached.len(), 2);
    }
}
