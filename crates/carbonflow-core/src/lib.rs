//! # carbonflow-core
//!
//! The lifecycle carbon graph engine for Carbonflow.
//!
//! A product's life cycle is modelled as a directed graph: leaf nodes hold
//! measured weight and carbon factor, edges carry material and energy flow,
//! and aggregation nodes sum what flows into them. This crate keeps those
//! sums consistent while the graph is edited, imports tabular lifecycle
//! data, records undo/redo history and scores how trustworthy the data is.
//!
//! ## Architectural Constraints
//!
//! - Pure and synchronous: no async, no network, no filesystem
//! - Ordered: `BTreeMap`/`BTreeSet` only, so every listing is reproducible
//! - Single owner: all mutation goes through [`GraphStore`]
//! - Never persists: callers receive records and summaries to store elsewhere

// =============================================================================
// MODULES
// =============================================================================

pub mod aggregation;
pub mod canvas;
pub mod completion;
pub mod credibility;
pub mod graph;
pub mod history;
pub mod import;
pub mod primitives;
pub mod record;
pub mod store;
pub mod summary;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CompletionStatus, DataSource, Edge, EdgeId, LcaError, Node, NodeAttributes, NodeId, Position,
    Revision, Stage,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use aggregation::PropagationPolicy;
pub use graph::Graph;
pub use history::History;
pub use store::{EnrichmentOutcome, GraphStore, NodeUpdate, StoreSettings};

// =============================================================================
// RE-EXPORTS: Import, Scoring & Records
// =============================================================================

pub use completion::CompletionTask;
pub use credibility::{CredibilityReport, NodeRef, OptimizableNode};
pub use import::layout::LayoutConfig;
pub use import::{ImportPayload, ImportReport, ImportTarget, ImportWarning};
pub use record::{EdgeRecord, NodeRecord, SaveWorkflowRequest, WorkflowRecord};
pub use summary::{Hotspot, StageEmission, WorkflowSummary};
