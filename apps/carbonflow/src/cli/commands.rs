//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState};
use crate::config::Config;
use crate::error::AppError;
use crate::log_import_report;
use crate::optimizer::HttpOptimizer;
use crate::orchestrator::{CancelToken, Orchestrator};
use carbonflow_core::{
    Graph, GraphStore, ImportPayload, ImportTarget, LcaError, NodeAttributes, NodeId,
    NodeUpdate, Position, SaveWorkflowRequest, Stage, WorkflowRecord,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

// =============================================================================
// FILE LIMITS
// =============================================================================

/// Maximum table size for import (10 MB).
const MAX_TABLE_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum workflow file size (100 MB).
const MAX_WORKFLOW_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Name given to workflows created without one.
pub const DEFAULT_WORKFLOW_NAME: &str = "Untitled workflow";

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), AppError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| AppError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(AppError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path and make sure it is a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, AppError> {
    let canonical = path.canonicalize().map_err(|e| {
        AppError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(AppError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// WORKFLOW FILE
// =============================================================================

/// A workflow file opened for one command.
#[derive(Debug)]
pub struct WorkflowFile {
    pub name: String,
    pub store: GraphStore,
}

impl WorkflowFile {
    /// Load `path`, or start an empty workflow when it does not exist.
    ///
    /// Accepts both a bare workflow record and a full save request; the
    /// summary of the latter is recomputed, never read back.
    pub fn load(path: &Path, config: &Config) -> Result<Self, AppError> {
        let settings = config.store_settings();
        if !path.exists() {
            return Ok(Self {
                name: DEFAULT_WORKFLOW_NAME.to_string(),
                store: GraphStore::new(settings),
            });
        }

        let validated = validate_file_path(path)?;
        validate_file_size(&validated, MAX_WORKFLOW_FILE_SIZE)?;
        let data = std::fs::read(&validated)
            .map_err(|e| AppError::Io(format!("Read workflow: {}", e)))?;
        let record: WorkflowRecord = serde_json::from_slice(&data).map_err(LcaError::from)?;

        let name = record.name.clone();
        let (graph, skipped) = Graph::from_records(record)?;
        if skipped > 0 {
            tracing::warn!("Workflow '{}': skipped {} invalid edge(s)", name, skipped);
        }
        Ok(Self {
            name,
            store: GraphStore::with_graph(graph, settings),
        })
    }

    /// Write the workflow as a save request (records plus summary).
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let request = SaveWorkflowRequest::for_graph(self.store.graph(), self.name.clone())?;
        let data = serde_json::to_vec_pretty(&request).map_err(LcaError::from)?;
        std::fs::write(path, data).map_err(|e| AppError::Io(format!("Write workflow: {}", e)))
    }
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the HTTP server over the workflow file's graph.
pub async fn cmd_serve(
    path: &Path,
    config: &Config,
    host: &str,
    port: u16,
) -> Result<(), AppError> {
    let workflow = WorkflowFile::load(path, config)?;

    println!("Carbonflow Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:      {}", host);
    println!("  Port:      {}", port);
    println!("  Workflow:  {:?}", path);
    println!("  Optimizer: {}", config.optimizer.base_url);
    println!("  Workers:   {}", config.workers());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let optimizer = HttpOptimizer::new(&config.optimizer)?;
    let state = AppState::new(workflow.store)
        .with_optimizer(Arc::new(optimizer), config.workers())
        .with_workflow_name(workflow.name);

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show graph status.
pub fn cmd_status(path: &Path, config: &Config, json_mode: bool) -> Result<(), AppError> {
    let workflow = WorkflowFile::load(path, config)?;
    let graph = workflow.store.graph();
    let summary = workflow.store.summary();
    let credibility = workflow.store.credibility();

    if json_mode {
        print_json(&serde_json::json!({
            "workflow": path.to_string_lossy(),
            "name": workflow.name,
            "node_count": graph.node_count(),
            "edge_count": graph.edge_count(),
            "total_carbon_footprint": summary.total_carbon_footprint,
            "credibility_score": credibility.credibility_score,
            "propagation": workflow.store.settings().propagation.to_string(),
        }));
        return Ok(());
    }

    println!("Carbonflow Workflow Status");
    println!("==========================");
    println!("Workflow: {:?}", path);
    println!("Name:     {}", workflow.name);
    println!();
    println!("Nodes:        {}", graph.node_count());
    println!("Edges:        {}", graph.edge_count());
    println!("Footprint:    {} kgCO2e", summary.total_carbon_footprint);
    println!("Credibility:  {:.2}%", credibility.percent());
    println!("Propagation:  {}", workflow.store.settings().propagation);

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create an empty workflow file.
pub fn cmd_init(path: &Path, name: &str, force: bool) -> Result<(), AppError> {
    if path.exists() && !force {
        return Err(AppError::Io(
            "Workflow file already exists. Use --force to overwrite.".to_string(),
        ));
    }

    let workflow = WorkflowFile {
        name: name.to_string(),
        store: GraphStore::default(),
    };
    workflow.save(path)?;
    println!("Initialized workflow '{}' at {:?}", name, path);
    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Import a CSV/TSV table at a drop point.
pub fn cmd_import(
    path: &Path,
    config: &Config,
    json_mode: bool,
    file: &Path,
    target: &str,
    x: f64,
    y: f64,
) -> Result<(), AppError> {
    let target: ImportTarget = target.parse()?;
    let validated = validate_file_path(file)?;
    validate_file_size(&validated, MAX_TABLE_FILE_SIZE)?;
    let bytes = std::fs::read(&validated)
        .map_err(|e| AppError::Io(format!("Read table: {}", e)))?;
    let text = String::from_utf8_lossy(&bytes);

    let source_name = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "BOM".to_string());
    let payload = ImportPayload::new(text, target).with_source_name(source_name);

    tracing::info!("Importing {:?} as {}", file, target);
    let mut workflow = WorkflowFile::load(path, config)?;
    let report = workflow
        .store
        .import_table(&payload, Position::new(x, y))?;
    log_import_report(&report);
    workflow.save(path)?;

    if json_mode {
        print_json(&serde_json::to_value(&report).unwrap_or_default());
        return Ok(());
    }

    println!(
        "Imported {} nodes, {} edges ({} rows skipped, {} warnings)",
        report.nodes_created,
        report.edges_created,
        report.skipped_rows,
        report.warnings.len()
    );
    if let Some(id) = &report.final_product {
        println!("Final product: {}", id);
    }
    Ok(())
}

// =============================================================================
// NODE & EDGE COMMANDS
// =============================================================================

/// Arguments of `add-node`.
#[derive(Debug, Clone)]
pub struct NewNode {
    pub label: String,
    pub stage: String,
    pub weight: f64,
    pub carbon_factor: f64,
    pub x: f64,
    pub y: f64,
}

/// Add a manual node.
pub fn cmd_add_node(
    path: &Path,
    config: &Config,
    json_mode: bool,
    node: NewNode,
) -> Result<(), AppError> {
    let stage = Stage::from_label(&node.stage);
    if stage == Stage::Unclassified {
        tracing::warn!("Unknown stage '{}', node left unclassified", node.stage);
    }
    let attrs = NodeAttributes {
        stage,
        weight: node.weight,
        carbon_factor: node.carbon_factor,
        ..NodeAttributes::default()
    };

    let mut workflow = WorkflowFile::load(path, config)?;
    let id = workflow
        .store
        .add_node(node.label, Position::new(node.x, node.y), attrs);
    workflow.save(path)?;

    if json_mode {
        print_json(&serde_json::json!({ "node_id": id }));
    } else {
        println!("Added node {}", id);
    }
    Ok(())
}

/// Merge an update into a node.
pub fn cmd_update(
    path: &Path,
    config: &Config,
    id: &str,
    update: NodeUpdate,
) -> Result<(), AppError> {
    let mut workflow = WorkflowFile::load(path, config)?;
    workflow.store.update_node_data(&NodeId::new(id), update)?;
    workflow.save(path)?;
    println!("Updated node {}", id);
    Ok(())
}

/// Connect two nodes.
pub fn cmd_connect(
    path: &Path,
    config: &Config,
    source: &str,
    target: &str,
) -> Result<(), AppError> {
    let mut workflow = WorkflowFile::load(path, config)?;
    let edge = workflow
        .store
        .add_edge(&NodeId::new(source), &NodeId::new(target))?;
    workflow.save(path)?;
    println!("Added edge {}", edge);
    Ok(())
}

/// Remove the edge between two nodes.
pub fn cmd_disconnect(
    path: &Path,
    config: &Config,
    source: &str,
    target: &str,
) -> Result<(), AppError> {
    let mut workflow = WorkflowFile::load(path, config)?;
    workflow
        .store
        .disconnect(&NodeId::new(source), &NodeId::new(target))?;
    workflow.save(path)?;
    println!("Removed edge {} -> {}", source, target);
    Ok(())
}

/// Add a stage template node, or one for every template stage.
pub fn cmd_add_stage(
    path: &Path,
    config: &Config,
    json_mode: bool,
    stage: Option<&str>,
    anchor: Position,
) -> Result<(), AppError> {
    let mut workflow = WorkflowFile::load(path, config)?;
    let ids = match stage {
        Some(label) => {
            let stage = Stage::from_label(label);
            if stage == Stage::Unclassified {
                return Err(LcaError::InvalidValue(format!("Unknown stage '{}'", label)).into());
            }
            vec![workflow.store.add_stage_node(stage, anchor)]
        }
        None => workflow.store.add_all_stages(anchor),
    };
    workflow.save(path)?;

    if json_mode {
        print_json(&serde_json::json!({ "node_ids": ids }));
    } else {
        for id in &ids {
            println!("Added node {}", id);
        }
    }
    Ok(())
}

/// Copy a node's data into a new node.
pub fn cmd_duplicate(path: &Path, config: &Config, id: &str) -> Result<(), AppError> {
    let mut workflow = WorkflowFile::load(path, config)?;
    let copy = workflow.store.duplicate_node(&NodeId::new(id))?;
    workflow.save(path)?;
    println!("Duplicated {} as {}", id, copy);
    Ok(())
}

/// Arrange nodes in lifecycle-order columns.
pub fn cmd_layout(path: &Path, config: &Config) -> Result<(), AppError> {
    let mut workflow = WorkflowFile::load(path, config)?;
    workflow.store.auto_layout()?;
    workflow.save(path)?;
    println!("Layout applied");
    Ok(())
}

/// Delete nodes and their edges.
pub fn cmd_delete(path: &Path, config: &Config, ids: &[String]) -> Result<(), AppError> {
    let ids: Vec<NodeId> = ids.iter().map(NodeId::new).collect();
    let mut workflow = WorkflowFile::load(path, config)?;
    workflow.store.delete_nodes(&ids)?;
    workflow.save(path)?;
    println!("Deleted {} node(s)", ids.len());
    Ok(())
}

// =============================================================================
// CALCULATE COMMAND
// =============================================================================

/// Recalculate footprints from inputs. Without ids every node is a target.
pub fn cmd_calculate(
    path: &Path,
    config: &Config,
    json_mode: bool,
    ids: &[String],
) -> Result<(), AppError> {
    let mut workflow = WorkflowFile::load(path, config)?;
    let targets: Vec<NodeId> = if ids.is_empty() {
        workflow.store.graph().nodes().map(|n| n.id.clone()).collect()
    } else {
        ids.iter().map(NodeId::new).collect()
    };

    let changed = workflow.store.calculate_carbon_footprint(&targets)?;
    if !changed.is_empty() {
        workflow.save(path)?;
    }

    if json_mode {
        print_json(&serde_json::json!({ "changed": changed }));
        return Ok(());
    }
    if changed.is_empty() {
        println!("No footprints changed");
    } else {
        println!("Recalculated {} node(s):", changed.len());
        for id in &changed {
            if let Some(node) = workflow.store.graph().node(id) {
                println!("  {} ({}): {} kgCO2e", id, node.label, node.attrs.carbon_footprint);
            }
        }
    }
    Ok(())
}

// =============================================================================
// REPORT COMMANDS
// =============================================================================

/// Show the credibility report.
pub fn cmd_credibility(path: &Path, config: &Config, json_mode: bool) -> Result<(), AppError> {
    let workflow = WorkflowFile::load(path, config)?;
    let report = workflow.store.credibility();

    if json_mode {
        print_json(&serde_json::to_value(report).unwrap_or_default());
        return Ok(());
    }

    println!("Carbonflow Credibility");
    println!("======================");
    println!("Score:           {:.2}%", report.percent());
    println!("Completed:       {}", report.completed);
    println!("AI supplemented: {}", report.ai_supplemented);
    println!("Manual required: {}", report.manual_required);
    if !report.missing_stages.is_empty() {
        let missing: Vec<&str> = report.missing_stages.iter().map(|s| s.label()).collect();
        println!("Missing stages:  {}", missing.join(", "));
    }
    if let Some(node) = &report.optimizable_node {
        println!();
        println!("Optimize first: {} ({})", node.label, node.id);
        println!("  {}", node.reason);
    }
    for node in &report.manual_required_nodes {
        println!("  needs data: {} ({})", node.label, node.id);
    }
    Ok(())
}

/// Show save-time summary metrics.
pub fn cmd_summary(path: &Path, config: &Config, json_mode: bool) -> Result<(), AppError> {
    let workflow = WorkflowFile::load(path, config)?;
    let summary = workflow.store.summary();

    if json_mode {
        print_json(&serde_json::to_value(&summary).unwrap_or_default());
        return Ok(());
    }

    println!("Carbonflow Summary");
    println!("==================");
    println!("Total footprint:   {} kgCO2e", summary.total_carbon_footprint);
    println!("Total weight:      {} kg", summary.total_weight);
    println!("Carbon intensity:  {} kgCO2e/kg", summary.carbon_intensity);
    println!("Nodes:             {}", summary.node_count);
    println!("Data completeness: {}%", summary.data_completeness);
    println!("Primary data:      {}%", summary.primary_data_rate);
    println!("Verified data:     {}%", summary.verified_data_rate);
    println!("Data quality:      {}%", summary.overall_data_quality);
    println!();
    println!("By stage:");
    for stage in &summary.stage_emissions {
        println!(
            "  {} {} kgCO2e ({}%, {} nodes)",
            stage.stage, stage.emissions, stage.percentage, stage.nodes_count
        );
    }
    if !summary.hotspot_nodes.is_empty() {
        println!();
        println!("Hotspots:");
        for hotspot in &summary.hotspot_nodes {
            println!(
                "  {} ({}): {} kgCO2e ({}%)",
                hotspot.label, hotspot.id, hotspot.carbon_footprint, hotspot.percentage
            );
        }
    }
    Ok(())
}

// =============================================================================
// COMPLETE COMMAND
// =============================================================================

/// Fill incomplete nodes through the optimizer. Ctrl+C stops dispatching;
/// results already in flight are still applied and saved.
pub async fn cmd_complete(
    path: &Path,
    config: &Config,
    json_mode: bool,
    workers: Option<usize>,
) -> Result<(), AppError> {
    let workflow = WorkflowFile::load(path, config)?;
    let name = workflow.name;
    let store = RwLock::new(workflow.store);

    let optimizer = HttpOptimizer::new(&config.optimizer)?;
    let orchestrator = Orchestrator::new(workers.unwrap_or_else(|| config.workers()));
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing requests in flight");
            on_interrupt.cancel();
        }
    });

    let report = orchestrator
        .run(&store, Arc::new(optimizer), &cancel)
        .await;
    interrupt.abort();
    let report = report?;

    let workflow = WorkflowFile {
        name,
        store: store.into_inner(),
    };
    if report.applied > 0 {
        workflow.save(path)?;
    }

    if json_mode {
        print_json(&serde_json::to_value(&report).unwrap_or_default());
        return Ok(());
    }

    println!(
        "Completion: {} requested, {} applied, {} failed, {} stale",
        report.requested,
        report.applied,
        report.failed.len(),
        report.stale
    );
    if report.cancelled {
        println!("Cancelled: {} node(s) not sent", report.skipped);
    }
    for failure in &report.failed {
        println!("  {}: {}", failure.node_id, failure.message);
    }
    Ok(())
}
