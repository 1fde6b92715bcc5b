//! # Carbonflow
//!
//! Application layer over `carbonflow-core`: the HTTP API, the CLI, the
//! optimizer client and the AI completion orchestrator.
//!
//! ```text
//!   CLI (clap) ──┐                     ┌── Orchestrator ── Optimizer (HTTP)
//!                ├── GraphStore (core) ┤
//!   HTTP (axum) ─┘                     └── workflow JSON file
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod optimizer;
pub mod orchestrator;

use carbonflow_core::ImportReport;

/// Log the recovered problems of a finished import.
pub fn log_import_report(report: &ImportReport) {
    tracing::info!(
        "Imported {} node(s), {} edge(s), {} row(s) skipped",
        report.nodes_created,
        report.edges_created,
        report.skipped_rows
    );
    for warning in &report.warnings {
        tracing::warn!(
            "Import line {}, column '{}': {}",
            warning.line,
            warning.column,
            warning.message
        );
    }
}
