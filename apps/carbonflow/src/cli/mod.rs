//! # Carbonflow CLI Module
//!
//! This module implements the CLI interface for Carbonflow. Every command
//! loads the workflow file, applies one operation and writes the file back.
//!
//! ## Available Commands
//!
//! - `serve` - Start the HTTP server
//! - `status` - Show graph status
//! - `init` - Create an empty workflow file
//! - `import` - Import a CSV/TSV table
//! - `add-node` - Add a manual node
//! - `update` - Change a node's numbers
//! - `connect` / `disconnect` - Add or remove an edge
//! - `delete` - Delete nodes
//! - `add-stage` / `duplicate` / `layout` - Canvas helpers
//! - `calculate` - Recalculate footprints from inputs
//! - `credibility` - Show the credibility report
//! - `summary` - Show save-time summary metrics
//! - `complete` - Fill incomplete nodes through the optimizer

mod commands;

use crate::config::Config;
use crate::error::AppError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Carbonflow - lifecycle carbon graph engine
///
/// Models a product's lifecycle as a directed graph and propagates carbon
/// footprints from inputs to outputs.
#[derive(Parser, Debug)]
#[command(name = "carbonflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the workflow file
    #[arg(short = 'W', long, global = true, default_value = "carbonflow.json")]
    pub workflow: PathBuf,

    /// Path to the config file (default: ./carbonflow.toml when present)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show graph status
    Status,

    /// Create an empty workflow file
    Init {
        /// Workflow name
        #[arg(short, long, default_value = "Untitled workflow")]
        name: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Import a CSV/TSV table
    Import {
        /// Path to the table
        #[arg(short, long)]
        file: PathBuf,

        /// "bom" or a stage (raw_material, manufacturing, distribution, usage, disposal)
        #[arg(short, long, default_value = "bom")]
        target: String,

        /// Drop point x
        #[arg(long, default_value = "0")]
        x: f64,

        /// Drop point y
        #[arg(long, default_value = "0")]
        y: f64,
    },

    /// Add a manual node
    AddNode {
        /// Node label
        label: String,

        /// Lifecycle stage (label or key)
        #[arg(short, long, default_value = "raw_material")]
        stage: String,

        /// Weight in kg
        #[arg(short, long, default_value = "0")]
        weight: f64,

        /// Carbon factor in kgCO2e/kg
        #[arg(short = 'f', long, default_value = "0")]
        carbon_factor: f64,

        #[arg(long, default_value = "0")]
        x: f64,

        #[arg(long, default_value = "0")]
        y: f64,
    },

    /// Change a node's label or numbers
    Update {
        /// Node ID
        id: String,

        #[arg(short, long)]
        label: Option<String>,

        #[arg(short, long)]
        weight: Option<f64>,

        #[arg(short = 'f', long)]
        carbon_factor: Option<f64>,

        /// Footprint in kgCO2e
        #[arg(short = 'p', long)]
        carbon_footprint: Option<f64>,
    },

    /// Connect two nodes
    Connect {
        /// Source node ID
        source: String,

        /// Target node ID
        target: String,
    },

    /// Remove the edge between two nodes
    Disconnect {
        /// Source node ID
        source: String,

        /// Target node ID
        target: String,
    },

    /// Add stage template nodes
    AddStage {
        /// Lifecycle stage (label or key)
        #[arg(short, long, conflicts_with = "all", required_unless_present = "all")]
        stage: Option<String>,

        /// Add every stage after raw material
        #[arg(short, long)]
        all: bool,

        #[arg(long, default_value = "0")]
        x: f64,

        #[arg(long, default_value = "0")]
        y: f64,
    },

    /// Copy a node without its edges
    Duplicate {
        /// Node ID
        id: String,
    },

    /// Arrange nodes in lifecycle-order columns
    Layout,

    /// Delete nodes and their edges
    Delete {
        /// Node IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Recalculate footprints of the given nodes from their inputs
    Calculate {
        /// Node IDs (default: every node)
        ids: Vec<String>,
    },

    /// Show the credibility report
    Credibility,

    /// Show save-time summary metrics
    Summary,

    /// Fill incomplete nodes through the optimizer
    Complete {
        /// Concurrent requests (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let config = Config::load(cli.config.as_deref())?;
    let path = cli.workflow.as_path();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Serve { host, port }) => cmd_serve(path, &config, &host, port).await,
        Some(Commands::Status) => cmd_status(path, &config, json_mode),
        Some(Commands::Init { name, force }) => cmd_init(path, &name, force),
        Some(Commands::Import { file, target, x, y }) => {
            cmd_import(path, &config, json_mode, &file, &target, x, y)
        }
        Some(Commands::AddNode {
            label,
            stage,
            weight,
            carbon_factor,
            x,
            y,
        }) => cmd_add_node(
            path,
            &config,
            json_mode,
            NewNode {
                label,
                stage,
                weight,
                carbon_factor,
                x,
                y,
            },
        ),
        Some(Commands::Update {
            id,
            label,
            weight,
            carbon_factor,
            carbon_footprint,
        }) => {
            let update = carbonflow_core::NodeUpdate {
                label,
                weight,
                carbon_factor,
                carbon_footprint,
                ..Default::default()
            };
            cmd_update(path, &config, &id, update)
        }
        Some(Commands::Connect { source, target }) => cmd_connect(path, &config, &source, &target),
        Some(Commands::Disconnect { source, target }) => {
            cmd_disconnect(path, &config, &source, &target)
        }
        Some(Commands::AddStage { stage, all: _, x, y }) => cmd_add_stage(
            path,
            &config,
            json_mode,
            stage.as_deref(),
            carbonflow_core::Position::new(x, y),
        ),
        Some(Commands::Duplicate { id }) => cmd_duplicate(path, &config, &id),
        Some(Commands::Layout) => cmd_layout(path, &config),
        Some(Commands::Delete { ids }) => cmd_delete(path, &config, &ids),
        Some(Commands::Calculate { ids }) => cmd_calculate(path, &config, json_mode, &ids),
        Some(Commands::Credibility) => cmd_credibility(path, &config, json_mode),
        Some(Commands::Summary) => cmd_summary(path, &config, json_mode),
        Some(Commands::Complete { workers }) => {
            cmd_complete(path, &config, json_mode, workers).await
        }
        None => {
            // No subcommand - show status by default
            cmd_status(path, &config, json_mode)
        }
    }
}
