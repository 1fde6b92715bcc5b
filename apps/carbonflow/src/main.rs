//! # Carbonflow - Lifecycle Carbon Graph Server
//!
//! The main binary for the Carbonflow engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface over a workflow JSON file
//! - AI completion through the per-stage optimizer
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! carbonflow serve --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! carbonflow import -f bom.csv -t bom
//! carbonflow connect node-1 node-4
//! carbonflow calculate node-4
//! carbonflow credibility
//! ```

use carbonflow::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // CARBONFLOW_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("CARBONFLOW_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "carbonflow=debug,carbonflow_core=debug,tower_http=debug"
    } else {
        "carbonflow=info,carbonflow_core=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Carbonflow startup banner.
fn print_banner() {
    println!(
        r#"
   ___         _             __ _
  / __|__ _ _ | |__  ___ _ _ / _| |_____ __ __
 | (__/ _` | '_| '_ \/ _ \ ' \  _| / _ \ V  V /
  \___\__,_|_| |_.__/\___/_||_|_| |_\___/\_/\_/

  Lifecycle Carbon Graph Engine v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
