//! Application-level error type.

use crate::config::ConfigError;
use crate::optimizer::OptimizerError;
use carbonflow_core::LcaError;
use thiserror::Error;

/// Errors surfaced by the CLI and server startup.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] LcaError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    #[error("I/O error: {0}")]
    Io(String),
}
