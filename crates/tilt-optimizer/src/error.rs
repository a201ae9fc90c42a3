//! Tilt optimizer error types

use crate::scheduler::RunState;
use thiserror::Error;

/// Errors raised while configuring or driving an optimization run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TiltOptimizerError {
    /// The layout has no panel rows whose tilt can be optimized
    #[error("No optimizable panel rows found in the layout")]
    NoOptimizablePanels,

    /// Run configuration rejected by validation
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A run is active and must complete or abort first
    #[error("An optimization run is already in progress (state: {state})")]
    RunInProgress { state: RunState },

    /// Operation requires an active run
    #[error("No optimization run is active")]
    NoActiveRun,

    /// Evaluator dropped a job without reporting a result
    #[error("Evaluator disconnected before reporting individual {index}")]
    EvaluatorDisconnected { index: usize },

    /// Evaluator reported a result that cannot be used as a fitness
    #[error("Invalid yield report: {reason}")]
    InvalidReport { reason: String },

    /// Position vector and layout disagree on the number of rows
    #[error("Dimension mismatch: expected {expected} rows, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for tilt optimizer operations
pub type TiltOptimizerResult<T> = Result<T, TiltOptimizerError>;
