//! Evolutionary tilt-angle optimization for solar panel rows
//!
//! This crate tunes the tilt of every independently tiltable panel row to
//! maximize a simulated energy yield:
//! - Particle swarm and genetic search strategies behind [`TiltOptimizer`]
//! - A frame-paced [`TiltScheduler`] that evaluates one individual at a time
//!   through an external [`ObjectiveEvaluator`], with pause, resume and
//!   abort-with-revert
//! - A clear-sky reference [`ClearSkyYieldModel`] for running without an
//!   external simulator

pub mod config;
pub mod convergence;
pub mod encoding;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod genetic;
pub mod history;
pub mod layout;
pub mod optimizer;
pub mod population;
pub mod scheduler;
pub mod snapshot;
pub mod swarm;
pub mod yield_model;

pub use config::{
    Algorithm, GeneticParameters, RunConfig, RunConfigBuilder, SearchMode, SelectionMethod,
    SwarmParameters,
};
pub use encoding::{apply_position, decode, decode_all, encode, encode_all};
pub use error::{TiltOptimizerError, TiltOptimizerResult};
pub use evaluator::{
    yield_fn, EvaluationJob, EvaluationReporter, FramePacedEvaluator, ObjectiveEvaluator,
    ObjectiveKind, YieldModel, YieldReport,
};
pub use events::{RunEvent, RunEventType};
pub use history::{StepHistory, StepRecord};
pub use layout::{LayoutView, PanelLayout, PanelModel, PanelRow, SharedLayout};
pub use optimizer::{build_optimizer, Fittest, TiltOptimizer};
pub use scheduler::{
    Continuation, RunHandle, RunOutcome, RunReport, RunState, TerminationReason, TiltScheduler,
};
pub use snapshot::LayoutSnapshot;
pub use swarm::ParticleParameters;
pub use yield_model::ClearSkyYieldModel;
