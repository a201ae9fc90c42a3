//! Run events broadcast to observers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capacity of the run event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Event emitted by the scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    /// Run the event belongs to
    pub run_id: Uuid,
    /// Event type
    pub event_type: RunEventType,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl RunEvent {
    /// Create an event stamped now
    pub fn new(run_id: Uuid, event_type: RunEventType) -> Self {
        Self {
            run_id,
            event_type,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventType {
    Started {
        population_size: usize,
        dimensions: usize,
    },
    IndividualEvaluated {
        outer_step: usize,
        index: usize,
        fitness: f64,
        global_best: f64,
    },
    StepCompleted {
        step: usize,
        best_fitness: Option<f64>,
        global_best: Option<f64>,
    },
    Paused,
    Resumed,
    Completed {
        converged: bool,
        best_fitness: Option<f64>,
        evaluations: u64,
    },
    Aborted {
        evaluations: u64,
        reason: String,
    },
}
