//! Per-step history of an optimization run

use crate::population::Individual;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of the run at the end of one outer step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Outer step index; 0 is the initial population
    pub step: usize,
    /// Fittest position evaluated during this step
    pub best_position_of_step: Option<Vec<f64>>,
    /// Fitness of `best_position_of_step`
    pub best_fitness_of_step: Option<f64>,
    /// Best position seen so far in the run
    pub global_best_position: Option<Vec<f64>>,
    /// Best fitness seen so far in the run
    pub global_best_fitness: Option<f64>,
    /// Individuals as evaluated during this step
    pub population: Vec<Individual>,
    /// Mean fitness of the individuals evaluated during this step
    pub average_fitness: Option<f64>,
    /// Evaluations performed up to and including this step
    pub evaluations: u64,
    /// True when the step was cut short by convergence
    pub partial: bool,
    /// When the record was taken
    pub recorded_at: DateTime<Utc>,
}

impl StepRecord {
    /// Record for the initial, unevaluated population
    pub fn initial(population: Vec<Individual>) -> Self {
        Self {
            step: 0,
            best_position_of_step: None,
            best_fitness_of_step: None,
            global_best_position: None,
            global_best_fitness: None,
            population,
            average_fitness: None,
            evaluations: 0,
            partial: false,
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only history of a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepHistory {
    records: Vec<StepRecord>,
}

impl StepHistory {
    /// Start a history with the initial population
    pub fn new(initial: StepRecord) -> Self {
        Self {
            records: vec![initial],
        }
    }

    /// Append a record
    pub fn push(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    /// All records, oldest first
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Number of records including the initial one
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing has been recorded
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent record
    pub fn latest(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    /// Best fitness of each evaluated step
    pub fn best_fitness_series(&self) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|record| record.best_fitness_of_step)
            .collect()
    }

    /// Global best after each evaluated step
    pub fn global_best_series(&self) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|record| record.global_best_fitness)
            .collect()
    }
}
