//! Fitness-spread convergence test

use serde::{Deserialize, Serialize};

/// Tracks the latest fitness of every individual and detects convergence
///
/// The spread is `max - min` over the latest fitness of each individual and
/// is only defined once every individual has been evaluated at least once.
/// Convergence is latched: once reached it stays reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceMonitor {
    threshold: f64,
    latest: Vec<Option<f64>>,
    converged: bool,
}

impl ConvergenceMonitor {
    /// Create a monitor for `size` individuals
    pub fn new(size: usize, threshold: f64) -> Self {
        Self {
            threshold,
            latest: vec![None; size],
            converged: false,
        }
    }

    /// Record a fitness and return whether the population has converged
    pub fn observe(&mut self, index: usize, fitness: f64) -> bool {
        if let Some(slot) = self.latest.get_mut(index) {
            *slot = Some(fitness);
        }
        if !self.converged {
            if let Some(spread) = self.spread() {
                self.converged = spread < self.threshold;
            }
        }
        self.converged
    }

    /// Current spread, `None` until every individual has a fitness
    pub fn spread(&self) -> Option<f64> {
        if self.latest.is_empty() {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for value in &self.latest {
            let value = (*value)?;
            min = min.min(value);
            max = max.max(value);
        }
        Some(max - min)
    }

    /// Whether convergence has been reached
    #[inline]
    pub fn is_converged(&self) -> bool {
        self.converged
    }
}
