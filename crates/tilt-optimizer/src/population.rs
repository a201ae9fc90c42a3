//! Population of candidate tilt vectors

use crate::config::SearchMode;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One candidate vector of normalized tilt values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Normalized tilt per row, each in [0, 1]
    pub position: Vec<f64>,
    /// Latest fitness, `None` until evaluated
    pub fitness: Option<f64>,
}

impl Individual {
    /// Create an unevaluated individual
    pub fn new(position: Vec<f64>) -> Self {
        Self {
            position,
            fitness: None,
        }
    }

    /// Create an individual with known fitness
    pub fn with_fitness(position: Vec<f64>, fitness: f64) -> Self {
        Self {
            position,
            fitness: Some(fitness),
        }
    }
}

fn by_fitness(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Ordered, fixed-size collection of individuals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Population {
    /// Individuals in evaluation order
    pub individuals: Vec<Individual>,
    /// Current generation
    pub generation: u64,
}

impl Population {
    /// Create population from individuals
    pub fn from_individuals(individuals: Vec<Individual>) -> Self {
        Self {
            individuals,
            generation: 0,
        }
    }

    /// Get population size
    #[inline]
    pub fn size(&self) -> usize {
        self.individuals.len()
    }

    /// Indices of the top `n` evaluated individuals, best first
    pub fn select_top(&self, n: usize) -> Vec<usize> {
        let mut indexed: Vec<(usize, f64)> = self
            .individuals
            .iter()
            .enumerate()
            .filter_map(|(idx, i)| i.fitness.map(|f| (idx, f)))
            .collect();

        indexed.sort_by(|a, b| by_fitness(&b.1, &a.1));
        indexed.into_iter().take(n).map(|(idx, _)| idx).collect()
    }

    /// Mean fitness of the evaluated individuals
    pub fn average_fitness(&self) -> Option<f64> {
        let values: Vec<f64> = self.individuals.iter().filter_map(|i| i.fitness).collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Increment generation
    pub fn next_generation(&mut self) {
        self.generation += 1;
    }
}

/// Draw one position according to the search mode
///
/// Global mode samples every component uniformly from [0, 1]; local mode
/// samples within `±radius` of `center`, clamped to [0, 1].
pub fn sample_position<R: Rng + ?Sized>(rng: &mut R, center: &[f64], search: SearchMode) -> Vec<f64> {
    match search {
        SearchMode::GlobalUniform => (0..center.len()).map(|_| rng.gen::<f64>()).collect(),
        SearchMode::LocalRadius { radius } => center
            .iter()
            .map(|&c| (c + rng.gen_range(-radius..=radius)).clamp(0.0, 1.0))
            .collect(),
    }
}

/// Initial positions: index 0 is `seed`, the rest are sampled around it
pub fn initial_positions<R: Rng + ?Sized>(
    rng: &mut R,
    seed: &[f64],
    size: usize,
    search: SearchMode,
) -> Vec<Vec<f64>> {
    let first = seed.iter().map(|v| v.clamp(0.0, 1.0)).collect::<Vec<_>>();
    let mut positions = Vec::with_capacity(size);
    if size == 0 {
        return positions;
    }
    positions.push(first.clone());
    for _ in 1..size {
        positions.push(sample_position(rng, &first, search));
    }
    positions
}
