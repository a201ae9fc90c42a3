//! Parent selection strategies
//!
//! Strategies return indices into the evaluated generation so the caller
//! decides whether to clone positions.

use crate::config::SelectionMethod;
use crate::population::Individual;
use rand::seq::index::sample;
use rand::Rng;

/// Selection strategy trait
pub trait SelectionStrategy: Send + Sync {
    /// Select `count` parent indices from `population`
    ///
    /// Returns an empty vector when the population is empty.
    fn select(&self, rng: &mut dyn rand::RngCore, population: &[Individual], count: usize) -> Vec<usize>;

    /// Get the name of this selection strategy
    fn name(&self) -> &'static str;
}

fn fitness_of(individual: &Individual) -> f64 {
    individual.fitness.unwrap_or(f64::NEG_INFINITY)
}

/// Tournament selection strategy
///
/// Draws `tournament_size` distinct contestants and keeps the fittest.
#[derive(Debug, Clone)]
pub struct TournamentSelection {
    /// Tournament size
    pub tournament_size: usize,
}

impl TournamentSelection {
    /// Create a new tournament selection; sizes below 1 are raised to 1
    pub fn new(tournament_size: usize) -> Self {
        Self {
            tournament_size: tournament_size.max(1),
        }
    }
}

impl SelectionStrategy for TournamentSelection {
    fn select(&self, rng: &mut dyn rand::RngCore, population: &[Individual], count: usize) -> Vec<usize> {
        if population.is_empty() {
            return Vec::new();
        }

        let size = self.tournament_size.min(population.len());
        (0..count)
            .map(|_| {
                let contestants = sample(&mut *rng, population.len(), size);
                contestants
                    .iter()
                    .fold(None, |best: Option<usize>, idx| match best {
                        Some(current) if fitness_of(&population[current]) >= fitness_of(&population[idx]) => {
                            Some(current)
                        }
                        _ => Some(idx),
                    })
                    .unwrap_or(0)
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "Tournament"
    }
}

/// Roulette wheel selection strategy
///
/// Probability is proportional to fitness. Fitness values are shifted so the
/// weakest evaluated individual still has a positive weight; unevaluated
/// individuals are never picked unless nothing has been evaluated.
#[derive(Debug, Clone, Default)]
pub struct RouletteSelection;

impl SelectionStrategy for RouletteSelection {
    fn select(&self, rng: &mut dyn rand::RngCore, population: &[Individual], count: usize) -> Vec<usize> {
        if population.is_empty() {
            return Vec::new();
        }

        let min_fitness = population
            .iter()
            .filter_map(|ind| ind.fitness)
            .fold(f64::INFINITY, f64::min);
        let shift = if min_fitness <= 0.0 {
            -min_fitness + 1.0
        } else {
            0.0
        };
        let adjusted: Vec<f64> = population
            .iter()
            .map(|ind| ind.fitness.map_or(0.0, |f| f + shift))
            .collect();
        let total: f64 = adjusted.iter().sum();

        (0..count)
            .map(|_| {
                if !(total > 0.0 && total.is_finite()) {
                    return rng.gen_range(0..population.len());
                }

                let mut spin = rng.gen::<f64>() * total;
                let mut last_weighted = 0;
                for (i, &weight) in adjusted.iter().enumerate() {
                    if weight <= 0.0 {
                        continue;
                    }
                    last_weighted = i;
                    spin -= weight;
                    if spin <= 0.0 {
                        return i;
                    }
                }
                last_weighted
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "Roulette"
    }
}

/// Strategy matching a configured selection method
pub fn strategy_for(method: SelectionMethod) -> Box<dyn SelectionStrategy> {
    match method {
        SelectionMethod::RouletteWheel => Box::new(RouletteSelection),
        SelectionMethod::Tournament { size } => Box::new(TournamentSelection::new(size)),
    }
}
