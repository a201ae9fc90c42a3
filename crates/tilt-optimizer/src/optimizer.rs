//! Optimizer core abstraction shared by the search strategies
//!
//! The scheduler drives an optimizer one individual at a time: it asks for
//! the position of index `i`, evaluates it externally, feeds the fitness back
//! with [`TiltOptimizer::record_fitness`], and calls
//! [`TiltOptimizer::complete_step`] after the last index of an outer step.

use crate::config::{Algorithm, RunConfig};
use crate::error::{TiltOptimizerError, TiltOptimizerResult};
use crate::genetic::GeneticOptimizer;
use crate::population::Population;
use crate::swarm::ParticleSwarm;
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Best position found so far and its fitness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fittest {
    /// Normalized tilt per row
    pub position: Vec<f64>,
    /// Fitness of `position`
    pub fitness: f64,
}

/// Incremental search strategy over normalized tilt vectors
pub trait TiltOptimizer: Send {
    /// Strategy implemented by this optimizer
    fn algorithm(&self) -> Algorithm;

    /// Number of components per position
    fn dimensions(&self) -> usize;

    /// Individuals per outer step
    fn population_size(&self) -> usize;

    /// Position to evaluate for `index` in the current step
    fn next_individual(&self, index: usize) -> &[f64];

    /// Feed back the fitness of the individual at `index`
    fn record_fitness(&mut self, index: usize, fitness: f64);

    /// Close the current outer step
    fn complete_step(&mut self);

    /// Outer steps completed so far
    fn completed_steps(&self) -> usize;

    /// Whether the fitness spread has fallen below the threshold
    fn is_converged(&self) -> bool;

    /// Whether the outer step budget is used up
    fn is_budget_exhausted(&self) -> bool;

    /// Best position ever evaluated
    fn fittest(&self) -> Option<Fittest>;

    /// Current individuals with their latest fitness
    fn population(&self) -> Population;
}

/// Shared random number generator seeded from the configuration
pub(crate) fn seeded_rng(seed: Option<u64>) -> Arc<RwLock<StdRng>> {
    let seed = seed.unwrap_or_else(rand::random);
    Arc::new(RwLock::new(StdRng::seed_from_u64(seed)))
}

/// Replace the best if `fitness` is a strict improvement
pub(crate) fn improve(best: &mut Option<Fittest>, position: &[f64], fitness: f64) -> bool {
    let better = best.as_ref().map_or(true, |current| fitness > current.fitness);
    if better {
        *best = Some(Fittest {
            position: position.to_vec(),
            fitness,
        });
    }
    better
}

/// Build the optimizer selected by `config`, seeded with `seed_position`
pub fn build_optimizer(
    config: &RunConfig,
    seed_position: &[f64],
) -> TiltOptimizerResult<Box<dyn TiltOptimizer>> {
    config.validate()?;
    if seed_position.is_empty() {
        return Err(TiltOptimizerError::NoOptimizablePanels);
    }

    let optimizer: Box<dyn TiltOptimizer> = match config.algorithm {
        Algorithm::ParticleSwarm => Box::new(ParticleSwarm::new(config, seed_position)),
        Algorithm::Genetic => Box::new(GeneticOptimizer::new(config, seed_position)),
    };
    Ok(optimizer)
}
