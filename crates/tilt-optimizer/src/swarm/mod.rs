//! Particle swarm optimizer over normalized tilt vectors
//!
//! Particles are visited in index order. Each fitness report updates the
//! particle's personal best and the swarm's global best, runs the
//! convergence test, and then moves the particle in preparation for its next
//! visit. In local-radius mode the move is a uniform draw around the global
//! best instead of a velocity step.

mod particle;
mod velocity;

pub use particle::{Particle, ParticleParameters};
pub use velocity::{VelocityCoefficients, VelocityUpdater};

use crate::config::{Algorithm, RunConfig, SearchMode};
use crate::convergence::ConvergenceMonitor;
use crate::optimizer::{improve, seeded_rng, Fittest, TiltOptimizer};
use crate::population::{initial_positions, Individual, Population};
use tracing::{debug, warn};

/// Particle swarm optimizer
pub struct ParticleSwarm {
    particles: Vec<Particle>,
    global_best: Option<Fittest>,
    monitor: ConvergenceMonitor,
    updater: VelocityUpdater,
    coefficients: VelocityCoefficients,
    particle_params: ParticleParameters,
    search: SearchMode,
    completed_steps: usize,
    maximum_steps: usize,
}

impl ParticleSwarm {
    /// Create a swarm whose first particle sits at `seed_position`
    pub fn new(config: &RunConfig, seed_position: &[f64]) -> Self {
        let rng = seeded_rng(config.seed);
        let updater = VelocityUpdater::new(rng.clone());
        let particle_params = config.swarm.particle.clone();

        let positions = {
            let mut rng = rng.write();
            initial_positions(
                &mut *rng,
                seed_position,
                config.population_size,
                config.search,
            )
        };

        let particles = positions
            .into_iter()
            .map(|position| {
                let velocity = updater.initialize_velocities(position.len(), &particle_params);
                Particle::new(position, velocity)
            })
            .collect();

        Self {
            particles,
            global_best: None,
            monitor: ConvergenceMonitor::new(config.population_size, config.convergence_threshold),
            updater,
            coefficients: VelocityCoefficients {
                inertia: config.swarm.inertia_weight,
                cognitive: config.swarm.cognitive_influence,
                social: config.swarm.social_influence,
            },
            particle_params,
            search: config.search,
            completed_steps: 0,
            maximum_steps: config.maximum_steps,
        }
    }

    /// Particles in index order
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Prepare particle `index` for its next visit
    fn advance_particle(&mut self, index: usize) {
        let Some(global_best) = self.global_best.as_ref() else {
            return;
        };
        let particle = &mut self.particles[index];

        match self.search {
            SearchMode::GlobalUniform => {
                self.updater.update_velocity(
                    particle,
                    &global_best.position,
                    self.coefficients,
                    &self.particle_params,
                );
                self.updater.apply_velocity(particle);
            }
            SearchMode::LocalRadius { radius } => {
                self.updater
                    .relocate_near(particle, &global_best.position, radius);
            }
        }
    }
}

impl TiltOptimizer for ParticleSwarm {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ParticleSwarm
    }

    fn dimensions(&self) -> usize {
        self.particles
            .first()
            .map(|particle| particle.position.len())
            .unwrap_or(0)
    }

    fn population_size(&self) -> usize {
        self.particles.len()
    }

    fn next_individual(&self, index: usize) -> &[f64] {
        &self.particles[index].position
    }

    fn record_fitness(&mut self, index: usize, fitness: f64) {
        let Some(particle) = self.particles.get_mut(index) else {
            warn!(index, "Fitness reported for unknown particle");
            return;
        };

        particle.update_personal_best(fitness);
        if improve(&mut self.global_best, &particle.position, fitness) {
            debug!(index, fitness, "New global best");
        }

        if !self.monitor.observe(index, fitness) {
            self.advance_particle(index);
        }
    }

    fn complete_step(&mut self) {
        self.completed_steps += 1;
        debug!(
            step = self.completed_steps,
            best = self.global_best.as_ref().map(|best| best.fitness),
            spread = self.monitor.spread(),
            "Swarm step completed"
        );
    }

    fn completed_steps(&self) -> usize {
        self.completed_steps
    }

    fn is_converged(&self) -> bool {
        self.monitor.is_converged()
    }

    fn is_budget_exhausted(&self) -> bool {
        self.completed_steps >= self.maximum_steps
    }

    fn fittest(&self) -> Option<Fittest> {
        self.global_best.clone()
    }

    /// Positions queued for the next visit, with each particle's latest fitness
    fn population(&self) -> Population {
        let individuals = self
            .particles
            .iter()
            .map(|particle| Individual {
                position: particle.position.clone(),
                fitness: particle.fitness,
            })
            .collect();
        let mut population = Population::from_individuals(individuals);
        population.generation = self.completed_steps as u64;
        population
    }
}
