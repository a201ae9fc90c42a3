//! Velocity update operations for particle swarm optimization

use super::particle::{Particle, ParticleParameters};
use parking_lot::RwLock;
use rand::{rngs::StdRng, Rng};
use std::sync::Arc;

/// Coefficients of the velocity update
#[derive(Debug, Clone, Copy)]
pub struct VelocityCoefficients {
    /// Inertia weight
    pub inertia: f64,
    /// Cognitive (personal best) influence
    pub cognitive: f64,
    /// Social (global best) influence
    pub social: f64,
}

/// Velocity updater for particle swarm optimization
pub struct VelocityUpdater {
    /// Random number generator
    rng: Arc<RwLock<StdRng>>,
}

impl VelocityUpdater {
    /// Create new velocity updater
    pub fn new(rng: Arc<RwLock<StdRng>>) -> Self {
        Self { rng }
    }

    /// Update one particle's velocity with the PSO formula
    ///
    /// `v = w·v + c1·r1·(pbest − x) + c2·r2·(gbest − x)` per component, with
    /// fresh `r1, r2 ~ U[0, 1]` each, then clamped to ±`velocity_clamp`.
    pub fn update_velocity(
        &self,
        particle: &mut Particle,
        global_best: &[f64],
        coefficients: VelocityCoefficients,
        particle_params: &ParticleParameters,
    ) {
        let mut rng = self.rng.write();

        for i in 0..particle.velocity.len() {
            let r1: f64 = rng.gen();
            let r2: f64 = rng.gen();
            let x = particle.position[i];
            let pbest = particle.personal_best.get(i).copied().unwrap_or(x);
            let gbest = global_best.get(i).copied().unwrap_or(x);

            particle.velocity[i] = coefficients.inertia * particle.velocity[i]
                + coefficients.cognitive * r1 * (pbest - x)
                + coefficients.social * r2 * (gbest - x);
        }

        particle.clamp_velocity(particle_params.velocity_clamp);
    }

    /// Move the particle by its velocity, keeping it inside [0, 1]
    pub fn apply_velocity(&self, particle: &mut Particle) {
        for (value, velocity) in particle.position.iter_mut().zip(&particle.velocity) {
            *value += velocity;
        }
        particle.clamp_position();
    }

    /// Relocate the particle uniformly within ±`radius` of `center`
    pub fn relocate_near(&self, particle: &mut Particle, center: &[f64], radius: f64) {
        let mut rng = self.rng.write();
        for (value, &c) in particle.position.iter_mut().zip(center) {
            *value = c + rng.gen_range(-radius..=radius);
        }
        drop(rng);
        particle.clamp_position();
    }

    /// Initialize particle velocities randomly
    pub fn initialize_velocities(
        &self,
        velocity_size: usize,
        particle_params: &ParticleParameters,
    ) -> Vec<f64> {
        let range = particle_params
            .velocity_init_range
            .min(particle_params.velocity_clamp);
        if range <= 0.0 {
            return vec![0.0; velocity_size];
        }

        let mut rng = self.rng.write();
        (0..velocity_size)
            .map(|_| rng.gen_range(-range..=range))
            .collect()
    }
}
