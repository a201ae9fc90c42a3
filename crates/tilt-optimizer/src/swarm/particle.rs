//! Particle state for swarm optimization

use serde::{Deserialize, Serialize};

/// Particle parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleParameters {
    /// Maximum absolute velocity per component
    pub velocity_clamp: f64,
    /// Initial velocities are drawn from ±this range
    pub velocity_init_range: f64,
}

impl Default for ParticleParameters {
    fn default() -> Self {
        Self {
            velocity_clamp: 0.1,
            velocity_init_range: 0.05,
        }
    }
}

/// Particle in the swarm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Current position
    pub position: Vec<f64>,
    /// Velocity vector
    pub velocity: Vec<f64>,
    /// Personal best position
    pub personal_best: Vec<f64>,
    /// Personal best fitness
    pub personal_best_fitness: f64,
    /// Fitness of the last evaluated position
    pub fitness: Option<f64>,
}

impl Particle {
    /// Create new particle whose personal best is its starting position
    pub fn new(position: Vec<f64>, velocity: Vec<f64>) -> Self {
        Self {
            personal_best: position.clone(),
            position,
            velocity,
            personal_best_fitness: f64::NEG_INFINITY,
            fitness: None,
        }
    }

    /// Record a fitness, replacing the personal best on strict improvement
    pub fn update_personal_best(&mut self, fitness: f64) -> bool {
        self.fitness = Some(fitness);
        if fitness > self.personal_best_fitness {
            self.personal_best = self.position.clone();
            self.personal_best_fitness = fitness;
            return true;
        }
        false
    }

    /// Apply velocity constraints
    pub fn clamp_velocity(&mut self, clamp_value: f64) {
        for velocity in &mut self.velocity {
            *velocity = velocity.clamp(-clamp_value, clamp_value);
        }
    }

    /// Keep every position component within [0, 1]
    pub fn clamp_position(&mut self) {
        for value in &mut self.position {
            *value = value.clamp(0.0, 1.0);
        }
    }
}
