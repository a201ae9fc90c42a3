//! Configuration for tilt optimization runs

use crate::error::{TiltOptimizerError, TiltOptimizerResult};
use crate::evaluator::ObjectiveKind;
use crate::swarm::ParticleParameters;
use serde::{Deserialize, Serialize};

/// Search strategy driving a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Particle swarm optimization
    #[default]
    ParticleSwarm,
    /// Generational genetic algorithm
    Genetic,
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::ParticleSwarm => write!(f, "particle swarm"),
            Algorithm::Genetic => write!(f, "genetic"),
        }
    }
}

/// How new candidate positions are drawn
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchMode {
    /// Anywhere in the unit hypercube
    #[default]
    GlobalUniform,
    /// Within `radius` of a reference position, per component
    LocalRadius { radius: f64 },
}

/// Swarm coefficients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmParameters {
    /// Inertia weight applied to the previous velocity
    pub inertia_weight: f64,
    /// Pull towards the particle's personal best
    pub cognitive_influence: f64,
    /// Pull towards the swarm's global best
    pub social_influence: f64,
    /// Velocity clamp and initialization
    pub particle: ParticleParameters,
}

impl Default for SwarmParameters {
    fn default() -> Self {
        Self {
            inertia_weight: 0.729,
            cognitive_influence: 1.49445,
            social_influence: 1.49445,
            particle: ParticleParameters::default(),
        }
    }
}

/// Parent selection for the genetic algorithm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Fitness-proportional selection
    RouletteWheel,
    /// Best of `size` random contestants
    Tournament { size: usize },
}

impl Default for SelectionMethod {
    fn default() -> Self {
        SelectionMethod::Tournament { size: 3 }
    }
}

/// Genetic algorithm parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticParameters {
    /// Probability that a parent pair is recombined
    pub crossover_rate: f64,
    /// Per-gene mutation probability
    pub mutation_rate: f64,
    /// Individuals copied unchanged into the next generation
    pub elite_count: usize,
    /// Parent selection
    pub selection: SelectionMethod,
}

impl Default for GeneticParameters {
    fn default() -> Self {
        Self {
            crossover_rate: 0.9,
            mutation_rate: 0.1,
            elite_count: 1,
            selection: SelectionMethod::default(),
        }
    }
}

/// Immutable configuration of one optimization run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Search strategy
    pub algorithm: Algorithm,
    /// Yield objective to maximize
    pub objective: ObjectiveKind,
    /// Particles or individuals per outer step
    pub population_size: usize,
    /// Outer step (generation) budget
    #[serde(alias = "maximum_generations")]
    pub maximum_steps: usize,
    /// Fitness spread below which the run is converged
    pub convergence_threshold: f64,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
    /// Candidate sampling mode
    pub search: SearchMode,
    /// Swarm coefficients
    pub swarm: SwarmParameters,
    /// Genetic algorithm parameters
    pub genetic: GeneticParameters,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            objective: ObjectiveKind::default(),
            population_size: 20,
            maximum_steps: 10,
            convergence_threshold: 1e-3,
            seed: None,
            search: SearchMode::default(),
            swarm: SwarmParameters::default(),
            genetic: GeneticParameters::default(),
        }
    }
}

fn invalid(message: impl Into<String>) -> TiltOptimizerError {
    TiltOptimizerError::InvalidConfiguration {
        message: message.into(),
    }
}

fn check_unit(name: &str, value: f64) -> TiltOptimizerResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{name} must be within [0, 1], got {value}")));
    }
    Ok(())
}

impl RunConfig {
    /// Validate configuration
    pub fn validate(&self) -> TiltOptimizerResult<()> {
        if self.population_size == 0 {
            return Err(invalid("Population size must be greater than 0"));
        }

        if self.maximum_steps == 0 {
            return Err(invalid("Maximum steps must be greater than 0"));
        }

        if !self.convergence_threshold.is_finite() || self.convergence_threshold < 0.0 {
            return Err(invalid("Convergence threshold must be a non-negative number"));
        }

        if let SearchMode::LocalRadius { radius } = self.search {
            if !(radius > 0.0 && radius <= 1.0) {
                return Err(invalid(format!(
                    "Search radius must be within (0, 1], got {radius}"
                )));
            }
        }

        match self.algorithm {
            Algorithm::ParticleSwarm => self.validate_swarm(),
            Algorithm::Genetic => self.validate_genetic(),
        }
    }

    fn validate_swarm(&self) -> TiltOptimizerResult<()> {
        let swarm = &self.swarm;
        check_unit("Inertia weight", swarm.inertia_weight)?;

        for (name, value) in [
            ("Cognitive influence", swarm.cognitive_influence),
            ("Social influence", swarm.social_influence),
        ] {
            if !(0.0..=4.0).contains(&value) {
                return Err(invalid(format!("{name} must be within [0, 4], got {value}")));
            }
        }

        let particle = &swarm.particle;
        if !(particle.velocity_clamp > 0.0 && particle.velocity_clamp <= 1.0) {
            return Err(invalid("Velocity clamp must be within (0, 1]"));
        }
        if !(0.0..=particle.velocity_clamp).contains(&particle.velocity_init_range) {
            return Err(invalid(
                "Velocity init range must be within [0, velocity clamp]",
            ));
        }
        Ok(())
    }

    fn validate_genetic(&self) -> TiltOptimizerResult<()> {
        let genetic = &self.genetic;
        check_unit("Crossover rate", genetic.crossover_rate)?;
        check_unit("Mutation rate", genetic.mutation_rate)?;

        if genetic.elite_count >= self.population_size {
            return Err(invalid("Elite count must be smaller than the population size"));
        }
        if let SelectionMethod::Tournament { size } = genetic.selection {
            if size == 0 {
                return Err(invalid("Tournament size must be at least 1"));
            }
        }
        Ok(())
    }

    /// Create a builder for the configuration
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }
}

/// Builder for RunConfig
#[derive(Default)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    /// Set the search strategy
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    /// Set the yield objective
    pub fn objective(mut self, objective: ObjectiveKind) -> Self {
        self.config.objective = objective;
        self
    }

    /// Set population size
    pub fn population_size(mut self, size: usize) -> Self {
        self.config.population_size = size;
        self
    }

    /// Set outer step budget
    pub fn maximum_steps(mut self, steps: usize) -> Self {
        self.config.maximum_steps = steps;
        self
    }

    /// Set convergence threshold
    pub fn convergence_threshold(mut self, threshold: f64) -> Self {
        self.config.convergence_threshold = threshold;
        self
    }

    /// Set search mode
    pub fn search(mut self, search: SearchMode) -> Self {
        self.config.search = search;
        self
    }

    /// Set swarm coefficients
    pub fn swarm(mut self, swarm: SwarmParameters) -> Self {
        self.config.swarm = swarm;
        self
    }

    /// Set velocity clamp, shrinking the init range if it would exceed it
    pub fn velocity_clamp(mut self, clamp: f64) -> Self {
        let particle = &mut self.config.swarm.particle;
        particle.velocity_clamp = clamp;
        particle.velocity_init_range = particle.velocity_init_range.min(clamp);
        self
    }

    /// Set genetic algorithm parameters
    pub fn genetic(mut self, genetic: GeneticParameters) -> Self {
        self.config.genetic = genetic;
        self
    }

    /// Set seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Build the configuration
    pub fn build(self) -> TiltOptimizerResult<RunConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
