//! Generational genetic algorithm over normalized tilt vectors
//!
//! A generation is evaluated one individual at a time. Once the scheduler
//! closes the step, elites are carried over unchanged and the rest of the next
//! generation is bred by selection, uniform crossover and mutation.

mod operators;
mod selection;

pub use operators::{mutate, uniform_crossover};
pub use selection::{strategy_for, RouletteSelection, SelectionStrategy, TournamentSelection};

use crate::config::{Algorithm, GeneticParameters, RunConfig, SearchMode};
use crate::convergence::ConvergenceMonitor;
use crate::optimizer::{improve, seeded_rng, Fittest, TiltOptimizer};
use crate::population::{initial_positions, Individual, Population};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::{debug, warn};

/// Genetic algorithm optimizer
pub struct GeneticOptimizer {
    rng: Arc<RwLock<StdRng>>,
    population: Population,
    selection: Box<dyn SelectionStrategy>,
    params: GeneticParameters,
    search: SearchMode,
    threshold: f64,
    monitor: ConvergenceMonitor,
    best: Option<Fittest>,
    completed_steps: usize,
    maximum_steps: usize,
}

impl GeneticOptimizer {
    /// Create an optimizer whose first individual is `seed_position`
    pub fn new(config: &RunConfig, seed_position: &[f64]) -> Self {
        let rng = seeded_rng(config.seed);
        let positions = {
            let mut rng = rng.write();
            initial_positions(
                &mut *rng,
                seed_position,
                config.population_size,
                config.search,
            )
        };

        Self {
            rng,
            population: Population::from_individuals(
                positions.into_iter().map(Individual::new).collect(),
            ),
            selection: strategy_for(config.genetic.selection),
            params: config.genetic.clone(),
            search: config.search,
            threshold: config.convergence_threshold,
            monitor: ConvergenceMonitor::new(config.population_size, config.convergence_threshold),
            best: None,
            completed_steps: 0,
            maximum_steps: config.maximum_steps,
        }
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.population.generation
    }

    /// Produce the next generation from the evaluated one
    fn breed(&mut self) {
        let size = self.population.size();
        let evaluated = &self.population.individuals;
        let mut next: Vec<Individual> = self
            .population
            .select_top(self.params.elite_count.min(size))
            .into_iter()
            .map(|idx| Individual::new(evaluated[idx].position.clone()))
            .collect();

        let mut rng = self.rng.write();
        let needed = size - next.len();
        let parents = self
            .selection
            .select(&mut *rng, evaluated, needed + needed % 2);

        let mut mutated = 0;
        for pair in parents.chunks(2) {
            let (first, second) = match pair {
                [a, b] => (&evaluated[*a].position, &evaluated[*b].position),
                [a] => (&evaluated[*a].position, &evaluated[*a].position),
                _ => continue,
            };
            let (left, right) =
                uniform_crossover(&mut *rng, first, second, self.params.crossover_rate);
            for mut child in [left, right] {
                if next.len() >= size {
                    break;
                }
                mutated += mutate(&mut *rng, &mut child, self.params.mutation_rate, self.search);
                next.push(Individual::new(child));
            }
        }
        drop(rng);

        if next.len() < size {
            warn!(
                bred = next.len(),
                size, "Selection produced too few parents, padding with the best"
            );
            let filler = self
                .best
                .as_ref()
                .map(|best| best.position.clone())
                .unwrap_or_else(|| evaluated[0].position.clone());
            next.resize_with(size, || Individual::new(filler.clone()));
        }

        self.population.individuals = next;
        self.population.next_generation();
        let generation = self.population.generation;
        self.monitor = ConvergenceMonitor::new(size, self.threshold);

        debug!(
            generation,
            elites = self.params.elite_count,
            selection = self.selection.name(),
            mutated,
            "Bred next generation"
        );
    }
}

impl TiltOptimizer for GeneticOptimizer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Genetic
    }

    fn dimensions(&self) -> usize {
        self.population
            .individuals
            .first()
            .map(|individual| individual.position.len())
            .unwrap_or(0)
    }

    fn population_size(&self) -> usize {
        self.population.size()
    }

    fn next_individual(&self, index: usize) -> &[f64] {
        &self.population.individuals[index].position
    }

    fn record_fitness(&mut self, index: usize, fitness: f64) {
        let Some(individual) = self.population.individuals.get_mut(index) else {
            warn!(index, "Fitness reported for unknown individual");
            return;
        };

        individual.fitness = Some(fitness);
        if improve(&mut self.best, &individual.position, fitness) {
            debug!(index, fitness, "New best individual");
        }
        self.monitor.observe(index, fitness);
    }

    fn complete_step(&mut self) {
        self.completed_steps += 1;
        if self.is_converged() || self.is_budget_exhausted() {
            return;
        }
        self.breed();
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
        self.best.clone()
    }

    fn population(&self) -> Population {
        self.population.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectionMethod;

    fn config(size: usize, elite_count: usize) -> RunConfig {
        RunConfig::builder()
            .algorithm(Algorithm::Genetic)
            .population_size(size)
            .maximum_steps(5)
            .convergence_threshold(0.0)
            .genetic(GeneticParameters {
                selection: SelectionMethod::Tournament { size: 2 },
                crossover_rate: 0.9,
                mutation_rate: 0.2,
                elite_count,
            })
            .seed(17)
            .build()
            .unwrap()
    }

    fn evaluate_generation(optimizer: &mut GeneticOptimizer) {
        for index in 0..optimizer.population_size() {
            let position = optimizer.next_individual(index).to_vec();
            let fitness = -(position[0] - 0.7).powi(2);
            optimizer.record_fitness(index, fitness);
        }
    }

    #[test]
    fn test_breeding_keeps_size_and_bounds() {
        let mut optimizer = GeneticOptimizer::new(&config(7, 2), &[0.5, 0.5]);
        evaluate_generation(&mut optimizer);
        optimizer.complete_step();

        let population = optimizer.population();
        assert_eq!(population.size(), 7);
        assert_eq!(population.generation, 1);
        assert!(population.individuals.iter().all(|i| i.fitness.is_none()));
        assert!(population
            .individuals
            .iter()
            .flat_map(|i| i.position.iter())
            .all(|g| (0.0..=1.0).contains(g)));
    }

    #[test]
    fn test_elite_is_carried_over() {
        let mut optimizer = GeneticOptimizer::new(&config(6, 1), &[0.5]);
        evaluate_generation(&mut optimizer);
        let best = optimizer.fittest().unwrap();
        optimizer.complete_step();

        assert_eq!(optimizer.next_individual(0), best.position.as_slice());
    }

    #[test]
    fn test_best_never_regresses() {
        let mut optimizer = GeneticOptimizer::new(&config(8, 1), &[0.1]);
        let mut previous = f64::NEG_INFINITY;
        for _ in 0..4 {
            evaluate_generation(&mut optimizer);
            let best = optimizer.fittest().unwrap().fitness;
            assert!(best >= previous);
            previous = best;
            optimizer.complete_step();
        }
    }

    #[test]
    fn test_no_breeding_after_budget() {
        let config = RunConfig {
            maximum_steps: 1,
            ..config(4, 1)
        };
        let mut optimizer = GeneticOptimizer::new(&config, &[0.5]);
        evaluate_generation(&mut optimizer);
        optimizer.complete_step();

        assert!(optimizer.is_budget_exhausted());
        assert_eq!(optimizer.generation(), 0);
        assert!(optimizer
            .population()
            .individuals
            .iter()
            .all(|i| i.fitness.is_some()));
    }
}
