//! # EvolutionEngine
//!
//! The generational loop: seed a population, evolve it under crossover,
//! mutation, constant optimization, and crowding selection, feed every
//! evaluated individual to the Pareto archive, and stop on convergence or
//! generation exhaustion. Evaluation is the only parallel step; variation
//! and selection are sequential, so the next population is a deterministic
//! function of the previous one plus the seeded random draws, regardless of
//! worker scheduling.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{GpsrError, Result, ResultExt};
use crate::evaluation::FitnessFunction;
use crate::expression::{Crossover, Generator, Individual, Mutation, Node};
use crate::pareto::ParetoFront;
use crate::rng::RandomNumberGenerator;
use crate::selection::CrowdingSelection;

use super::options::EvolutionOptions;

/// Lifecycle state of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// Population not yet seeded.
    Initializing,
    /// Generational loop in progress.
    Evolving,
    /// Stopped early: fitness threshold reached or search stagnated.
    Converged,
    /// Hit the hard generation limit without converging.
    Exhausted,
}

/// Final outcome of a run.
#[derive(Debug, Clone)]
pub struct EvolutionReport {
    pub state: EngineState,
    pub generations: usize,
    /// Best individual in the final population, if any is feasible.
    pub best: Option<Individual>,
    pub archive: ParetoFront,
}

/// Durable engine state written at the checkpoint cadence.
#[derive(Serialize, Deserialize)]
struct Checkpoint {
    generation: usize,
    population: Vec<Individual>,
    archive: ParetoFront,
}

/// Orchestrates one symbolic regression run.
pub struct EvolutionEngine<F: FitnessFunction> {
    options: EvolutionOptions,
    generator: Generator,
    crossover: Crossover,
    mutation: Mutation,
    selection: CrowdingSelection,
    evaluator: F,
    rng: RandomNumberGenerator,
    workers: rayon::ThreadPool,
    population: Vec<Individual>,
    archive: ParetoFront,
    generation: usize,
    state: EngineState,
    last_check_best: Option<f64>,
}

impl<F: FitnessFunction> EvolutionEngine<F> {
    /// Creates a fresh-start engine.
    ///
    /// # Errors
    ///
    /// Returns [`GpsrError::Configuration`] on invalid options, a generator
    /// whose stack size disagrees with the options, or a worker pool that
    /// cannot be built.
    pub fn new(options: EvolutionOptions, generator: Generator, evaluator: F) -> Result<Self> {
        options.validate()?;
        if generator.stack_size() != options.stack_size {
            return Err(GpsrError::Configuration(format!(
                "generator stack size {} does not match configured stack size {}",
                generator.stack_size(),
                options.stack_size
            )));
        }
        if let Some(base) = &options.checkpoint_base {
            if let Some(parent) = base.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
        }

        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(options.num_workers)
            .build()
            .map_err(|e| GpsrError::Configuration(format!("cannot build worker pool: {}", e)))?;
        let rng = match options.seed {
            Some(seed) => RandomNumberGenerator::from_seed(seed),
            None => RandomNumberGenerator::new(),
        };
        let mutation = Mutation::new(generator.pool().clone());

        Ok(Self {
            options,
            generator,
            crossover: Crossover::new(),
            mutation,
            selection: CrowdingSelection::new(),
            evaluator,
            rng,
            workers,
            population: Vec::new(),
            archive: ParetoFront::new(),
            generation: 0,
            state: EngineState::Initializing,
            last_check_best: None,
        })
    }

    /// Restores an engine from a checkpoint file.
    ///
    /// # Errors
    ///
    /// A missing, unreadable, or corrupt checkpoint is fatal:
    /// [`GpsrError::Checkpoint`] is returned and nothing is silently
    /// reconstructed from partial state.
    pub fn resume<P: AsRef<Path>>(
        path: P,
        options: EvolutionOptions,
        generator: Generator,
        evaluator: F,
    ) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            GpsrError::Checkpoint(format!("cannot read checkpoint {}: {}", path.display(), e))
        })?;
        let checkpoint: Checkpoint = serde_json::from_str(&content).map_err(|e| {
            GpsrError::Checkpoint(format!("corrupt checkpoint {}: {}", path.display(), e))
        })?;

        if checkpoint.population.len() != options.population_size {
            return Err(GpsrError::Checkpoint(format!(
                "checkpoint population size {} does not match configured size {}",
                checkpoint.population.len(),
                options.population_size
            )));
        }
        let input_dim = generator.pool().input_dim();
        for individual in &checkpoint.population {
            if individual.genotype().len() != options.stack_size {
                return Err(GpsrError::Checkpoint(format!(
                    "checkpoint genotype length {} does not match stack size {}",
                    individual.genotype().len(),
                    options.stack_size
                )));
            }
            for node in individual.genotype() {
                if let Node::Variable(j) = node {
                    if *j >= input_dim {
                        return Err(GpsrError::Checkpoint(format!(
                            "checkpoint references input feature {} but the data has {}",
                            j, input_dim
                        )));
                    }
                }
            }
            // Serde bypasses construction-time validation; redo it.
            Individual::new(individual.genotype().to_vec(), individual.constants().to_vec())
                .map_err(|e| {
                    GpsrError::Checkpoint(format!("checkpoint holds invalid genotype: {}", e))
                })?;
        }

        let mut engine = Self::new(options, generator, evaluator)?;
        engine.population = checkpoint.population;
        engine.archive = checkpoint.archive;
        engine.generation = checkpoint.generation;
        engine.state = EngineState::Evolving;
        info!(
            generation = engine.generation,
            archive_len = engine.archive.len(),
            "resumed from checkpoint"
        );
        Ok(engine)
    }

    /// Runs the generational loop until convergence or exhaustion.
    pub fn run(&mut self) -> Result<EvolutionReport> {
        if self.population.is_empty() {
            self.initialize()?;
        }
        self.state = EngineState::Evolving;

        while self.generation < self.options.max_generations {
            self.step()?;
            if self.converged() {
                self.state = EngineState::Converged;
                break;
            }
        }
        if self.state != EngineState::Converged {
            self.state = EngineState::Exhausted;
            info!(
                generation = self.generation,
                "generation budget exhausted without convergence"
            );
        }
        Ok(self.report())
    }

    /// The current population.
    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    /// The accuracy/parsimony archive accumulated so far.
    pub fn archive(&self) -> &ParetoFront {
        &self.archive
    }

    /// Number of completed generations.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Seeds and evaluates the initial population and primes the archive.
    fn initialize(&mut self) -> Result<()> {
        let mut population = Vec::with_capacity(self.options.population_size);
        for _ in 0..self.options.population_size {
            population.push(self.generator.generate(&mut self.rng)?);
        }
        self.evaluate_population(&mut population);
        for individual in &population {
            self.archive.update(individual);
        }
        self.population = population;
        info!(
            population = self.population.len(),
            archive_len = self.archive.len(),
            "population initialized"
        );
        Ok(())
    }

    /// Runs one generation: variation, evaluation, selection, archiving,
    /// and (at the configured cadence) a checkpoint write.
    fn step(&mut self) -> Result<()> {
        // Reorder before pairing so lineages recombine across the whole
        // population over a run instead of the same fixed pairs every
        // generation. Selection works on this same ordering, so crowding
        // associations are unaffected.
        self.rng.shuffle(&mut self.population);
        let parents = self.population.clone();
        let mut offspring = parents.clone();

        for pair in offspring.chunks_mut(2) {
            if pair.len() == 2 && self.rng.gen_bool(self.options.crossover_rate) {
                let (first, second) = self.crossover.recombine(&pair[0], &pair[1], &mut self.rng)?;
                pair[0] = first;
                pair[1] = second;
            }
        }
        for individual in &mut offspring {
            if self.rng.gen_bool(self.options.mutation_rate) {
                self.mutation.mutate(individual, &mut self.rng);
            }
        }

        self.evaluate_population(&mut offspring);
        for individual in &offspring {
            self.archive.update(individual);
        }

        self.population = self.selection.select(&parents, &offspring)?;
        self.generation += 1;
        debug!(
            generation = self.generation,
            best = ?self.best_fitness(),
            archive_len = self.archive.len(),
            "generation complete"
        );

        if let (Some(frequency), Some(base)) = (
            self.options.checkpoint_frequency,
            self.options.checkpoint_base.clone(),
        ) {
            if self.generation % frequency == 0 {
                self.write_checkpoint(&base)?;
            }
        }
        Ok(())
    }

    /// Evaluates every not-yet-evaluated individual on the worker pool.
    /// Individuals are disjoint and the evaluator only reads shared state,
    /// so evaluation order cannot affect the outcome, only wall time.
    fn evaluate_population(&self, individuals: &mut [Individual]) {
        let evaluator = &self.evaluator;
        self.workers.install(|| {
            individuals.par_iter_mut().for_each(|individual| {
                if !individual.fitness().is_evaluated() {
                    evaluator.evaluate(individual);
                }
            });
        });
    }

    /// Best (lowest) feasible fitness in the current population.
    fn best_fitness(&self) -> Option<f64> {
        self.population
            .iter()
            .filter_map(|i| i.fitness().score())
            .filter(|s| s.is_finite())
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Convergence test, run every `check_frequency` generations once past
    /// `min_generations`: the fitness threshold has been reached, or the
    /// best fitness has not improved beyond the stagnation tolerance since
    /// the previous check.
    fn converged(&mut self) -> bool {
        if self.generation < self.options.min_generations
            || self.generation % self.options.check_frequency != 0
        {
            return false;
        }
        let Some(best) = self.best_fitness() else {
            self.last_check_best = None;
            return false;
        };
        if best <= self.options.fitness_threshold {
            info!(generation = self.generation, best, "fitness threshold reached");
            return true;
        }
        let stagnated = matches!(
            self.last_check_best,
            Some(previous) if previous - best <= self.options.stagnation_tolerance
        );
        self.last_check_best = Some(best);
        if stagnated {
            info!(generation = self.generation, best, "search stagnated");
        }
        stagnated
    }

    /// Writes the engine state next to any previous checkpoints, using
    /// write-then-rename so an interrupted write never corrupts a valid
    /// checkpoint file.
    fn write_checkpoint(&self, base: &Path) -> Result<()> {
        let checkpoint = Checkpoint {
            generation: self.generation,
            population: self.population.clone(),
            archive: self.archive.clone(),
        };
        let path = PathBuf::from(format!("{}_gen{}.json", base.display(), self.generation));
        let tmp = PathBuf::from(format!("{}.tmp", path.display()));

        let json = serde_json::to_string(&checkpoint).context("failed to serialize checkpoint")?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        info!(generation = self.generation, path = %path.display(), "checkpoint written");
        Ok(())
    }

    fn report(&self) -> EvolutionReport {
        let best = self
            .population
            .iter()
            .filter(|i| i.fitness().is_feasible())
            .min_by(|a, b| a.fitness().compare(&b.fitness()).reverse())
            .cloned();
        EvolutionReport {
            state: self.state,
            generations: self.generation,
            best,
            archive: self.archive.clone(),
        }
    }
}
