//! # EvolutionOptions
//!
//! Configuration for one symbolic regression run: population shape,
//! variation rates, convergence policy, worker-pool size, and checkpoint
//! cadence.
//!
//! ## Example
//!
//! ```rust
//! use gpsr::engine::EvolutionOptions;
//!
//! let options = EvolutionOptions::builder()
//!     .population_size(100)
//!     .stack_size(32)
//!     .max_generations(5000)
//!     .crossover_rate(0.4)
//!     .mutation_rate(0.4)
//!     .seed(7)
//!     .build();
//! assert!(options.validate().is_ok());
//! ```

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{GpsrError, Result};

/// Configuration options for an evolutionary symbolic regression run.
///
/// Defaults follow the reference displacement-field search: population 100,
/// stack size 32, hard stop at 5000 generations, convergence checked every
/// 500 generations after a 500-generation floor, and an unreachable fitness
/// threshold so runs converge on stagnation rather than accuracy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvolutionOptions {
    pub population_size: usize,
    pub stack_size: usize,
    pub max_generations: usize,
    /// Early-stop target; the run converges once the best population
    /// fitness (lower is better) reaches this value.
    pub fitness_threshold: f64,
    /// Generations between convergence checks.
    pub check_frequency: usize,
    /// Floor before any convergence check runs.
    pub min_generations: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    /// Parallel evaluation workers.
    pub num_workers: usize,
    /// Generations between checkpoint writes; `None` disables checkpointing.
    pub checkpoint_frequency: Option<usize>,
    /// Base path for checkpoint files; the generation tag is appended.
    pub checkpoint_base: Option<PathBuf>,
    /// Improvement below this value between two consecutive convergence
    /// checks counts as stagnation.
    pub stagnation_tolerance: f64,
    /// RNG seed; `None` seeds from system entropy.
    pub seed: Option<u64>,
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        Self {
            population_size: 100,
            stack_size: 32,
            max_generations: 5000,
            fitness_threshold: f64::NEG_INFINITY,
            check_frequency: 500,
            min_generations: 500,
            crossover_rate: 0.4,
            mutation_rate: 0.4,
            num_workers: 10,
            checkpoint_frequency: None,
            checkpoint_base: None,
            stagnation_tolerance: 1e-10,
            seed: None,
        }
    }
}

impl EvolutionOptions {
    /// Returns a builder with default values.
    pub fn builder() -> EvolutionOptionsBuilder {
        EvolutionOptionsBuilder::default()
    }

    /// Validates the option set.
    ///
    /// # Errors
    ///
    /// Returns [`GpsrError::Configuration`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(GpsrError::Configuration(
                "population size cannot be zero".to_string(),
            ));
        }
        if self.stack_size == 0 {
            return Err(GpsrError::Configuration(
                "stack size cannot be zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(GpsrError::Configuration(format!(
                "crossover rate must be within [0, 1], got {}",
                self.crossover_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(GpsrError::Configuration(format!(
                "mutation rate must be within [0, 1], got {}",
                self.mutation_rate
            )));
        }
        if self.check_frequency == 0 {
            return Err(GpsrError::Configuration(
                "check frequency cannot be zero".to_string(),
            ));
        }
        if self.num_workers == 0 {
            return Err(GpsrError::Configuration(
                "worker count cannot be zero".to_string(),
            ));
        }
        if self.checkpoint_frequency == Some(0) {
            return Err(GpsrError::Configuration(
                "checkpoint frequency cannot be zero".to_string(),
            ));
        }
        if self.checkpoint_frequency.is_some() && self.checkpoint_base.is_none() {
            return Err(GpsrError::Configuration(
                "checkpoint frequency set without a checkpoint base path".to_string(),
            ));
        }
        if self.stagnation_tolerance < 0.0 {
            return Err(GpsrError::Configuration(
                "stagnation tolerance cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`EvolutionOptions`] with a fluent interface.
#[derive(Debug, Clone, Default)]
pub struct EvolutionOptionsBuilder {
    options: EvolutionOptions,
}

impl EvolutionOptionsBuilder {
    pub fn population_size(mut self, value: usize) -> Self {
        self.options.population_size = value;
        self
    }

    pub fn stack_size(mut self, value: usize) -> Self {
        self.options.stack_size = value;
        self
    }

    pub fn max_generations(mut self, value: usize) -> Self {
        self.options.max_generations = value;
        self
    }

    pub fn fitness_threshold(mut self, value: f64) -> Self {
        self.options.fitness_threshold = value;
        self
    }

    pub fn check_frequency(mut self, value: usize) -> Self {
        self.options.check_frequency = value;
        self
    }

    pub fn min_generations(mut self, value: usize) -> Self {
        self.options.min_generations = value;
        self
    }

    pub fn crossover_rate(mut self, value: f64) -> Self {
        self.options.crossover_rate = value;
        self
    }

    pub fn mutation_rate(mut self, value: f64) -> Self {
        self.options.mutation_rate = value;
        self
    }

    pub fn num_workers(mut self, value: usize) -> Self {
        self.options.num_workers = value;
        self
    }

    pub fn checkpoint<P: Into<PathBuf>>(mut self, base: P, frequency: usize) -> Self {
        self.options.checkpoint_base = Some(base.into());
        self.options.checkpoint_frequency = Some(frequency);
        self
    }

    pub fn stagnation_tolerance(mut self, value: f64) -> Self {
        self.options.stagnation_tolerance = value;
        self
    }

    pub fn seed(mut self, value: u64) -> Self {
        self.options.seed = Some(value);
        self
    }

    pub fn build(self) -> EvolutionOptions {
        self.options
    }
}
