//! # gpsr
//!
//! Genetic programming symbolic regression with physical feasibility
//! constraints. The crate evolves stack-encoded arithmetic expressions
//! against tabular training data, fits their numeric constants with a
//! Levenberg-Marquardt pass before scoring, rejects candidates that violate
//! monotonicity or sign constraints, and accumulates an accuracy/parsimony
//! Pareto archive over the whole run.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gpsr::data::TrainingData;
//! use gpsr::engine::{EvolutionEngine, EvolutionOptions};
//! use gpsr::evaluation::{ConstrainedRegression, ConstraintConfig};
//! use gpsr::expression::{ComponentPool, Generator, OpKind};
//! use gpsr::local_opt::LevenbergMarquardt;
//!
//! # fn main() -> gpsr::Result<()> {
//! let data = Arc::new(TrainingData::from_json_file("training.json")?);
//!
//! let mut pool = ComponentPool::new(data.num_features())?;
//! pool.add_operator(OpKind::Add);
//! pool.add_operator(OpKind::Sub);
//! pool.add_operator(OpKind::Mul);
//!
//! let options = EvolutionOptions::builder()
//!     .population_size(100)
//!     .max_generations(5000)
//!     .seed(42)
//!     .build();
//! let generator = Generator::new(options.stack_size, pool, true)?;
//! let evaluator = ConstrainedRegression::new(
//!     data,
//!     ConstraintConfig::default(),
//!     LevenbergMarquardt::default(),
//! )?;
//!
//! let mut engine = EvolutionEngine::new(options, generator, evaluator)?;
//! let report = engine.run()?;
//! for entry in report.archive.entries() {
//!     println!("{:>12.6}  {:>3}  {}", entry.fitness, entry.complexity, entry.individual);
//! }
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod expression;
pub mod fitness;
pub mod local_opt;
pub mod pareto;
pub mod rng;
pub mod selection;

// Re-export commonly used types for convenience
pub use error::{GpsrError, Result, ResultExt};
pub use fitness::Fitness;
