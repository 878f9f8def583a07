//! # Engine
//!
//! Run configuration and the generational evolution loop.

pub mod engine;
pub mod options;

pub use engine::{EngineState, EvolutionEngine, EvolutionReport};
pub use options::{EvolutionOptions, EvolutionOptionsBuilder};
