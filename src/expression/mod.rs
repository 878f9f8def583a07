//! # Expression Representation
//!
//! Stack-encoded symbolic expressions and the operators that create and
//! recombine them. A genotype is a fixed-length command array in which every
//! row is a terminal or applies an operator to earlier rows, so any genotype
//! the generator or the variation operators can produce decodes to a valid
//! expression by construction.

pub mod component;
pub mod generator;
pub mod individual;
pub mod variation;

pub use component::{ComponentPool, OpKind};
pub use generator::Generator;
pub use individual::{Individual, Node};
pub use variation::{Crossover, Mutation};
