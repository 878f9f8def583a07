//! # Generator
//!
//! Produces random valid individuals of a fixed genotype length from a
//! component pool, optionally passing each through an algebraic
//! simplification step that folds constant-valued subtrees without changing
//! semantics.

use crate::error::{GpsrError, Result};
use crate::rng::RandomNumberGenerator;

use super::component::{ComponentPool, OpKind};
use super::individual::{Individual, Node};

/// Random-genotype generator bound to one component pool.
#[derive(Debug, Clone)]
pub struct Generator {
    stack_size: usize,
    pool: ComponentPool,
    use_simplification: bool,
}

impl Generator {
    /// Creates a generator producing genotypes of exactly `stack_size` rows.
    ///
    /// # Errors
    ///
    /// Returns [`GpsrError::Configuration`] if `stack_size` is zero or the
    /// pool has no registered operators.
    pub fn new(stack_size: usize, pool: ComponentPool, use_simplification: bool) -> Result<Self> {
        if stack_size == 0 {
            return Err(GpsrError::Configuration(
                "stack size must be greater than zero".to_string(),
            ));
        }
        if pool.operators().is_empty() {
            return Err(GpsrError::Configuration(
                "component pool has no registered operators".to_string(),
            ));
        }
        Ok(Self {
            stack_size,
            pool,
            use_simplification,
        })
    }

    /// The fixed genotype length of generated individuals.
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// The component pool backing this generator.
    pub fn pool(&self) -> &ComponentPool {
        &self.pool
    }

    /// Produces one random, evaluable individual.
    pub fn generate(&self, rng: &mut RandomNumberGenerator) -> Result<Individual> {
        let mut constants = Vec::new();
        let mut genotype: Vec<Node> = (0..self.stack_size)
            .map(|row| self.pool.random_node(row, &mut constants, rng))
            .collect();

        if self.use_simplification {
            simplify(&mut genotype, &mut constants);
        }

        let mut individual = Individual::new(genotype, constants)?;
        individual.compact_constants();
        Ok(individual)
    }
}

/// Folds constant-valued subtrees into constant terminals and collapses
/// identical-operand subtractions to zero. Output values are unchanged for
/// every input, only the structure shrinks.
fn simplify(genotype: &mut [Node], constants: &mut Vec<f64>) {
    let mut const_value: Vec<Option<f64>> = Vec::with_capacity(genotype.len());

    for row in 0..genotype.len() {
        let folded = match genotype[row] {
            Node::Variable(_) => None,
            Node::Constant(k) => Some(constants[k]),
            Node::Op { kind, lhs, rhs } => {
                if kind == OpKind::Sub && lhs == rhs {
                    Some(0.0)
                } else {
                    match (const_value[lhs], const_value[rhs]) {
                        (Some(a), Some(b)) => Some(kind.apply(a, b)),
                        _ => None,
                    }
                }
            }
        };
        if let (Some(value), Node::Op { .. }) = (folded, genotype[row]) {
            constants.push(value);
            genotype[row] = Node::Constant(constants.len() - 1);
        }
        const_value.push(folded);
    }
}
