//! # Component Pool
//!
//! The registry of operators and terminals from which genotypes are built.
//! Operator kinds form a closed enumeration with static dispatch; the pool
//! decides which kinds a particular run may use, plus how often random draws
//! produce terminals and constants.

use serde::{Deserialize, Serialize};

use crate::error::{GpsrError, Result};
use crate::rng::RandomNumberGenerator;

/// A binary operator kind usable inside a genotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
}

impl OpKind {
    /// All operator arities are binary in the current instruction set.
    pub const fn arity(&self) -> usize {
        2
    }

    /// Applies the operator to two scalars.
    ///
    /// Division is left unprotected: a zero denominator produces a
    /// non-finite value, which the fitness evaluator scores as infeasible.
    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            OpKind::Add => lhs + rhs,
            OpKind::Sub => lhs - rhs,
            OpKind::Mul => lhs * rhs,
            OpKind::Div => lhs / rhs,
        }
    }

    /// The printable symbol for this operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            OpKind::Add => "+",
            OpKind::Sub => "-",
            OpKind::Mul => "*",
            OpKind::Div => "/",
        }
    }

    /// Parses an operator symbol, as used in run configuration files.
    pub fn from_symbol(symbol: &str) -> Option<OpKind> {
        match symbol {
            "+" => Some(OpKind::Add),
            "-" => Some(OpKind::Sub),
            "*" => Some(OpKind::Mul),
            "/" => Some(OpKind::Div),
            _ => None,
        }
    }
}

/// Registry of permissible operators and terminal draw probabilities for one
/// search.
///
/// ## Example
///
/// ```rust
/// use gpsr::expression::{ComponentPool, OpKind};
///
/// let mut pool = ComponentPool::new(2).unwrap();
/// pool.add_operator(OpKind::Add);
/// pool.add_operator(OpKind::Sub);
/// pool.add_operator(OpKind::Mul);
/// assert_eq!(pool.operators().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct ComponentPool {
    operators: Vec<OpKind>,
    input_dim: usize,
    terminal_probability: f64,
    constant_probability: f64,
}

impl ComponentPool {
    /// Creates an empty pool for expressions over `input_dim` features.
    ///
    /// # Errors
    ///
    /// Returns [`GpsrError::Configuration`] if `input_dim` is zero.
    pub fn new(input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(GpsrError::Configuration(
                "component pool requires at least one input feature".to_string(),
            ));
        }
        Ok(Self {
            operators: Vec::new(),
            input_dim,
            terminal_probability: 0.1,
            constant_probability: 0.3,
        })
    }

    /// Registers an operator kind. Duplicate registrations are ignored.
    pub fn add_operator(&mut self, op: OpKind) {
        if !self.operators.contains(&op) {
            self.operators.push(op);
        }
    }

    /// The registered operator kinds.
    pub fn operators(&self) -> &[OpKind] {
        &self.operators
    }

    /// The input dimensionality expressions drawn from this pool expect.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Probability that a freely chosen genotype row is a terminal rather
    /// than an operator.
    pub fn terminal_probability(&self) -> f64 {
        self.terminal_probability
    }

    /// Probability that a terminal draw is a constant rather than a variable.
    pub fn constant_probability(&self) -> f64 {
        self.constant_probability
    }

    /// Overrides the terminal draw probability.
    pub fn set_terminal_probability(&mut self, p: f64) {
        self.terminal_probability = p.clamp(0.0, 1.0);
    }

    /// Overrides the constant draw probability.
    pub fn set_constant_probability(&mut self, p: f64) {
        self.constant_probability = p.clamp(0.0, 1.0);
    }

    /// Draws a uniformly random registered operator.
    ///
    /// # Panics
    ///
    /// Panics if no operators have been registered. The generator validates
    /// this once at construction, so draws during a run cannot hit it.
    pub fn random_operator(&self, rng: &mut RandomNumberGenerator) -> OpKind {
        self.operators[rng.pick_index(self.operators.len())]
    }

    /// Draws a uniformly random variable index.
    pub fn random_variable(&self, rng: &mut RandomNumberGenerator) -> usize {
        rng.pick_index(self.input_dim)
    }

    /// Draws a random genotype row for position `row`, pushing a fresh slot
    /// onto `constants` when the draw is a constant terminal.
    ///
    /// Row 0 has no earlier rows to reference and is always a terminal;
    /// later rows are operators over earlier rows unless the terminal draw
    /// fires. Every node this returns is valid at its position.
    pub fn random_node(
        &self,
        row: usize,
        constants: &mut Vec<f64>,
        rng: &mut RandomNumberGenerator,
    ) -> super::Node {
        use super::Node;

        if row == 0 || rng.gen_bool(self.terminal_probability) {
            if rng.gen_bool(self.constant_probability) {
                constants.push(rng.gen_range(-5.0..5.0));
                Node::Constant(constants.len() - 1)
            } else {
                Node::Variable(self.random_variable(rng))
            }
        } else {
            Node::Op {
                kind: self.random_operator(rng),
                lhs: rng.pick_index(row),
                rhs: rng.pick_index(row),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_input_dim() {
        assert!(ComponentPool::new(0).is_err());
    }

    #[test]
    fn test_add_operator_deduplicates() {
        let mut pool = ComponentPool::new(3).unwrap();
        pool.add_operator(OpKind::Add);
        pool.add_operator(OpKind::Add);
        pool.add_operator(OpKind::Mul);
        assert_eq!(pool.operators(), &[OpKind::Add, OpKind::Mul]);
    }

    #[test]
    fn test_apply() {
        assert_eq!(OpKind::Add.apply(2.0, 3.0), 5.0);
        assert_eq!(OpKind::Sub.apply(2.0, 3.0), -1.0);
        assert_eq!(OpKind::Mul.apply(2.0, 3.0), 6.0);
        assert_eq!(OpKind::Div.apply(3.0, 2.0), 1.5);
        assert!(!OpKind::Div.apply(1.0, 0.0).is_finite());
    }

    #[test]
    fn test_symbol_round_trip() {
        for op in [OpKind::Add, OpKind::Sub, OpKind::Mul, OpKind::Div] {
            assert_eq!(OpKind::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(OpKind::from_symbol("^"), None);
    }

    #[test]
    fn test_random_draws_stay_in_pool() {
        let mut pool = ComponentPool::new(4).unwrap();
        pool.add_operator(OpKind::Add);
        pool.add_operator(OpKind::Sub);

        let mut rng = RandomNumberGenerator::from_seed(3);
        for _ in 0..50 {
            let op = pool.random_operator(&mut rng);
            assert!(pool.operators().contains(&op));
            assert!(pool.random_variable(&mut rng) < 4);
        }
    }
}
