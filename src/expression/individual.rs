//! # Expression Individual
//!
//! A symbolic expression encoded as a fixed-length command array. Row `i`
//! is either a terminal (input variable or tunable constant) or a binary
//! operator over two earlier rows (`lhs, rhs < i`), and the expression
//! output is the final row. Because operator rows can only reference rows
//! above them, every genotype that satisfies the structural invariant is
//! acyclic and evaluable; the invariant is enforced at construction and
//! preserved by the generator and the variation operators.
//!
//! Evaluation is deterministic given fixed constants, and the constant
//! Jacobian is exact forward-mode differentiation, not finite differences,
//! so the local optimizer converges reliably.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GpsrError, Result};
use crate::fitness::Fitness;

use super::component::OpKind;

/// One row of a genotype command array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Reads input feature `i` of the sample being evaluated.
    Variable(usize),
    /// Reads slot `i` of the individual's tunable constants.
    Constant(usize),
    /// Applies `kind` to the values of rows `lhs` and `rhs`, both of which
    /// must precede this row.
    Op { kind: OpKind, lhs: usize, rhs: usize },
}

/// A symbolic expression individual: genotype, tunable constants, and the
/// bookkeeping the evolutionary loop needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    genotype: Vec<Node>,
    constants: Vec<f64>,
    fitness: Fitness,
    needs_opt: bool,
}

impl Individual {
    /// Creates an individual from a genotype and its constants.
    ///
    /// # Errors
    ///
    /// Returns [`GpsrError::Generation`] if the genotype is empty, an
    /// operator row references a row at or after itself, or a constant node
    /// indexes outside the constants vector. Well-behaved callers (the
    /// generator and variation operators) never trip this; it guards
    /// hand-built genotypes and deserialized checkpoints.
    pub fn new(genotype: Vec<Node>, constants: Vec<f64>) -> Result<Self> {
        if genotype.is_empty() {
            return Err(GpsrError::Generation("genotype cannot be empty".to_string()));
        }
        for (i, node) in genotype.iter().enumerate() {
            match node {
                Node::Op { lhs, rhs, .. } if *lhs >= i || *rhs >= i => {
                    return Err(GpsrError::Generation(format!(
                        "operator row {} references rows {} and {}; only earlier rows are valid",
                        i, lhs, rhs
                    )));
                }
                Node::Constant(k) if *k >= constants.len() => {
                    return Err(GpsrError::Generation(format!(
                        "row {} references constant slot {} but only {} exist",
                        i,
                        k,
                        constants.len()
                    )));
                }
                _ => {}
            }
        }
        let needs_opt = !constants.is_empty();
        Ok(Self {
            genotype,
            constants,
            fitness: Fitness::Unevaluated,
            needs_opt,
        })
    }

    /// The genotype command array.
    pub fn genotype(&self) -> &[Node] {
        &self.genotype
    }

    /// The tunable constants.
    pub fn constants(&self) -> &[f64] {
        &self.constants
    }

    /// The last assigned fitness.
    pub fn fitness(&self) -> Fitness {
        self.fitness
    }

    /// Records the outcome of a fitness evaluation.
    pub fn set_fitness(&mut self, fitness: Fitness) {
        self.fitness = fitness;
    }

    /// Replaces the constants in place (the local optimizer's write path).
    /// The genotype is untouched; any previous fitness is invalidated.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the slot count changes.
    pub fn set_constants(&mut self, constants: Vec<f64>) {
        debug_assert_eq!(constants.len(), self.constants.len());
        self.constants = constants;
        self.fitness = Fitness::Unevaluated;
    }

    /// Whether the local optimizer still has work to do on this individual.
    /// Always `false` for individuals without free constants.
    pub fn needs_local_optimization(&self) -> bool {
        self.needs_opt && !self.constants.is_empty()
    }

    /// Marks the constants as fitted. Called by the local optimizer once it
    /// finishes (whether or not it converged).
    pub fn mark_optimized(&mut self) {
        self.needs_opt = false;
    }

    /// Invalidates fitness after a structural or constant change and flags
    /// the individual for re-optimization.
    pub(crate) fn mark_modified(&mut self) {
        self.fitness = Fitness::Unevaluated;
        self.needs_opt = true;
    }

    /// Number of genotype rows that contribute to the output row; the
    /// parsimony metric for Pareto ranking.
    pub fn complexity(&self) -> usize {
        let mut used = vec![false; self.genotype.len()];
        let mut stack = vec![self.genotype.len() - 1];
        while let Some(i) = stack.pop() {
            if used[i] {
                continue;
            }
            used[i] = true;
            if let Node::Op { lhs, rhs, .. } = self.genotype[i] {
                stack.push(lhs);
                stack.push(rhs);
            }
        }
        used.iter().filter(|&&u| u).count()
    }

    /// Evaluates the expression over every row of `x`, returning one output
    /// per sample.
    pub fn evaluate(&self, x: &DMatrix<f64>) -> DVector<f64> {
        let n = x.nrows();
        let mut values: Vec<DVector<f64>> = Vec::with_capacity(self.genotype.len());
        for node in &self.genotype {
            let v = match node {
                Node::Variable(j) => x.column(*j).into_owned(),
                Node::Constant(k) => DVector::from_element(n, self.constants[*k]),
                Node::Op { kind, lhs, rhs } => {
                    let a = &values[*lhs];
                    let b = &values[*rhs];
                    DVector::from_fn(n, |i, _| kind.apply(a[i], b[i]))
                }
            };
            values.push(v);
        }
        values[self.genotype.len() - 1].clone()
    }

    /// Evaluates the expression and its exact Jacobian with respect to the
    /// constants: `(values, d(values)/d(constants))`, the Jacobian having
    /// one row per sample and one column per constant slot.
    pub fn evaluate_with_gradient(&self, x: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
        let n = x.nrows();
        let k = self.constants.len();
        let mut values: Vec<DVector<f64>> = Vec::with_capacity(self.genotype.len());
        let mut grads: Vec<DMatrix<f64>> = Vec::with_capacity(self.genotype.len());

        for node in &self.genotype {
            let (v, g) = match node {
                Node::Variable(j) => (x.column(*j).into_owned(), DMatrix::zeros(n, k)),
                Node::Constant(c) => {
                    let mut g = DMatrix::zeros(n, k);
                    g.column_mut(*c).fill(1.0);
                    (DVector::from_element(n, self.constants[*c]), g)
                }
                Node::Op { kind, lhs, rhs } => {
                    let (a, ga) = (&values[*lhs], &grads[*lhs]);
                    let (b, gb) = (&values[*rhs], &grads[*rhs]);
                    let v = DVector::from_fn(n, |i, _| kind.apply(a[i], b[i]));
                    let g = match kind {
                        OpKind::Add => ga + gb,
                        OpKind::Sub => ga - gb,
                        OpKind::Mul => {
                            DMatrix::from_fn(n, k, |i, m| ga[(i, m)] * b[i] + a[i] * gb[(i, m)])
                        }
                        OpKind::Div => DMatrix::from_fn(n, k, |i, m| {
                            (ga[(i, m)] * b[i] - a[i] * gb[(i, m)]) / (b[i] * b[i])
                        }),
                    };
                    (v, g)
                }
            };
            values.push(v);
            grads.push(g);
        }
        let last = self.genotype.len() - 1;
        (values[last].clone(), grads[last].clone())
    }

    /// Evaluates the expression and its exact derivative along one input
    /// feature axis: `(values, d(values)/d(x_axis))`.
    pub fn evaluate_with_x_gradient(
        &self,
        x: &DMatrix<f64>,
        axis: usize,
    ) -> (DVector<f64>, DVector<f64>) {
        let n = x.nrows();
        let mut values: Vec<DVector<f64>> = Vec::with_capacity(self.genotype.len());
        let mut derivs: Vec<DVector<f64>> = Vec::with_capacity(self.genotype.len());

        for node in &self.genotype {
            let (v, d) = match node {
                Node::Variable(j) => {
                    let d = if *j == axis { 1.0 } else { 0.0 };
                    (x.column(*j).into_owned(), DVector::from_element(n, d))
                }
                Node::Constant(c) => (
                    DVector::from_element(n, self.constants[*c]),
                    DVector::zeros(n),
                ),
                Node::Op { kind, lhs, rhs } => {
                    let (a, da) = (&values[*lhs], &derivs[*lhs]);
                    let (b, db) = (&values[*rhs], &derivs[*rhs]);
                    let v = DVector::from_fn(n, |i, _| kind.apply(a[i], b[i]));
                    let d = match kind {
                        OpKind::Add => da + db,
                        OpKind::Sub => da - db,
                        OpKind::Mul => DVector::from_fn(n, |i, _| da[i] * b[i] + a[i] * db[i]),
                        OpKind::Div => DVector::from_fn(n, |i, _| {
                            (da[i] * b[i] - a[i] * db[i]) / (b[i] * b[i])
                        }),
                    };
                    (v, d)
                }
            };
            values.push(v);
            derivs.push(d);
        }
        let last = self.genotype.len() - 1;
        (values[last].clone(), derivs[last].clone())
    }

    /// Mutable access to the raw genotype and constants for the variation
    /// operators. Callers must restore the structural invariant and call
    /// [`Individual::mark_modified`] before the individual is used again.
    pub(crate) fn parts_mut(&mut self) -> (&mut Vec<Node>, &mut Vec<f64>) {
        (&mut self.genotype, &mut self.constants)
    }

    /// Drops constant slots no longer referenced by any genotype row and
    /// renumbers the remaining references. Called after structural changes.
    pub(crate) fn compact_constants(&mut self) {
        let mut remap: Vec<Option<usize>> = vec![None; self.constants.len()];
        let mut kept: Vec<f64> = Vec::new();
        for node in &mut self.genotype {
            if let Node::Constant(k) = node {
                let old = *k;
                let new_idx = match remap[old] {
                    Some(idx) => idx,
                    None => {
                        kept.push(self.constants[old]);
                        let idx = kept.len() - 1;
                        remap[old] = Some(idx);
                        idx
                    }
                };
                *node = Node::Constant(new_idx);
            }
        }
        self.constants = kept;
    }

    fn render(&self, row: usize) -> String {
        match &self.genotype[row] {
            Node::Variable(j) => format!("x_{}", j),
            Node::Constant(k) => format!("{:.4}", self.constants[*k]),
            Node::Op { kind, lhs, rhs } => format!(
                "({} {} {})",
                self.render(*lhs),
                kind.symbol(),
                self.render(*rhs)
            ),
        }
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(self.genotype.len() - 1))
    }
}
