//! # Constrained Fitness Evaluation
//!
//! Residual-based fitness with physical feasibility checks. The displacement
//! responses being approximated must be non-positive and non-increasing
//! along the primary loading axis; a candidate violating either condition
//! can still fit the noise numerically but is physically meaningless, so it
//! is categorically rejected ([`Fitness::Infeasible`]) rather than penalized
//! continuously.
//!
//! Which axis carries the monotonicity constraint, its direction, and the
//! sign bound are configuration, not assumptions baked into the evaluator.

use std::sync::Arc;

use crate::data::TrainingData;
use crate::error::Result;
use crate::expression::Individual;
use crate::fitness::Fitness;
use crate::local_opt::LevenbergMarquardt;

/// Trait for fitness functions scoring expression individuals.
///
/// Implementations may mutate the individual (the constrained evaluator
/// runs local optimization on the constants first) and must record the
/// resulting fitness on the individual as well as returning it.
pub trait FitnessFunction: Send + Sync {
    fn evaluate(&self, individual: &mut Individual) -> Fitness;
}

/// Direction of the monotonicity constraint along the constraint axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monotonicity {
    NonIncreasing,
    NonDecreasing,
}

/// Sign bound imposed on every predicted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignBound {
    NonPositive,
    NonNegative,
}

/// Physical feasibility constraints applied during evaluation.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintConfig {
    /// Input feature axis along which monotonicity is expected.
    pub axis: usize,
    /// Required monotonic trend, if any.
    pub monotonicity: Option<Monotonicity>,
    /// Required sign of all predictions, if any.
    pub sign: Option<SignBound>,
}

impl Default for ConstraintConfig {
    /// Displacement fields under the reference loading: non-positive and
    /// non-increasing along the first feature axis.
    fn default() -> Self {
        Self {
            axis: 0,
            monotonicity: Some(Monotonicity::NonIncreasing),
            sign: Some(SignBound::NonPositive),
        }
    }
}

/// Explicit regression fitness wrapped with feasibility constraints and
/// constant optimization.
///
/// Evaluation procedure: optimize constants if the individual needs it,
/// predict over every training row, reject non-finite or
/// constraint-violating predictions, otherwise score the mean squared
/// residual (lower is better).
pub struct ConstrainedRegression {
    data: Arc<TrainingData>,
    constraints: ConstraintConfig,
    optimizer: LevenbergMarquardt,
    /// Training rows sorted ascending by the constraint axis; the
    /// monotonicity check walks this order.
    order: Vec<usize>,
}

impl ConstrainedRegression {
    /// Creates an evaluator over the given training data.
    ///
    /// # Errors
    ///
    /// Returns an error if the constraint axis exceeds the data's feature
    /// dimensionality.
    pub fn new(
        data: Arc<TrainingData>,
        constraints: ConstraintConfig,
        optimizer: LevenbergMarquardt,
    ) -> Result<Self> {
        let order = data.row_order_by_feature(constraints.axis)?;
        Ok(Self {
            data,
            constraints,
            optimizer,
            order,
        })
    }

    /// The training data this evaluator scores against.
    pub fn data(&self) -> &Arc<TrainingData> {
        &self.data
    }

    fn satisfies_constraints(&self, values: &nalgebra::DVector<f64>) -> bool {
        if let Some(direction) = self.constraints.monotonicity {
            for pair in self.order.windows(2) {
                let (prev, next) = (values[pair[0]], values[pair[1]]);
                let ok = match direction {
                    Monotonicity::NonIncreasing => next <= prev,
                    Monotonicity::NonDecreasing => next >= prev,
                };
                if !ok {
                    return false;
                }
            }
        }
        if let Some(sign) = self.constraints.sign {
            let ok = match sign {
                SignBound::NonPositive => values.iter().all(|&v| v <= 0.0),
                SignBound::NonNegative => values.iter().all(|&v| v >= 0.0),
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

impl FitnessFunction for ConstrainedRegression {
    fn evaluate(&self, individual: &mut Individual) -> Fitness {
        if individual.needs_local_optimization() {
            self.optimizer.optimize(individual, &self.data);
        }

        let values = individual.evaluate(self.data.x());

        let fitness = if values.iter().any(|v| !v.is_finite()) {
            Fitness::Infeasible
        } else if !self.satisfies_constraints(&values) {
            Fitness::Infeasible
        } else {
            let residual = values - self.data.y();
            let mse = residual.norm_squared() / self.data.num_rows() as f64;
            if mse.is_finite() {
                Fitness::Feasible(mse)
            } else {
                Fitness::Infeasible
            }
        };

        individual.set_fitness(fitness);
        fitness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Node, OpKind};

    /// Targets follow y = -x0, which is non-positive and non-increasing
    /// along axis 0 for x0 >= 0.
    fn constrained_evaluator() -> ConstrainedRegression {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 1.0]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| -r[0]).collect();
        let data = Arc::new(TrainingData::from_rows(&rows, &targets).unwrap());
        ConstrainedRegression::new(
            data,
            ConstraintConfig::default(),
            LevenbergMarquardt::default(),
        )
        .unwrap()
    }

    /// -x0: feasible and exact.
    fn negated_x0() -> Individual {
        Individual::new(
            vec![
                Node::Constant(0),
                Node::Variable(0),
                Node::Op {
                    kind: OpKind::Mul,
                    lhs: 0,
                    rhs: 1,
                },
            ],
            vec![-1.0],
        )
        .unwrap()
    }

    #[test]
    fn test_feasible_individual_scores_residual() {
        let evaluator = constrained_evaluator();
        let mut ind = negated_x0();

        let fitness = evaluator.evaluate(&mut ind);
        match fitness {
            Fitness::Feasible(score) => assert!(score < 1e-10),
            other => panic!("expected feasible fitness, got {:?}", other),
        }
        assert_eq!(ind.fitness(), fitness);
    }

    #[test]
    fn test_positive_prediction_is_infeasible() {
        let evaluator = constrained_evaluator();
        // x0 is non-negative over the data: violates the sign bound.
        let mut ind = Individual::new(vec![Node::Variable(0)], vec![]).unwrap();
        assert_eq!(evaluator.evaluate(&mut ind), Fitness::Infeasible);
    }

    #[test]
    fn test_increasing_prediction_is_infeasible() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64 - 9.0]).collect();
        let targets = vec![0.0; 10];
        let data = Arc::new(TrainingData::from_rows(&rows, &targets).unwrap());
        let evaluator = ConstrainedRegression::new(
            data,
            ConstraintConfig::default(),
            LevenbergMarquardt::default(),
        )
        .unwrap();

        // x0 over negative inputs: all values <= 0 (sign holds) but
        // increasing along axis 0 (monotonicity fails).
        let mut ind = Individual::new(vec![Node::Variable(0)], vec![]).unwrap();
        assert_eq!(evaluator.evaluate(&mut ind), Fitness::Infeasible);
    }

    #[test]
    fn test_non_finite_prediction_is_infeasible() {
        let rows = vec![vec![0.0], vec![1.0]];
        let data = Arc::new(TrainingData::from_rows(&rows, &[0.0, -1.0]).unwrap());
        let evaluator = ConstrainedRegression::new(
            data,
            ConstraintConfig::default(),
            LevenbergMarquardt::default(),
        )
        .unwrap();

        // x0 / x0 hits 0/0 at the first row.
        let mut ind = Individual::new(
            vec![
                Node::Variable(0),
                Node::Op {
                    kind: OpKind::Div,
                    lhs: 0,
                    rhs: 0,
                },
            ],
            vec![],
        )
        .unwrap();
        assert_eq!(evaluator.evaluate(&mut ind), Fitness::Infeasible);
    }

    #[test]
    fn test_evaluation_is_idempotent_without_constants() {
        let evaluator = constrained_evaluator();
        let mut ind = Individual::new(
            vec![
                Node::Variable(0),
                Node::Constant(0),
                Node::Op {
                    kind: OpKind::Sub,
                    lhs: 1,
                    rhs: 0,
                },
            ],
            vec![0.0],
        )
        .unwrap();
        ind.mark_optimized();

        let first = evaluator.evaluate(&mut ind);
        let second = evaluator.evaluate(&mut ind);
        let third = evaluator.evaluate(&mut ind);
        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn test_optimization_runs_before_scoring() {
        let evaluator = constrained_evaluator();
        // c0 * x0 starting far from the solution; the evaluator must fit
        // c0 -> -1 before checking feasibility.
        let mut ind = Individual::new(
            vec![
                Node::Constant(0),
                Node::Variable(0),
                Node::Op {
                    kind: OpKind::Mul,
                    lhs: 0,
                    rhs: 1,
                },
            ],
            vec![-10.0],
        )
        .unwrap();

        let fitness = evaluator.evaluate(&mut ind);
        assert!(matches!(fitness, Fitness::Feasible(score) if score < 1e-8));
        assert!((ind.constants()[0] + 1.0).abs() < 1e-6);
        assert!(!ind.needs_local_optimization());
    }

    #[test]
    fn test_constraint_axis_is_configurable() {
        // Monotone along axis 1 instead of axis 0.
        let rows: Vec<Vec<f64>> = (0..5).map(|i| vec![0.0, i as f64]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| -2.0 * r[1]).collect();
        let data = Arc::new(TrainingData::from_rows(&rows, &targets).unwrap());
        let constraints = ConstraintConfig {
            axis: 1,
            ..ConstraintConfig::default()
        };
        let evaluator =
            ConstrainedRegression::new(data, constraints, LevenbergMarquardt::default()).unwrap();

        let mut ind = Individual::new(
            vec![
                Node::Constant(0),
                Node::Variable(1),
                Node::Op {
                    kind: OpKind::Mul,
                    lhs: 0,
                    rhs: 1,
                },
            ],
            vec![-2.0],
        )
        .unwrap();
        ind.mark_optimized();
        assert!(evaluator.evaluate(&mut ind).is_feasible());
    }

    #[test]
    fn test_invalid_axis_rejected_at_construction() {
        let data = Arc::new(TrainingData::from_rows(&[vec![1.0]], &[0.0]).unwrap());
        let constraints = ConstraintConfig {
            axis: 3,
            ..ConstraintConfig::default()
        };
        assert!(
            ConstrainedRegression::new(data, constraints, LevenbergMarquardt::default()).is_err()
        );
    }
}
