//! # Local Optimization
//!
//! Gradient-based fitting of an individual's free numeric constants,
//! distinct from the structural genotype search. A damped Gauss-Newton
//! (Levenberg-Marquardt) scheme minimizes the sum of squared residuals
//! against the training targets, driven by the individual's exact
//! forward-mode constant Jacobian.
//!
//! Optimization never fails loudly: on a singular normal-equation solve or
//! a divergent step the constants stay at the last finite iterate and the
//! routine returns normally. Poor constants simply surface as poor fitness
//! downstream.

use nalgebra::DMatrix;
use tracing::trace;

use crate::data::TrainingData;
use crate::error::{GpsrError, Result};
use crate::expression::Individual;

/// Damping ceiling after which the optimizer gives up on the current
/// search direction.
const MAX_DAMPING: f64 = 1e10;
/// Damping floor; keeps accepted steps from collapsing the damping to zero.
const MIN_DAMPING: f64 = 1e-12;

/// Damped Gauss-Newton least-squares fitter for expression constants.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardt {
    max_iterations: usize,
    tolerance: f64,
    initial_damping: f64,
}

impl LevenbergMarquardt {
    /// Creates an optimizer with the given iteration budget.
    ///
    /// # Errors
    ///
    /// Returns [`GpsrError::Configuration`] if `max_iterations` is zero.
    pub fn new(max_iterations: usize) -> Result<Self> {
        if max_iterations == 0 {
            return Err(GpsrError::Configuration(
                "maximum iterations must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            max_iterations,
            tolerance: 1e-9,
            initial_damping: 1e-3,
        })
    }

    /// Creates an optimizer with an explicit convergence tolerance on the
    /// step norm and residual improvement.
    pub fn with_tolerance(max_iterations: usize, tolerance: f64) -> Result<Self> {
        if tolerance <= 0.0 {
            return Err(GpsrError::Configuration(
                "tolerance must be positive".to_string(),
            ));
        }
        let mut optimizer = Self::new(max_iterations)?;
        optimizer.tolerance = tolerance;
        Ok(optimizer)
    }

    /// Fits the individual's constants in place against the training data.
    ///
    /// A no-op for individuals without free constants or whose constants
    /// are already fitted. On return the individual no longer needs local
    /// optimization, whatever the numerical outcome.
    pub fn optimize(&self, individual: &mut Individual, data: &TrainingData) {
        if !individual.needs_local_optimization() {
            return;
        }

        let x = data.x();
        let y = data.y();

        let (values, mut jacobian) = individual.evaluate_with_gradient(x);
        let mut residual = values - y;
        let mut sse = residual.norm_squared();
        if !sse.is_finite() {
            // Constants are already the last finite iterate.
            individual.mark_optimized();
            return;
        }

        let k = individual.constants().len();
        let mut current = individual.constants().to_vec();
        let mut damping = self.initial_damping;

        for iteration in 0..self.max_iterations {
            let jtj = jacobian.transpose() * &jacobian;
            let jtr = jacobian.transpose() * &residual;
            let damped = &jtj + DMatrix::identity(k, k) * damping;

            let step = match damped.cholesky() {
                Some(factor) => factor.solve(&(-&jtr)),
                None => {
                    damping *= 10.0;
                    if damping > MAX_DAMPING {
                        break;
                    }
                    continue;
                }
            };
            if !step.iter().all(|v| v.is_finite()) {
                damping *= 10.0;
                if damping > MAX_DAMPING {
                    break;
                }
                continue;
            }

            let trial: Vec<f64> = current
                .iter()
                .zip(step.iter())
                .map(|(c, d)| c + d)
                .collect();
            individual.set_constants(trial.clone());
            let (trial_values, trial_jacobian) = individual.evaluate_with_gradient(x);
            let trial_residual = trial_values - y;
            let trial_sse = trial_residual.norm_squared();

            if trial_sse.is_finite() && trial_sse < sse {
                let improvement = sse - trial_sse;
                current = trial;
                jacobian = trial_jacobian;
                residual = trial_residual;
                sse = trial_sse;
                damping = (damping * 0.1).max(MIN_DAMPING);
                trace!(iteration, sse, damping, "accepted LM step");
                if step.norm() < self.tolerance || improvement < self.tolerance {
                    break;
                }
            } else {
                // Reject: restore the last finite iterate and damp harder.
                individual.set_constants(current.clone());
                damping *= 10.0;
                if damping > MAX_DAMPING {
                    break;
                }
            }
        }

        individual.set_constants(current);
        individual.mark_optimized();
    }
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            tolerance: 1e-9,
            initial_damping: 1e-3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Node, OpKind};

    fn linear_data() -> TrainingData {
        // y = 3*x0 - 1
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64 * 0.5]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| 3.0 * r[0] - 1.0).collect();
        TrainingData::from_rows(&rows, &targets).unwrap()
    }

    /// c0 * x0 + c1
    fn affine_individual(c0: f64, c1: f64) -> Individual {
        Individual::new(
            vec![
                Node::Constant(0),
                Node::Variable(0),
                Node::Op {
                    kind: OpKind::Mul,
                    lhs: 0,
                    rhs: 1,
                },
                Node::Constant(1),
                Node::Op {
                    kind: OpKind::Add,
                    lhs: 2,
                    rhs: 3,
                },
            ],
            vec![c0, c1],
        )
        .unwrap()
    }

    #[test]
    fn test_fits_affine_constants_exactly() {
        let data = linear_data();
        let mut ind = affine_individual(0.1, 0.1);
        let optimizer = LevenbergMarquardt::new(50).unwrap();

        optimizer.optimize(&mut ind, &data);

        assert!(!ind.needs_local_optimization());
        assert!((ind.constants()[0] - 3.0).abs() < 1e-5);
        assert!((ind.constants()[1] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_no_op_without_constants() {
        let data = linear_data();
        let mut ind = Individual::new(vec![Node::Variable(0)], vec![]).unwrap();
        let optimizer = LevenbergMarquardt::default();

        optimizer.optimize(&mut ind, &data);

        assert!(!ind.needs_local_optimization());
        assert!(ind.constants().is_empty());
    }

    #[test]
    fn test_no_op_when_already_fitted() {
        let data = linear_data();
        let mut ind = affine_individual(3.0, -1.0);
        ind.mark_optimized();
        let before = ind.constants().to_vec();

        LevenbergMarquardt::default().optimize(&mut ind, &data);
        assert_eq!(ind.constants(), before.as_slice());
    }

    #[test]
    fn test_non_finite_residual_leaves_constants() {
        // c0 / x0 with a zero in x0: residual is non-finite at the start.
        let data = TrainingData::from_rows(&[vec![0.0], vec![1.0]], &[1.0, 1.0]).unwrap();
        let mut ind = Individual::new(
            vec![
                Node::Constant(0),
                Node::Variable(0),
                Node::Op {
                    kind: OpKind::Div,
                    lhs: 0,
                    rhs: 1,
                },
            ],
            vec![2.0],
        )
        .unwrap();

        LevenbergMarquardt::default().optimize(&mut ind, &data);

        assert_eq!(ind.constants(), &[2.0]);
        assert!(!ind.needs_local_optimization());
    }

    #[test]
    fn test_reduces_residual_on_nonlinear_fit() {
        // y = (x0 + 2)^2, model (x0 + c0) * (x0 + c0)
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64 * 0.2 - 3.0]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| (r[0] + 2.0).powi(2)).collect();
        let data = TrainingData::from_rows(&rows, &targets).unwrap();

        let mut ind = Individual::new(
            vec![
                Node::Variable(0),
                Node::Constant(0),
                Node::Op {
                    kind: OpKind::Add,
                    lhs: 0,
                    rhs: 1,
                },
                Node::Op {
                    kind: OpKind::Mul,
                    lhs: 2,
                    rhs: 2,
                },
            ],
            vec![0.5],
        )
        .unwrap();

        let initial_sse = (ind.evaluate(data.x()) - data.y()).norm_squared();
        LevenbergMarquardt::new(100).unwrap().optimize(&mut ind, &data);
        let final_sse = (ind.evaluate(data.x()) - data.y()).norm_squared();

        assert!(final_sse < initial_sse);
        assert!((ind.constants()[0] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_rejects_zero_iterations() {
        assert!(LevenbergMarquardt::new(0).is_err());
    }
}
