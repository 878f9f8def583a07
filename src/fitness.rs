//! # Fitness
//!
//! A tagged fitness value that makes infeasibility explicit instead of
//! relying on floating-point NaN propagation. A candidate that violates the
//! physical constraints is [`Fitness::Infeasible`]; it loses every selection
//! comparison and never enters the Pareto archive.
//!
//! The numeric convention is residual-style: **lower is better**. A feasible
//! score is the mean squared residual against the training targets, so a
//! perfect fit scores `0.0`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The evaluation state of an individual.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Fitness {
    /// Not yet evaluated, or invalidated by a structural/constant change.
    Unevaluated,
    /// Evaluated and physically feasible; the payload is the mean squared
    /// residual (lower is better).
    Feasible(f64),
    /// Evaluated but in violation of a feasibility constraint, or
    /// numerically invalid. Always loses to any feasible score.
    Infeasible,
}

impl Fitness {
    /// Returns the feasible score, if any.
    pub fn score(&self) -> Option<f64> {
        match self {
            Fitness::Feasible(score) => Some(*score),
            _ => None,
        }
    }

    /// Whether this value represents a completed evaluation (feasible or not).
    pub fn is_evaluated(&self) -> bool {
        !matches!(self, Fitness::Unevaluated)
    }

    /// Whether this value is a feasible score.
    pub fn is_feasible(&self) -> bool {
        matches!(self, Fitness::Feasible(_))
    }

    /// Compares two fitness values under the selection ordering: any
    /// feasible score beats infeasible or unevaluated, and between feasible
    /// scores the lower residual wins. Non-finite feasible payloads are
    /// treated as infeasible so they can never win a comparison.
    pub fn compare(&self, other: &Fitness) -> Ordering {
        match (self.effective_score(), other.effective_score()) {
            (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }

    /// Returns `true` if `self` is strictly better than `other`.
    pub fn is_better_than(&self, other: &Fitness) -> bool {
        self.compare(other) == Ordering::Greater
    }

    fn effective_score(&self) -> Option<f64> {
        match self {
            Fitness::Feasible(score) if score.is_finite() => Some(*score),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_residual_wins() {
        assert!(Fitness::Feasible(1.0).is_better_than(&Fitness::Feasible(2.0)));
        assert!(!Fitness::Feasible(2.0).is_better_than(&Fitness::Feasible(1.0)));
    }

    #[test]
    fn test_negative_scores_order_correctly() {
        // Threshold scores can be arbitrarily negative; more negative wins.
        assert!(Fitness::Feasible(-2.0).is_better_than(&Fitness::Feasible(-0.5)));
    }

    #[test]
    fn test_infeasible_always_loses() {
        assert!(Fitness::Feasible(1e12).is_better_than(&Fitness::Infeasible));
        assert!(!Fitness::Infeasible.is_better_than(&Fitness::Feasible(1e12)));
        assert_eq!(
            Fitness::Infeasible.compare(&Fitness::Unevaluated),
            Ordering::Equal
        );
    }

    #[test]
    fn test_non_finite_score_never_wins() {
        assert!(!Fitness::Feasible(f64::NAN).is_better_than(&Fitness::Feasible(1e9)));
        assert!(Fitness::Feasible(1e9).is_better_than(&Fitness::Feasible(f64::INFINITY)));
    }

    #[test]
    fn test_equal_scores_tie() {
        assert_eq!(
            Fitness::Feasible(3.0).compare(&Fitness::Feasible(3.0)),
            Ordering::Equal
        );
    }
}
