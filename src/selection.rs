//! # Crowding Selection
//!
//! Deterministic crowding: offspring compete only against the parents of
//! their own pairing, never the whole population. Each parent pair's two
//! children are matched to the structurally nearest parent, then exactly
//! one winner survives per match, so population size is conserved and
//! distinct niches are not wiped out by a single dominant lineage.

use crate::error::{GpsrError, Result};
use crate::expression::Individual;

/// Pairwise parent-versus-offspring tournament selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrowdingSelection;

impl CrowdingSelection {
    pub fn new() -> Self {
        Self
    }

    /// Selects the next generation from `parents` and the `offspring`
    /// produced from them, index-aligned (offspring `2i` and `2i + 1`
    /// descend from parents `2i` and `2i + 1`).
    ///
    /// The returned population has exactly the same size as `parents`.
    ///
    /// # Errors
    ///
    /// Returns [`GpsrError::Generation`] if the two slices differ in length
    /// or are empty.
    pub fn select(
        &self,
        parents: &[Individual],
        offspring: &[Individual],
    ) -> Result<Vec<Individual>> {
        if parents.is_empty() {
            return Err(GpsrError::Generation(
                "cannot select from an empty population".to_string(),
            ));
        }
        if parents.len() != offspring.len() {
            return Err(GpsrError::Generation(format!(
                "parent and offspring counts differ: {} vs {}",
                parents.len(),
                offspring.len()
            )));
        }

        let mut survivors = Vec::with_capacity(parents.len());
        let mut i = 0;
        while i < parents.len() {
            if i + 1 < parents.len() {
                let (p0, p1) = (&parents[i], &parents[i + 1]);
                let (c0, c1) = (&offspring[i], &offspring[i + 1]);
                // Match each child to the structurally nearest parent.
                let straight = distance(p0, c0) + distance(p1, c1);
                let crossed = distance(p0, c1) + distance(p1, c0);
                if straight <= crossed {
                    survivors.push(tournament(p0, c0).clone());
                    survivors.push(tournament(p1, c1).clone());
                } else {
                    survivors.push(tournament(p0, c1).clone());
                    survivors.push(tournament(p1, c0).clone());
                }
            } else {
                // Odd population: the last parent pairs with its own child.
                survivors.push(tournament(&parents[i], &offspring[i]).clone());
            }
            i += 2;
        }
        Ok(survivors)
    }
}

/// Structural distance between two individuals: the number of genotype rows
/// that differ (plus any length difference).
fn distance(a: &Individual, b: &Individual) -> usize {
    let differing = a
        .genotype()
        .iter()
        .zip(b.genotype())
        .filter(|(x, y)| x != y)
        .count();
    differing + a.genotype().len().abs_diff(b.genotype().len())
}

/// Decides the survivor of one parent-offspring match.
///
/// The offspring wins only with strictly better fitness, or with equal
/// fitness and strictly lower complexity. Infeasible, unevaluated, or
/// non-finite-scored offspring never displace a parent; all remaining
/// ties keep the incumbent.
fn tournament<'a>(parent: &'a Individual, child: &'a Individual) -> &'a Individual {
    // A non-finite feasible payload must not slip past the comparison and
    // win on the complexity tie-break.
    if !child.fitness().score().is_some_and(f64::is_finite) {
        return parent;
    }
    match child.fitness().compare(&parent.fitness()) {
        std::cmp::Ordering::Greater => child,
        std::cmp::Ordering::Equal if child.complexity() < parent.complexity() => child,
        _ => parent,
    }
}
