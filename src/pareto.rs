//! # Pareto Archive
//!
//! The permanent record of the efficiency frontier between accuracy and
//! parsimony. Every feasible evaluated individual is offered to the
//! archive; it is retained iff no retained entry is at least as good on
//! both fitness and complexity and strictly better on one. Entries are
//! never evicted by population turnover, only by domination.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GpsrError, Result, ResultExt};
use crate::expression::Individual;

/// One retained point on the accuracy/parsimony frontier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoEntry {
    pub individual: Individual,
    /// Feasible residual score, lower is better.
    pub fitness: f64,
    /// Used-node count of the genotype.
    pub complexity: usize,
}

/// Non-dominated archive over `(fitness, complexity)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParetoFront {
    entries: Vec<ParetoEntry>,
}

/// Serialized form of one archive entry in the final report.
#[derive(Serialize)]
struct ExportEntry<'a> {
    equation: String,
    fitness: f64,
    complexity: usize,
    constants: &'a [f64],
}

impl ParetoFront {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers an individual to the archive. Returns `true` if it was
    /// retained.
    ///
    /// Infeasible, unevaluated, and non-finite-scored individuals are
    /// rejected outright. A candidate equal to a retained entry on both
    /// fitness and complexity is considered the same point and rejected,
    /// so the archive keeps one representative per equivalence class.
    pub fn update(&mut self, individual: &Individual) -> bool {
        let score = match individual.fitness().score() {
            Some(score) if score.is_finite() => score,
            _ => return false,
        };
        let complexity = individual.complexity();

        let dominated_or_duplicate = self.entries.iter().any(|e| {
            let duplicate = e.fitness == score && e.complexity == complexity;
            duplicate || dominates(e.fitness, e.complexity, score, complexity)
        });
        if dominated_or_duplicate {
            return false;
        }

        self.entries
            .retain(|e| !dominates(score, complexity, e.fitness, e.complexity));
        self.entries.push(ParetoEntry {
            individual: individual.clone(),
            fitness: score,
            complexity,
        });
        self.entries.sort_by(|a, b| a.complexity.cmp(&b.complexity));
        true
    }

    /// The retained frontier, ordered by ascending complexity.
    pub fn entries(&self) -> &[ParetoEntry] {
        &self.entries
    }

    /// The entry with the best (lowest) fitness, if any.
    pub fn best(&self) -> Option<&ParetoEntry> {
        self.entries.iter().min_by(|a, b| {
            a.fitness
                .partial_cmp(&b.fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the frontier as a JSON report with rendered equations.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let export: Vec<ExportEntry<'_>> = self
            .entries
            .iter()
            .map(|e| ExportEntry {
                equation: e.individual.to_string(),
                fitness: e.fitness,
                complexity: e.complexity,
                constants: e.individual.constants(),
            })
            .collect();
        let json =
            serde_json::to_string_pretty(&export).context("failed to serialize Pareto archive")?;
        std::fs::write(path.as_ref(), json).map_err(|e| {
            GpsrError::Io(std::io::Error::new(
                e.kind(),
                format!("writing archive to {}: {}", path.as_ref().display(), e),
            ))
        })
    }
}

/// Whether `(fit_a, cx_a)` dominates `(fit_b, cx_b)`: at least as good on
/// both objectives (lower fitness, lower complexity) and strictly better on
/// one.
fn dominates(fit_a: f64, cx_a: usize, fit_b: f64, cx_b: usize) -> bool {
    fit_a <= fit_b && cx_a <= cx_b && (fit_a < fit_b || cx_a < cx_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Node, OpKind};
    use crate::fitness::Fitness;

    /// Individual with a controllable complexity (`2 * depth + 1`) and
    /// injected fitness.
    fn entry(fitness: Fitness, depth: usize) -> Individual {
        let mut genotype = vec![Node::Variable(0)];
        for _ in 0..depth {
            let last = genotype.len() - 1;
            genotype.push(Node::Variable(0));
            genotype.push(Node::Op {
                kind: OpKind::Add,
                lhs: last,
                rhs: last + 1,
            });
        }
        let mut ind = Individual::new(genotype, vec![]).unwrap();
        ind.set_fitness(fitness);
        ind
    }

    fn assert_no_internal_domination(front: &ParetoFront) {
        for a in front.entries() {
            for b in front.entries() {
                if a != b {
                    assert!(
                        !dominates(a.fitness, a.complexity, b.fitness, b.complexity),
                        "{:?} dominates {:?}",
                        (a.fitness, a.complexity),
                        (b.fitness, b.complexity)
                    );
                }
            }
        }
    }

    #[test]
    fn test_known_population_scenario() {
        // Fitnesses [-1.0, -2.0, infeasible, -0.5], complexities [3, 5, _, 3].
        let mut front = ParetoFront::new();
        front.update(&entry(Fitness::Feasible(-1.0), 1));
        front.update(&entry(Fitness::Feasible(-2.0), 2));
        front.update(&entry(Fitness::Infeasible, 0));
        front.update(&entry(Fitness::Feasible(-0.5), 1));

        assert_eq!(front.len(), 2);
        let points: Vec<(f64, usize)> = front
            .entries()
            .iter()
            .map(|e| (e.fitness, e.complexity))
            .collect();
        assert!(points.contains(&(-1.0, 3)));
        assert!(points.contains(&(-2.0, 5)));
        assert_no_internal_domination(&front);
    }

    #[test]
    fn test_dominating_insert_evicts() {
        let mut front = ParetoFront::new();
        front.update(&entry(Fitness::Feasible(5.0), 2));
        front.update(&entry(Fitness::Feasible(4.0), 3));
        // Strictly better than both on fitness, no worse on complexity.
        front.update(&entry(Fitness::Feasible(1.0), 2));

        assert_eq!(front.len(), 1);
        assert_eq!(front.entries()[0].fitness, 1.0);
        assert_no_internal_domination(&front);
    }

    #[test]
    fn test_duplicate_point_rejected() {
        let mut front = ParetoFront::new();
        assert!(front.update(&entry(Fitness::Feasible(2.0), 1)));
        assert!(!front.update(&entry(Fitness::Feasible(2.0), 1)));
        assert_eq!(front.len(), 1);
    }

    #[test]
    fn test_unevaluated_and_non_finite_rejected() {
        let mut front = ParetoFront::new();
        assert!(!front.update(&entry(Fitness::Unevaluated, 1)));
        assert!(!front.update(&entry(Fitness::Infeasible, 1)));
        assert!(!front.update(&entry(Fitness::Feasible(f64::NAN), 1)));
        assert!(front.is_empty());
    }

    #[test]
    fn test_no_domination_after_random_updates() {
        use crate::rng::RandomNumberGenerator;
        let mut rng = RandomNumberGenerator::from_seed(13);
        let mut front = ParetoFront::new();
        for _ in 0..200 {
            let score: f64 = rng.gen_range(0.0..10.0);
            let fitness = Fitness::Feasible(score.floor());
            let depth = rng.pick_index(6);
            front.update(&entry(fitness, depth));
            assert_no_internal_domination(&front);
        }
    }

    #[test]
    fn test_best_returns_lowest_fitness() {
        let mut front = ParetoFront::new();
        front.update(&entry(Fitness::Feasible(3.0), 1));
        front.update(&entry(Fitness::Feasible(1.0), 3));
        assert_eq!(front.best().map(|e| e.fitness), Some(1.0));
    }

    #[test]
    fn test_entries_sorted_by_complexity() {
        let mut front = ParetoFront::new();
        front.update(&entry(Fitness::Feasible(1.0), 3));
        front.update(&entry(Fitness::Feasible(2.0), 1));
        front.update(&entry(Fitness::Feasible(0.5), 5));
        let complexities: Vec<usize> = front.entries().iter().map(|e| e.complexity).collect();
        let mut sorted = complexities.clone();
        sorted.sort_unstable();
        assert_eq!(complexities, sorted);
    }
}
