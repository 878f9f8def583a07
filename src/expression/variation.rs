//! # Variation Operators
//!
//! Structural crossover and mutation over stack-encoded genotypes. Both
//! operators compose only valid sub-structures, so offspring satisfy the
//! genotype invariant by construction; a failed build is retried with fresh
//! random draws rather than surfacing a structural error into the
//! population.

use tracing::warn;

use crate::error::{GpsrError, Result};
use crate::rng::RandomNumberGenerator;

use super::component::ComponentPool;
use super::individual::{Individual, Node};

/// Attempts before a variation operator gives up on producing a valid
/// offspring. In practice the first attempt always succeeds.
const MAX_VARIATION_ATTEMPTS: usize = 8;

/// Single-point crossover over two equal-length genotypes.
///
/// The genotypes are cut at one random row; the children take the prefix of
/// one parent and the tail of the other. Because every operator row only
/// references earlier rows, the splice is structurally valid no matter where
/// the cut lands, and child genotype length equals parent genotype length,
/// so the stack-size bound always holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crossover;

impl Crossover {
    pub fn new() -> Self {
        Self
    }

    /// Produces two offspring from two parents.
    ///
    /// # Errors
    ///
    /// Returns [`GpsrError::Generation`] if the parents have different
    /// genotype lengths (the engine keeps all genotypes at the configured
    /// stack size, so this indicates a caller bug) or no valid offspring
    /// could be built.
    pub fn recombine(
        &self,
        parent_a: &Individual,
        parent_b: &Individual,
        rng: &mut RandomNumberGenerator,
    ) -> Result<(Individual, Individual)> {
        let len = parent_a.genotype().len();
        if len != parent_b.genotype().len() {
            return Err(GpsrError::Generation(format!(
                "crossover requires equal genotype lengths, got {} and {}",
                len,
                parent_b.genotype().len()
            )));
        }
        if len < 2 {
            // Nothing to exchange; children are copies of the parents.
            return Ok((parent_a.clone(), parent_b.clone()));
        }

        for attempt in 0..MAX_VARIATION_ATTEMPTS {
            let point = rng.gen_range(1..len);
            let first = splice(parent_a, parent_b, point);
            let second = splice(parent_b, parent_a, point);
            match (first, second) {
                (Ok(c1), Ok(c2)) => return Ok((c1, c2)),
                _ => warn!(attempt, point, "crossover produced invalid genotype, retrying"),
            }
        }
        Err(GpsrError::Generation(
            "crossover failed to produce a valid offspring".to_string(),
        ))
    }
}

/// Builds a child from `prefix_parent[..point]` and `tail_parent[point..]`,
/// rebuilding the constants vector so every constant reference resolves to
/// the value it had in its source parent.
fn splice(
    prefix_parent: &Individual,
    tail_parent: &Individual,
    point: usize,
) -> Result<Individual> {
    let mut constants = Vec::new();
    let mut genotype = Vec::with_capacity(prefix_parent.genotype().len());

    let mut remap_prefix = vec![None; prefix_parent.constants().len()];
    let mut remap_tail = vec![None; tail_parent.constants().len()];

    for (row, node) in prefix_parent
        .genotype()
        .iter()
        .take(point)
        .chain(tail_parent.genotype().iter().skip(point))
        .enumerate()
    {
        let from_prefix = row < point;
        let node = match *node {
            Node::Constant(k) => {
                let (source, remap) = if from_prefix {
                    (prefix_parent.constants(), &mut remap_prefix)
                } else {
                    (tail_parent.constants(), &mut remap_tail)
                };
                let new_idx = match remap[k] {
                    Some(idx) => idx,
                    None => {
                        constants.push(source[k]);
                        let idx = constants.len() - 1;
                        remap[k] = Some(idx);
                        idx
                    }
                };
                Node::Constant(new_idx)
            }
            other => other,
        };
        genotype.push(node);
    }

    Individual::new(genotype, constants)
}

/// Mutation over one individual: replaces a random row with a fresh draw
/// from the component pool, flips an operator kind in place, or perturbs a
/// constant.
#[derive(Debug, Clone)]
pub struct Mutation {
    pool: ComponentPool,
}

#[derive(Debug, Clone, Copy)]
enum MutationArm {
    ReplaceNode,
    FlipOperator,
    PerturbConstant,
}

impl Mutation {
    pub fn new(pool: ComponentPool) -> Self {
        Self { pool }
    }

    /// Mutates the individual in place, invalidating its fitness.
    pub fn mutate(&self, individual: &mut Individual, rng: &mut RandomNumberGenerator) {
        let arm = self.pick_arm(individual, rng);
        let (genotype, constants) = individual.parts_mut();

        match arm {
            MutationArm::ReplaceNode => {
                let row = rng.pick_index(genotype.len());
                genotype[row] = self.pool.random_node(row, constants, rng);
            }
            MutationArm::FlipOperator => {
                let op_rows: Vec<usize> = genotype
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| matches!(n, Node::Op { .. }))
                    .map(|(i, _)| i)
                    .collect();
                let row = op_rows[rng.pick_index(op_rows.len())];
                if let Node::Op { kind, .. } = &mut genotype[row] {
                    let mut replacement = self.pool.random_operator(rng);
                    while replacement == *kind {
                        replacement = self.pool.random_operator(rng);
                    }
                    *kind = replacement;
                }
            }
            MutationArm::PerturbConstant => {
                let slot = rng.pick_index(constants.len());
                let scale = constants[slot].abs() + 1.0;
                constants[slot] += rng.gen_range(-0.5..0.5) * scale;
            }
        }

        individual.compact_constants();
        individual.mark_modified();
    }

    /// Picks a mutation arm uniformly among those applicable to this
    /// individual.
    fn pick_arm(&self, individual: &Individual, rng: &mut RandomNumberGenerator) -> MutationArm {
        let mut arms = vec![MutationArm::ReplaceNode];
        let has_op = individual
            .genotype()
            .iter()
            .any(|n| matches!(n, Node::Op { .. }));
        if has_op && self.pool.operators().len() > 1 {
            arms.push(MutationArm::FlipOperator);
        }
        if !individual.constants().is_empty() {
            arms.push(MutationArm::PerturbConstant);
        }
        arms[rng.pick_index(arms.len())]
    }
}
