//! Induction obligations and their priority order.

use crate::term::{Formula, Relocation};
use std::cmp::Ordering;

/// A pending claim that a refutation is inductive at the current frame.
///
/// Identity is the refuted counter-state `f_cex` alone; two obligations with
/// the same `f_cex` are the same obligation whatever their scores.
#[derive(Debug, Clone)]
pub struct Obligation {
    /// Candidate invariant being pushed.
    pub f_fwd: Formula,
    /// Generalized counter-state refuted by this obligation.
    pub f_cex: Formula,
    /// Remaining distance to the property.
    pub depth: usize,
    /// Activity score.
    pub score: f64,
}

impl Obligation {
    pub fn new(f_fwd: Formula, f_cex: Formula, depth: usize, score: f64) -> Self {
        Self {
            f_fwd,
            f_cex,
            depth,
            score,
        }
    }

    /// Add `amount` to the score, saturating at zero.
    pub fn bump_score(&mut self, amount: f64) {
        self.score = (self.score + amount).max(0.0);
    }

    /// Priority order, `Greater` pops first: smaller depth wins, then larger
    /// score, then smaller `f_cex` id.
    pub fn priority_cmp(&self, other: &Self) -> Ordering {
        other
            .depth
            .cmp(&self.depth)
            .then_with(|| self.score.total_cmp(&other.score))
            .then_with(|| other.f_cex.cmp(&self.f_cex))
    }

    /// Rewrite both formulas; `None` if either was collected.
    pub fn relocate(&self, reloc: &Relocation) -> Option<Self> {
        Some(Self {
            f_fwd: reloc.relocate(self.f_fwd)?,
            f_cex: reloc.relocate(self.f_cex)?,
            depth: self.depth,
            score: self.score,
        })
    }
}

impl PartialEq for Obligation {
    fn eq(&self, other: &Self) -> bool {
        self.f_cex == other.f_cex
    }
}

impl Eq for Obligation {}
