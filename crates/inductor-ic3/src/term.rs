//! Formula handles and the term-universe contract.
//!
//! Formulas are owned by an external term universe. The engine only holds
//! [`Formula`] handles and rewrites them when the universe relocates terms
//! during a collection.

use crate::Ic3Result;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Handle to a formula in the external term universe.
///
/// Equality and hashing are by identity; the ordering is the numeric id and
/// is only used to break priority ties deterministically.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Formula(u32);

impl Formula {
    #[inline]
    pub const fn from_id(id: u32) -> Self {
        Formula(id)
    }

    #[inline]
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Formula(#{})", self.0)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Term construction and inspection needed by the search.
pub trait TermManager {
    /// Negation. Implementations must normalize double negation so that
    /// `mk_not(mk_not(f)) == f`.
    fn mk_not(&self, f: Formula) -> Formula;

    /// Disjunction.
    fn mk_or(&self, a: Formula, b: Formula) -> Formula;

    /// The conjuncts of `f` if it is a conjunction.
    fn conjuncts(&self, f: Formula) -> Option<Vec<Formula>>;

    /// Reject a formula the search cannot take as a property. Checked once
    /// per query, before any other term operation on it.
    fn validate(&self, _f: Formula) -> Ic3Result<()> {
        Ok(())
    }

    /// Human-readable rendering for logs and dumps.
    fn display(&self, f: Formula) -> String {
        f.to_string()
    }
}

/// Identity rewrite table produced by a collection sweep.
///
/// A formula that is neither moved nor collected keeps its identity.
#[derive(Debug, Clone, Default)]
pub struct Relocation {
    moved: HashMap<Formula, Formula>,
    collected: HashSet<Formula>,
}

impl Relocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `from` now lives at `to`.
    pub fn insert_moved(&mut self, from: Formula, to: Formula) {
        self.collected.remove(&from);
        self.moved.insert(from, to);
    }

    /// Record that `f` no longer exists.
    pub fn insert_collected(&mut self, f: Formula) {
        self.moved.remove(&f);
        self.collected.insert(f);
    }

    /// New identity of `f`, or `None` if it was collected.
    #[inline]
    pub fn relocate(&self, f: Formula) -> Option<Formula> {
        if self.collected.contains(&f) {
            return None;
        }
        Some(self.moved.get(&f).copied().unwrap_or(f))
    }

    pub fn is_identity(&self) -> bool {
        self.moved.iter().all(|(from, to)| from == to) && self.collected.is_empty()
    }

    pub fn moved_count(&self) -> usize {
        self.moved.len()
    }

    pub fn collected_count(&self) -> usize {
        self.collected.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untouched_formula_keeps_identity() {
        let reloc = Relocation::new();
        assert_eq!(reloc.relocate(Formula::from_id(7)), Some(Formula::from_id(7)));
        assert!(reloc.is_identity());
    }

    #[test]
    fn test_moved_and_collected() {
        let mut reloc = Relocation::new();
        reloc.insert_moved(Formula::from_id(1), Formula::from_id(10));
        reloc.insert_collected(Formula::from_id(2));

        assert_eq!(reloc.relocate(Formula::from_id(1)), Some(Formula::from_id(10)));
        assert_eq!(reloc.relocate(Formula::from_id(2)), None);
        assert_eq!(reloc.relocate(Formula::from_id(3)), Some(Formula::from_id(3)));
        assert!(!reloc.is_identity());
        assert_eq!(reloc.moved_count(), 1);
        assert_eq!(reloc.collected_count(), 1);
    }

    #[test]
    fn test_collect_overrides_move() {
        let mut reloc = Relocation::new();
        reloc.insert_moved(Formula::from_id(4), Formula::from_id(5));
        reloc.insert_collected(Formula::from_id(4));
        assert_eq!(reloc.relocate(Formula::from_id(4)), None);
        assert_eq!(reloc.moved_count(), 0);
    }

    #[test]
    fn test_ordering_is_by_id() {
        assert!(Formula::from_id(1) < Formula::from_id(2));
        assert_eq!(format!("{:?}", Formula::from_id(3)), "Formula(#3)");
        assert_eq!(Formula::from_id(3).to_string(), "#3");
    }
}
