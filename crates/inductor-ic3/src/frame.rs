//! The induction frame: formulas assumed to hold at the active frame.
//!
//! Formulas registered in the FIRST role are members of the frame set and are
//! mirrored into the oracle's induction solver. INTERMEDIATE registrations only
//! strengthen the oracle's multi-step check. A few bookkeeping members enter
//! the set without any oracle registration (see [`InductionFrame::insert`]).

use crate::oracle::{InductionOracle, InductionRole};
use crate::term::{Formula, Relocation};
use crate::Ic3Result;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct InductionFrame {
    formulas: BTreeSet<Formula>,
    intermediate: BTreeSet<Formula>,
}

impl InductionFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` in `role` and forward it to the oracle.
    ///
    /// Panics if `f` is already in the frame set (FIRST) or already registered
    /// as intermediate (INTERMEDIATE).
    pub fn add<O: InductionOracle>(
        &mut self,
        f: Formula,
        role: InductionRole,
        oracle: &mut O,
    ) -> Ic3Result<()> {
        match role {
            InductionRole::First => {
                assert!(
                    self.formulas.insert(f),
                    "formula {f} is already in the induction frame"
                );
            }
            InductionRole::Intermediate => {
                assert!(
                    self.intermediate.insert(f),
                    "formula {f} is already registered as intermediate"
                );
            }
        }
        oracle.add_to_induction_solver(f, role)
    }

    /// Insert into the frame set only, without telling the oracle.
    pub fn insert(&mut self, f: Formula) -> bool {
        self.formulas.insert(f)
    }

    pub fn remove(&mut self, f: Formula) -> bool {
        self.formulas.remove(&f)
    }

    #[inline]
    pub fn contains(&self, f: Formula) -> bool {
        self.formulas.contains(&f)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// Frame members in identity order.
    pub fn iter(&self) -> impl Iterator<Item = Formula> + '_ {
        self.formulas.iter().copied()
    }

    /// Empty the frame and reset the oracle's induction solver to `depth`.
    pub fn clear<O: InductionOracle>(&mut self, oracle: &mut O, depth: usize) -> Ic3Result<()> {
        self.formulas.clear();
        self.intermediate.clear();
        oracle.reset_induction_solver(depth)
    }

    pub fn relocate(&mut self, reloc: &Relocation) {
        self.formulas = self
            .formulas
            .iter()
            .filter_map(|&f| reloc.relocate(f))
            .collect();
        self.intermediate = self
            .intermediate
            .iter()
            .filter_map(|&f| reloc.relocate(f))
            .collect();
    }
}
