//! Contracts of the collaborators the search drives.
//!
//! The engine never decides satisfiability itself. An [`InductionOracle`]
//! answers induction queries and owns the incremental solvers, a
//! [`Reachability`] checker decides whether a counter-state is concretely
//! reachable, and a [`TraceRecorder`] materializes counterexample states from
//! solver models. A [`Backend`] opens one such [`Session`] per query.

use crate::term::{Formula, Relocation, TermManager};
use crate::Ic3Result;
use std::fmt;

/// Satisfiability answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown,
}

/// Role of a formula in the multi-step induction check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InductionRole {
    /// Assumed at the first step of the unrolling.
    First,
    /// Assumed at the intermediate steps of the unrolling.
    Intermediate,
}

/// Interpolation class of an assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaClass {
    A,
    B,
}

/// Answer to an induction query. On SAT the oracle supplies a generalized
/// counter-state and the concrete model witnessing it.
#[derive(Debug, Clone)]
pub struct InductionQuery<M> {
    pub result: SatResult,
    pub generalization: Option<Formula>,
    pub model: Option<M>,
}

impl<M> InductionQuery<M> {
    pub fn unsat() -> Self {
        Self {
            result: SatResult::Unsat,
            generalization: None,
            model: None,
        }
    }

    pub fn sat(generalization: Formula, model: M) -> Self {
        Self {
            result: SatResult::Sat,
            generalization: Some(generalization),
            model: Some(model),
        }
    }
}

/// Answer to a query over the initial states, with a model on SAT.
#[derive(Debug, Clone)]
pub struct InitQuery<M> {
    pub result: SatResult,
    pub model: Option<M>,
}

/// Verdict of a bounded reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachStatus {
    Reachable,
    Unreachable,
}

/// Incremental scoped solver used to build counterexample traces.
pub trait CounterexampleSolver {
    type Model;

    fn push(&mut self);

    fn pop(&mut self);

    fn add(&mut self, f: Formula, class: FormulaClass) -> Ic3Result<()>;

    fn check(&mut self) -> Ic3Result<SatResult>;

    /// Model of the last SAT check.
    fn model(&self) -> Ic3Result<Self::Model>;
}

/// Decision procedures over the transition system of one query.
pub trait InductionOracle {
    type Model: Clone + fmt::Debug;
    type Solver: CounterexampleSolver<Model = Self::Model>;

    /// Is `f` inductive relative to the formulas registered in the induction
    /// solver? UNSAT means it is.
    fn check_inductive(&mut self, f: Formula) -> Ic3Result<InductionQuery<Self::Model>>;

    /// A formula over-approximating the states reachable at `frame_index`
    /// that refutes the counter-state `g`.
    fn learn_forward(&mut self, frame_index: usize, g: Formula) -> Ic3Result<Formula>;

    /// An interpolant from the last induction query of `f`, which must have
    /// been UNSAT.
    fn interpolate_induction(&mut self, f: Formula) -> Ic3Result<Formula>;

    fn add_to_induction_solver(&mut self, f: Formula, role: InductionRole) -> Ic3Result<()>;

    /// Drop every registered formula and unroll `depth` steps from now on.
    fn reset_induction_solver(&mut self, depth: usize) -> Ic3Result<()>;

    /// Is `f` satisfiable in some initial state?
    fn query_at_init(&mut self, f: Formula) -> Ic3Result<InitQuery<Self::Model>>;

    /// Make the counterexample solver able to reason about `depth` steps.
    fn ensure_counterexample_solver_depth(&mut self, depth: usize);

    fn counterexample_solver_depth(&self) -> usize;

    fn counterexample_solver(&mut self) -> &mut Self::Solver;

    /// Safe point for collecting the term universe. Called only while no
    /// obligations are staged for the next frame; returns the relocation if
    /// a collection happened.
    fn gc(&mut self) -> Ic3Result<Option<Relocation>>;

    /// Rewrite the oracle's own stored formulas after a collection.
    fn gc_collect(&mut self, reloc: &Relocation);
}

/// Bounded reachability of counter-states.
pub trait Reachability<O: InductionOracle> {
    fn init(&mut self, oracle: &mut O) -> Ic3Result<()>;

    /// Is `g` concretely reachable at some step in `start..=end`? `model` is
    /// the oracle's witness for `g`.
    fn check_reachable(
        &mut self,
        oracle: &mut O,
        start: usize,
        end: usize,
        g: Formula,
        model: &O::Model,
    ) -> Ic3Result<ReachStatus>;

    /// Counter-trace fragment of the last REACHABLE answer, one state formula
    /// per step with the reached generalization last.
    fn cex(&self) -> &[Formula];

    fn clear(&mut self);

    fn gc_collect(&mut self, reloc: &Relocation);
}

/// Materializes counterexample states.
pub trait TraceRecorder {
    type Model;

    /// `f` asserted over the state variables of step `step`.
    fn state_formula(&mut self, f: Formula, step: usize) -> Formula;

    /// Replace the recorded trace with the states of `model`.
    fn set_model(&mut self, model: Self::Model);

    /// Number of recorded states.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The collaborators of one query.
pub struct Session<B: Backend + ?Sized> {
    pub terms: B::Terms,
    pub oracle: B::Oracle,
    pub reachability: B::Reachability,
    pub trace: B::Trace,
}

/// Factory for per-query collaborators.
pub trait Backend {
    type System;
    type Model: Clone + fmt::Debug;
    type Terms: TermManager;
    type Oracle: InductionOracle<Model = Self::Model>;
    type Reachability: Reachability<Self::Oracle>;
    type Trace: TraceRecorder<Model = Self::Model>;

    fn open(&mut self, system: &Self::System) -> Ic3Result<Session<Self>>;
}
