//! Explicit-state backend for the IC3 engine.
//!
//! Systems are finite state graphs and formulas are sets of states, so every
//! oracle query is answered exactly by layered image computation. Useful for
//! small hand-written models and for exercising the search end to end.

pub mod oracle;
pub mod reach;
pub mod system;
pub mod trace;
pub mod universe;

use inductor_ic3::{Backend, Formula, Ic3Error, Ic3Result, Session};
use std::rc::Rc;
use thiserror::Error;

pub use oracle::{ExplicitOracle, ForwardLearning, PathSolver};
pub use reach::ExplicitReachability;
pub use system::{ExplicitSystem, StateSet};
pub use trace::StateTrace;
pub use universe::{Term, Universe};

/// State of an explicit system.
pub type StateId = u32;

/// A path of states, one per step.
pub type StatePath = Vec<StateId>;

#[derive(Debug, Error)]
pub enum ExplicitError {
    #[error("state {state} out of range for a system of {num_states} states")]
    StateOutOfRange { state: StateId, num_states: usize },

    #[error("system has no states")]
    EmptySystem,

    #[error("{0} states exceed the state id range")]
    TooManyStates(usize),

    #[error("system has {system} states but the universe has {universe}")]
    UniverseMismatch { system: usize, universe: usize },

    #[error("unknown formula {0}")]
    UnknownFormula(Formula),

    #[error("{0} is a step formula, expected a state formula")]
    NotAStateFormula(Formula),

    #[error("{0} is not a step formula")]
    NotAStepFormula(Formula),
}

impl From<ExplicitError> for Ic3Error {
    fn from(e: ExplicitError) -> Self {
        Ic3Error::Backend(e.to_string())
    }
}

/// Opens explicit sessions over a shared term universe.
#[derive(Debug, Clone)]
pub struct ExplicitBackend {
    universe: Universe,
    forward: ForwardLearning,
    collect_threshold: usize,
}

impl ExplicitBackend {
    pub fn new(universe: Universe) -> Self {
        Self {
            universe,
            forward: ForwardLearning::default(),
            collect_threshold: 1,
        }
    }

    pub fn with_forward_learning(mut self, forward: ForwardLearning) -> Self {
        self.forward = forward;
        self
    }

    /// See [`ExplicitOracle::set_collect_threshold`].
    pub fn with_collect_threshold(mut self, threshold: usize) -> Self {
        self.collect_threshold = threshold;
        self
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }
}

impl Backend for ExplicitBackend {
    type System = ExplicitSystem;
    type Model = StatePath;
    type Terms = Universe;
    type Oracle = ExplicitOracle;
    type Reachability = ExplicitReachability;
    type Trace = StateTrace;

    fn open(&mut self, system: &ExplicitSystem) -> Ic3Result<Session<Self>> {
        if system.num_states() != self.universe.num_states() {
            return Err(ExplicitError::UniverseMismatch {
                system: system.num_states(),
                universe: self.universe.num_states(),
            }
            .into());
        }
        let system = Rc::new(system.clone());
        let mut oracle = ExplicitOracle::new(system.clone(), self.universe.clone());
        oracle.set_forward_learning(self.forward);
        oracle.set_collect_threshold(self.collect_threshold);
        Ok(Session {
            terms: self.universe.clone(),
            oracle,
            reachability: ExplicitReachability::new(system, self.universe.clone()),
            trace: StateTrace::new(self.universe.clone()),
        })
    }
}
