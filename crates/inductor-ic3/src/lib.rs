//! IC3-style frame-induction search for symbolic safety checking.
//!
//! The engine proves a safety property of a transition system by growing an
//! induction frame of learnt formulas until it is inductive, or disproves it
//! by reconstructing a concrete counterexample through the provenance of the
//! learnt formulas. Decision procedures are pluggable through the traits in
//! [`oracle`]; the engine only orchestrates the search.

pub mod engine;
mod extend;
pub mod frame;
pub mod obligation;
pub mod oracle;
pub mod provenance;
pub mod queue;
pub mod stats;
pub mod term;

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use engine::Ic3Engine;
pub use frame::InductionFrame;
pub use obligation::Obligation;
pub use oracle::{
    Backend, CounterexampleSolver, FormulaClass, InductionOracle, InductionQuery, InductionRole,
    InitQuery, ReachStatus, Reachability, SatResult, Session, TraceRecorder,
};
pub use provenance::{ParentInfo, Provenance};
pub use queue::{ObligationHandle, ObligationQueue};
pub use stats::Ic3Stats;
pub use term::{Formula, Relocation, TermManager};

/// IC3 engine error.
#[derive(Debug, Error)]
pub enum Ic3Error {
    #[error("solver error: {0}")]
    Solver(String),

    #[error("solver returned unknown during {context}")]
    SolverUnknown { context: &'static str },

    #[error("solver answered SAT without {context}")]
    MissingWitness { context: &'static str },

    #[error("reachability error: {0}")]
    Reachability(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("no query has been run")]
    NoQuery,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Ic3Result<T> = Result<T, Ic3Error>;

/// Result of an IC3 query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ic3Outcome {
    /// The frame reached a fixpoint: it is an inductive invariant.
    Valid,
    /// The property was disproved; a counterexample trace is available.
    Invalid,
    /// The frame bound was reached before a verdict.
    Interrupted,
    /// Reserved; the search loop itself never produces it.
    Unknown,
}

impl fmt::Display for Ic3Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Ic3Outcome::Valid => "valid",
            Ic3Outcome::Invalid => "invalid",
            Ic3Outcome::Interrupted => "interrupted",
            Ic3Outcome::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Configuration for the IC3 engine.
#[derive(Debug, Clone)]
pub struct Ic3Config {
    /// Maximum number of frame rounds (0 = unlimited).
    pub max_frames: usize,
    /// Whether to extend counterexamples backward through the provenance graph.
    pub extend_counterexample: bool,
    /// Log the inductive invariant when the property is proven.
    pub show_invariant: bool,
    /// Directory to write `dependency.<frame>.dot` files into after every round.
    pub dump_dependencies: Option<PathBuf>,
}

impl Default for Ic3Config {
    fn default() -> Self {
        Self {
            max_frames: 0,
            extend_counterexample: true,
            show_invariant: false,
            dump_dependencies: None,
        }
    }
}
