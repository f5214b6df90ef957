use crate::universe::Universe;
use crate::{StateId, StatePath};
use inductor_ic3::{Formula, TraceRecorder};

/// Counterexample trace as a path of states.
#[derive(Debug, Clone)]
pub struct StateTrace {
    universe: Universe,
    states: StatePath,
}

impl StateTrace {
    pub fn new(universe: Universe) -> Self {
        Self {
            universe,
            states: Vec::new(),
        }
    }

    /// Recorded states, one per step.
    pub fn states(&self) -> &[StateId] {
        &self.states
    }

    pub fn last(&self) -> Option<StateId> {
        self.states.last().copied()
    }
}

impl TraceRecorder for StateTrace {
    type Model = StatePath;

    fn state_formula(&mut self, f: Formula, step: usize) -> Formula {
        self.universe.at(f, step)
    }

    fn set_model(&mut self, model: StatePath) {
        self.states = model;
    }

    fn len(&self) -> usize {
        self.states.len()
    }
}
