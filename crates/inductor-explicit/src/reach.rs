//! Bounded reachability by forward image layers from the initial states.

use crate::oracle::ExplicitOracle;
use crate::system::{ExplicitSystem, StateSet};
use crate::universe::Universe;
use crate::StatePath;
use inductor_ic3::{Formula, Ic3Result, ReachStatus, Reachability, Relocation};
use std::rc::Rc;
use tracing::trace;

/// Decides whether a counter-state is hit at an exact step of a window.
///
/// The layers `R0 = init`, `R(i+1) = post(Ri)` are computed on demand and
/// kept for the whole query.
#[derive(Debug)]
pub struct ExplicitReachability {
    system: Rc<ExplicitSystem>,
    universe: Universe,
    layers: Vec<StateSet>,
    cex: Vec<Formula>,
}

impl ExplicitReachability {
    pub fn new(system: Rc<ExplicitSystem>, universe: Universe) -> Self {
        Self {
            system,
            universe,
            layers: Vec::new(),
            cex: Vec::new(),
        }
    }

    fn extend_layers(&mut self, end: usize) {
        if self.layers.is_empty() {
            self.layers.push(self.system.init().clone());
        }
        while self.layers.len() <= end {
            let next = self.system.post(&self.layers[self.layers.len() - 1]);
            self.layers.push(next);
        }
    }
}

impl Reachability<ExplicitOracle> for ExplicitReachability {
    fn init(&mut self, _oracle: &mut ExplicitOracle) -> Ic3Result<()> {
        self.layers.clear();
        self.cex.clear();
        self.extend_layers(0);
        Ok(())
    }

    fn check_reachable(
        &mut self,
        _oracle: &mut ExplicitOracle,
        start: usize,
        end: usize,
        g: Formula,
        _model: &StatePath,
    ) -> Ic3Result<ReachStatus> {
        let target = self.universe.eval(g)?;
        self.extend_layers(end);

        for step in start..=end {
            let Some(last) = self.layers[step].intersect(&target).first() else {
                continue;
            };
            let path = self.system.witness(&self.layers[..=step], last);
            trace!(step, ?path, "counter-state reachable");
            self.cex = path.iter().map(|&s| self.universe.states(&[s])).collect();
            return Ok(ReachStatus::Reachable);
        }
        Ok(ReachStatus::Unreachable)
    }

    fn cex(&self) -> &[Formula] {
        &self.cex
    }

    fn clear(&mut self) {
        self.cex.clear();
    }

    fn gc_collect(&mut self, reloc: &Relocation) {
        self.cex = self.cex.iter().filter_map(|&f| reloc.relocate(f)).collect();
    }
}
