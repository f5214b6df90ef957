//! Induction oracle and counterexample path solver over explicit systems.

use crate::system::{ExplicitSystem, StateSet};
use crate::universe::Universe;
use crate::StatePath;
use inductor_ic3::{
    CounterexampleSolver, Formula, FormulaClass, Ic3Error, Ic3Result, InductionOracle,
    InductionQuery, InductionRole, InitQuery, Relocation, SatResult, TermManager,
};
use std::rc::Rc;
use tracing::{debug, trace};

/// Scoped solver for path constraints `f@k`. A check searches a path from an
/// initial state through every constrained step; the model is the path.
#[derive(Debug)]
pub struct PathSolver {
    system: Rc<ExplicitSystem>,
    universe: Universe,
    scopes: Vec<Vec<Formula>>,
    depth: usize,
    model: Option<StatePath>,
}

impl PathSolver {
    pub fn new(system: Rc<ExplicitSystem>, universe: Universe) -> Self {
        Self {
            system,
            universe,
            scopes: vec![Vec::new()],
            depth: 0,
            model: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn ensure_depth(&mut self, depth: usize) {
        self.depth = self.depth.max(depth);
    }

    fn relocate(&mut self, reloc: &Relocation) {
        for scope in &mut self.scopes {
            scope.retain_mut(|f| match reloc.relocate(*f) {
                Some(to) => {
                    *f = to;
                    true
                }
                None => false,
            });
        }
    }
}

impl CounterexampleSolver for PathSolver {
    type Model = StatePath;

    fn push(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop(&mut self) {
        assert!(self.scopes.len() > 1, "pop of the base scope");
        self.scopes.pop();
        self.model = None;
    }

    fn add(&mut self, f: Formula, _class: FormulaClass) -> Ic3Result<()> {
        self.universe.step_formula(f)?;
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(f);
        }
        Ok(())
    }

    fn check(&mut self) -> Ic3Result<SatResult> {
        let n = self.system.num_states();
        let mut constraints: Vec<StateSet> = Vec::new();
        for &f in self.scopes.iter().flatten() {
            let (set, step) = self.universe.step_formula(f)?;
            if constraints.len() <= step {
                constraints.resize(step + 1, StateSet::full(n));
            }
            constraints[step] = constraints[step].intersect(&set);
        }
        if constraints.is_empty() {
            constraints.push(StateSet::full(n));
        }

        self.model = self
            .system
            .constrained_layers(self.system.init(), &constraints)
            .and_then(|layers| {
                let last = layers.last()?.first()?;
                Some(self.system.witness(&layers, last))
            });
        trace!(steps = constraints.len(), sat = self.model.is_some(), "path check");
        Ok(if self.model.is_some() {
            SatResult::Sat
        } else {
            SatResult::Unsat
        })
    }

    fn model(&self) -> Ic3Result<StatePath> {
        self.model.clone().ok_or(Ic3Error::MissingWitness {
            context: "a path model",
        })
    }
}

/// How [`ExplicitOracle`] refutes a counter-state forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardLearning {
    /// The complement of the counter-state.
    #[default]
    Negation,
    /// The states reachable within `frame_index` steps, if they exclude the
    /// counter-state.
    Reachable,
}

/// k-step induction over state sets.
///
/// A check of `f` at depth `d` looks for a path `s0 .. sd` with `s0` in every
/// FIRST formula, `s1 .. s(d-1)` in every INTERMEDIATE formula and `sd`
/// outside `f`. The generalization of a counter-model is its first state.
#[derive(Debug)]
pub struct ExplicitOracle {
    system: Rc<ExplicitSystem>,
    universe: Universe,
    depth: usize,
    first: Vec<Formula>,
    intermediate: Vec<Formula>,
    solver: PathSolver,
    forward: ForwardLearning,
    collect_threshold: usize,
}

impl ExplicitOracle {
    pub fn new(system: Rc<ExplicitSystem>, universe: Universe) -> Self {
        Self {
            solver: PathSolver::new(system.clone(), universe.clone()),
            system,
            universe,
            depth: 1,
            first: Vec::new(),
            intermediate: Vec::new(),
            forward: ForwardLearning::default(),
            collect_threshold: 1,
        }
    }

    /// Collect the universe at a safe point once it holds at least
    /// `threshold` step terms; 0 disables collection.
    pub fn set_collect_threshold(&mut self, threshold: usize) {
        self.collect_threshold = threshold;
    }

    pub fn set_forward_learning(&mut self, forward: ForwardLearning) {
        self.forward = forward;
    }

    pub fn induction_depth(&self) -> usize {
        self.depth
    }

    fn conjunction(&self, formulas: &[Formula]) -> Ic3Result<StateSet> {
        let mut acc = StateSet::full(self.system.num_states());
        for &f in formulas {
            acc = acc.intersect(&self.universe.eval(f)?);
        }
        Ok(acc)
    }

    fn reachable_within(&self, steps: usize) -> StateSet {
        let mut layer = self.system.init().clone();
        let mut reached = layer.clone();
        for _ in 0..steps {
            layer = self.system.post(&layer);
            reached = reached.union(&layer);
        }
        reached
    }
}

impl InductionOracle for ExplicitOracle {
    type Model = StatePath;
    type Solver = PathSolver;

    fn check_inductive(&mut self, f: Formula) -> Ic3Result<InductionQuery<StatePath>> {
        let n = self.system.num_states();
        let mut constraints = Vec::with_capacity(self.depth + 1);
        constraints.push(self.conjunction(&self.first)?);
        let intermediate = self.conjunction(&self.intermediate)?;
        for _ in 1..self.depth {
            constraints.push(intermediate.clone());
        }
        constraints.push(self.universe.eval(f)?.complement());

        let full = StateSet::full(n);
        let Some(layers) = self.system.constrained_layers(&full, &constraints) else {
            trace!(depth = self.depth, "inductive");
            return Ok(InductionQuery::unsat());
        };
        let last = layers
            .last()
            .and_then(StateSet::first)
            .ok_or(Ic3Error::MissingWitness {
                context: "a counter-model",
            })?;
        let path = self.system.witness(&layers, last);
        let g = self.universe.states(&path[..1]);
        trace!(depth = self.depth, ?path, "not inductive");
        Ok(InductionQuery::sat(g, path))
    }

    fn learn_forward(&mut self, frame_index: usize, g: Formula) -> Ic3Result<Formula> {
        let counter = self.universe.eval(g)?;
        if self.forward == ForwardLearning::Reachable {
            let reached = self.reachable_within(frame_index);
            if reached.intersect(&counter).is_empty() {
                return Ok(self.universe.set(reached));
            }
        }
        Ok(self.universe.mk_not(g))
    }

    fn interpolate_induction(&mut self, f: Formula) -> Ic3Result<Formula> {
        Ok(f)
    }

    fn add_to_induction_solver(&mut self, f: Formula, role: InductionRole) -> Ic3Result<()> {
        self.universe.eval(f)?;
        match role {
            InductionRole::First => self.first.push(f),
            InductionRole::Intermediate => self.intermediate.push(f),
        }
        Ok(())
    }

    fn reset_induction_solver(&mut self, depth: usize) -> Ic3Result<()> {
        if depth == 0 {
            return Err(Ic3Error::Solver("induction depth must be positive".into()));
        }
        self.first.clear();
        self.intermediate.clear();
        self.depth = depth;
        Ok(())
    }

    fn query_at_init(&mut self, f: Formula) -> Ic3Result<InitQuery<StatePath>> {
        let hit = self.system.init().intersect(&self.universe.eval(f)?).first();
        Ok(match hit {
            Some(s) => InitQuery {
                result: SatResult::Sat,
                model: Some(vec![s]),
            },
            None => InitQuery {
                result: SatResult::Unsat,
                model: None,
            },
        })
    }

    fn ensure_counterexample_solver_depth(&mut self, depth: usize) {
        self.solver.ensure_depth(depth);
    }

    fn counterexample_solver_depth(&self) -> usize {
        self.solver.depth()
    }

    fn counterexample_solver(&mut self) -> &mut PathSolver {
        &mut self.solver
    }

    fn gc(&mut self) -> Ic3Result<Option<Relocation>> {
        if self.collect_threshold == 0 || self.universe.step_terms() < self.collect_threshold {
            return Ok(None);
        }
        Ok(Some(self.universe.collect()))
    }

    fn gc_collect(&mut self, reloc: &Relocation) {
        let relocate = |fs: &mut Vec<Formula>| {
            *fs = fs.iter().filter_map(|&f| reloc.relocate(f)).collect();
        };
        relocate(&mut self.first);
        relocate(&mut self.intermediate);
        self.solver.relocate(reloc);
        debug!(
            first = self.first.len(),
            intermediate = self.intermediate.len(),
            "oracle relocated"
        );
    }
}
