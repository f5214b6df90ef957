//! A scripted backend: every oracle answer comes from a table the test fills
//! in, and every call is logged.

#![allow(dead_code)]

use inductor_ic3::{
    Backend, CounterexampleSolver, Formula, FormulaClass, Ic3Result, InductionOracle,
    InductionQuery, InductionRole, InitQuery, ReachStatus, Reachability, Relocation, SatResult,
    Session, TermManager, TraceRecorder,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Atom(String),
    Not(Formula),
    Or(Formula, Formula),
    And(Vec<Formula>),
    At(Formula, usize),
}

impl Term {
    fn relocate(&self, reloc: &Relocation) -> Term {
        let r = |f: &Formula| reloc.relocate(*f).unwrap_or(*f);
        match self {
            Term::Atom(name) => Term::Atom(name.clone()),
            Term::Not(a) => Term::Not(r(a)),
            Term::Or(a, b) => Term::Or(r(a), r(b)),
            Term::And(cs) => Term::And(cs.iter().map(r).collect()),
            Term::At(a, k) => Term::At(r(a), *k),
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    base: u32,
    /// Build `¬¬f` as a new term instead of returning `f`.
    keep_double_negation: bool,
    terms: Vec<Term>,
    index: HashMap<Term, Formula>,
}

impl Table {
    fn intern(&mut self, term: Term) -> Formula {
        if let Some(&f) = self.index.get(&term) {
            return f;
        }
        let f = Formula::from_id(self.base + self.terms.len() as u32);
        self.terms.push(term.clone());
        self.index.insert(term, f);
        f
    }

    fn get(&self, f: Formula) -> &Term {
        &self.terms[(f.id() - self.base) as usize]
    }

    /// Move every term `delta` ids up.
    fn shift(&mut self, delta: u32) -> Relocation {
        let mut reloc = Relocation::new();
        for i in 0..self.terms.len() as u32 {
            reloc.insert_moved(
                Formula::from_id(self.base + i),
                Formula::from_id(self.base + delta + i),
            );
        }
        self.base += delta;
        self.terms = self.terms.iter().map(|t| t.relocate(&reloc)).collect();
        self.index = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), Formula::from_id(self.base + i as u32)))
            .collect();
        reloc
    }
}

/// Shared handle to the scripted term universe.
#[derive(Debug, Clone, Default)]
pub struct Terms(Rc<RefCell<Table>>);

impl Terms {
    pub fn atom(&self, name: &str) -> Formula {
        self.0.borrow_mut().intern(Term::Atom(name.to_string()))
    }

    pub fn not(&self, f: Formula) -> Formula {
        self.mk_not(f)
    }

    pub fn and(&self, conjuncts: &[Formula]) -> Formula {
        self.0.borrow_mut().intern(Term::And(conjuncts.to_vec()))
    }

    pub fn or(&self, a: Formula, b: Formula) -> Formula {
        self.mk_or(a, b)
    }

    pub fn at(&self, f: Formula, step: usize) -> Formula {
        self.0.borrow_mut().intern(Term::At(f, step))
    }

    pub fn term(&self, f: Formula) -> Term {
        self.0.borrow().get(f).clone()
    }

    pub fn keep_double_negation(&self) {
        self.0.borrow_mut().keep_double_negation = true;
    }

    /// Relocate the whole universe `delta` ids up, as an owner-driven
    /// collection would.
    pub fn shift(&self, delta: u32) -> Relocation {
        self.0.borrow_mut().shift(delta)
    }
}

impl TermManager for Terms {
    fn mk_not(&self, f: Formula) -> Formula {
        let mut table = self.0.borrow_mut();
        if let Term::Not(inner) = table.get(f) {
            if !table.keep_double_negation {
                return *inner;
            }
        }
        table.intern(Term::Not(f))
    }

    fn mk_or(&self, a: Formula, b: Formula) -> Formula {
        self.0.borrow_mut().intern(Term::Or(a, b))
    }

    fn conjuncts(&self, f: Formula) -> Option<Vec<Formula>> {
        match self.0.borrow().get(f) {
            Term::And(cs) => Some(cs.clone()),
            _ => None,
        }
    }

    fn display(&self, f: Formula) -> String {
        format!("{:?}", self.0.borrow().get(f))
    }
}

/// A model is the list of state formulas along a path.
pub type Model = Vec<Formula>;

#[derive(Debug, Clone)]
pub enum Answer {
    Unsat,
    Unknown,
    Sat(Formula),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CheckInductive(Formula),
    LearnForward(usize, Formula),
    Interpolate(Formula),
    Add(Formula, InductionRole),
    Reset(usize),
    QueryAtInit(Formula),
    CheckReachable { start: usize, end: usize, g: Formula },
    ClearCex,
    Gc,
}

#[derive(Debug, Default)]
pub struct Script {
    /// Answers to successive induction checks of a formula; UNSAT once exhausted.
    pub inductive: HashMap<Formula, Vec<Answer>>,
    /// Formulas satisfiable in an initial state.
    pub init_sat: HashSet<Formula>,
    /// Forward-learnt refutation of a generalization; its negation by default.
    pub learn: HashMap<Formula, Formula>,
    pub interpolant: Option<Formula>,
    /// Counter-trace fragments of reachable generalizations.
    pub reachable: HashMap<Formula, Vec<Formula>>,
    /// Step constraints that make the counterexample solver UNSAT.
    pub cex_unsat: HashSet<Formula>,
    /// Shift every term id by this much at the first collection point.
    pub gc_shift: Option<u32>,
    pub log: Vec<Call>,
}

impl Script {
    fn relocate(&mut self, reloc: &Relocation) {
        let r = |f: Formula| reloc.relocate(f).unwrap_or(f);
        self.inductive = std::mem::take(&mut self.inductive)
            .into_iter()
            .map(|(f, answers)| {
                let answers = answers
                    .into_iter()
                    .map(|a| match a {
                        Answer::Sat(g) => Answer::Sat(r(g)),
                        other => other,
                    })
                    .collect();
                (r(f), answers)
            })
            .collect();
        self.init_sat = self.init_sat.drain().map(r).collect();
        self.learn = self.learn.drain().map(|(g, l)| (r(g), r(l))).collect();
        self.interpolant = self.interpolant.map(r);
        self.reachable = self
            .reachable
            .drain()
            .map(|(g, cex)| (r(g), cex.into_iter().map(r).collect()))
            .collect();
        self.cex_unsat = self.cex_unsat.drain().map(r).collect();
    }

    pub fn calls(&self) -> &[Call] {
        &self.log
    }
}

pub type SharedScript = Rc<RefCell<Script>>;

pub struct ScriptedSolver {
    terms: Terms,
    script: SharedScript,
    scopes: Vec<Vec<Formula>>,
    depth: usize,
}

impl ScriptedSolver {
    fn asserted(&self) -> impl Iterator<Item = Formula> + '_ {
        self.scopes.iter().flatten().copied()
    }
}

impl CounterexampleSolver for ScriptedSolver {
    type Model = Model;

    fn push(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn add(&mut self, f: Formula, _class: FormulaClass) -> Ic3Result<()> {
        match self.scopes.last_mut() {
            Some(scope) => scope.push(f),
            None => self.scopes.push(vec![f]),
        }
        Ok(())
    }

    fn check(&mut self) -> Ic3Result<SatResult> {
        let script = self.script.borrow();
        if self.asserted().any(|f| script.cex_unsat.contains(&f)) {
            Ok(SatResult::Unsat)
        } else {
            Ok(SatResult::Sat)
        }
    }

    fn model(&self) -> Ic3Result<Model> {
        let mut steps: Vec<Option<Formula>> = Vec::new();
        for f in self.asserted() {
            if let Term::At(state, k) = self.terms.term(f) {
                if steps.len() <= k {
                    steps.resize(k + 1, None);
                }
                steps[k].get_or_insert(state);
            }
        }
        let filler = self.terms.atom("_");
        Ok(steps.into_iter().map(|s| s.unwrap_or(filler)).collect())
    }
}

pub struct ScriptedOracle {
    terms: Terms,
    script: SharedScript,
    calls: HashMap<Formula, usize>,
    solver: ScriptedSolver,
}

impl ScriptedOracle {
    fn log(&self, call: Call) {
        self.script.borrow_mut().log.push(call);
    }
}

impl InductionOracle for ScriptedOracle {
    type Model = Model;
    type Solver = ScriptedSolver;

    fn check_inductive(&mut self, f: Formula) -> Ic3Result<InductionQuery<Model>> {
        self.log(Call::CheckInductive(f));
        let n = self.calls.entry(f).or_insert(0);
        let answer = self
            .script
            .borrow()
            .inductive
            .get(&f)
            .and_then(|answers| answers.get(*n).cloned())
            .unwrap_or(Answer::Unsat);
        *n += 1;
        Ok(match answer {
            Answer::Unsat => InductionQuery::unsat(),
            Answer::Unknown => InductionQuery {
                result: SatResult::Unknown,
                generalization: None,
                model: None,
            },
            Answer::Sat(g) => InductionQuery::sat(g, vec![g]),
        })
    }

    fn learn_forward(&mut self, frame_index: usize, g: Formula) -> Ic3Result<Formula> {
        self.log(Call::LearnForward(frame_index, g));
        let learnt = self.script.borrow().learn.get(&g).copied();
        Ok(learnt.unwrap_or_else(|| self.terms.mk_not(g)))
    }

    fn interpolate_induction(&mut self, f: Formula) -> Ic3Result<Formula> {
        self.log(Call::Interpolate(f));
        let interpolant = self.script.borrow().interpolant;
        Ok(interpolant.unwrap_or_else(|| self.terms.atom("I")))
    }

    fn add_to_induction_solver(&mut self, f: Formula, role: InductionRole) -> Ic3Result<()> {
        self.log(Call::Add(f, role));
        Ok(())
    }

    fn reset_induction_solver(&mut self, depth: usize) -> Ic3Result<()> {
        self.log(Call::Reset(depth));
        Ok(())
    }

    fn query_at_init(&mut self, f: Formula) -> Ic3Result<InitQuery<Model>> {
        self.log(Call::QueryAtInit(f));
        if self.script.borrow().init_sat.contains(&f) {
            Ok(InitQuery {
                result: SatResult::Sat,
                model: Some(vec![f]),
            })
        } else {
            Ok(InitQuery {
                result: SatResult::Unsat,
                model: None,
            })
        }
    }

    fn ensure_counterexample_solver_depth(&mut self, depth: usize) {
        self.solver.depth = self.solver.depth.max(depth);
    }

    fn counterexample_solver_depth(&self) -> usize {
        self.solver.depth
    }

    fn counterexample_solver(&mut self) -> &mut ScriptedSolver {
        &mut self.solver
    }

    fn gc(&mut self) -> Ic3Result<Option<Relocation>> {
        self.log(Call::Gc);
        let shift = self.script.borrow_mut().gc_shift.take();
        Ok(shift.map(|delta| self.terms.shift(delta)))
    }

    fn gc_collect(&mut self, reloc: &Relocation) {
        self.script.borrow_mut().relocate(reloc);
        self.calls = self
            .calls
            .drain()
            .map(|(f, n)| (reloc.relocate(f).unwrap_or(f), n))
            .collect();
    }
}

pub struct ScriptedReachability {
    script: SharedScript,
    cex: Vec<Formula>,
}

impl Reachability<ScriptedOracle> for ScriptedReachability {
    fn init(&mut self, _oracle: &mut ScriptedOracle) -> Ic3Result<()> {
        self.cex.clear();
        Ok(())
    }

    fn check_reachable(
        &mut self,
        _oracle: &mut ScriptedOracle,
        start: usize,
        end: usize,
        g: Formula,
        _model: &Model,
    ) -> Ic3Result<ReachStatus> {
        let mut script = self.script.borrow_mut();
        script.log.push(Call::CheckReachable { start, end, g });
        match script.reachable.get(&g) {
            Some(cex) => {
                self.cex = cex.clone();
                Ok(ReachStatus::Reachable)
            }
            None => Ok(ReachStatus::Unreachable),
        }
    }

    fn cex(&self) -> &[Formula] {
        &self.cex
    }

    fn clear(&mut self) {
        self.script.borrow_mut().log.push(Call::ClearCex);
        self.cex.clear();
    }

    fn gc_collect(&mut self, reloc: &Relocation) {
        self.cex = self
            .cex
            .iter()
            .filter_map(|&f| reloc.relocate(f))
            .collect();
    }
}

#[derive(Debug, Default)]
pub struct ScriptedTrace {
    terms: Terms,
    pub states: Model,
}

impl TraceRecorder for ScriptedTrace {
    type Model = Model;

    fn state_formula(&mut self, f: Formula, step: usize) -> Formula {
        self.terms.at(f, step)
    }

    fn set_model(&mut self, model: Model) {
        self.states = model;
    }

    fn len(&self) -> usize {
        self.states.len()
    }
}

pub struct ScriptedBackend {
    pub terms: Terms,
    pub script: SharedScript,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            terms: Terms::default(),
            script: Rc::new(RefCell::new(Script::default())),
        }
    }
}

impl Backend for ScriptedBackend {
    type System = ();
    type Model = Model;
    type Terms = Terms;
    type Oracle = ScriptedOracle;
    type Reachability = ScriptedReachability;
    type Trace = ScriptedTrace;

    fn open(&mut self, _system: &()) -> Ic3Result<Session<Self>> {
        Ok(Session {
            terms: self.terms.clone(),
            oracle: ScriptedOracle {
                terms: self.terms.clone(),
                script: self.script.clone(),
                calls: HashMap::new(),
                solver: ScriptedSolver {
                    terms: self.terms.clone(),
                    script: self.script.clone(),
                    scopes: Vec::new(),
                    depth: 0,
                },
            },
            reachability: ScriptedReachability {
                script: self.script.clone(),
                cex: Vec::new(),
            },
            trace: ScriptedTrace {
                terms: self.terms.clone(),
                states: Vec::new(),
            },
        })
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
