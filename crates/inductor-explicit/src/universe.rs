//! Interned term universe over the states of one system.
//!
//! Every term is hash-consed, so structurally equal terms share a
//! [`Formula`] identity. State-set terms are canonical: negation is
//! complement and disjunction is union, which makes `¬¬f` the same term as
//! `f`. Step terms (`f` at step `k`) only serve counterexample construction
//! and are dropped by [`Universe::collect`].

use crate::system::StateSet;
use crate::{ExplicitError, StateId};
use inductor_ic3::{Formula, Ic3Result, Relocation, TermManager};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// The states in the set.
    States(StateSet),
    /// Conjunction of state formulas.
    And(Vec<Formula>),
    /// A state formula asserted at a step of a path.
    At(Formula, usize),
}

#[derive(Debug)]
struct Store {
    num_states: usize,
    terms: Vec<Term>,
    index: HashMap<Term, Formula>,
}

impl Store {
    fn intern(&mut self, term: Term) -> Formula {
        if let Some(&f) = self.index.get(&term) {
            return f;
        }
        let f = Formula::from_id(self.terms.len() as u32);
        self.terms.push(term.clone());
        self.index.insert(term, f);
        f
    }

    fn get(&self, f: Formula) -> Result<&Term, ExplicitError> {
        self.terms
            .get(f.id() as usize)
            .ok_or(ExplicitError::UnknownFormula(f))
    }

    fn eval(&self, f: Formula) -> Result<StateSet, ExplicitError> {
        match self.get(f)? {
            Term::States(set) => Ok(set.clone()),
            Term::And(conjuncts) => {
                let mut acc = StateSet::full(self.num_states);
                for &c in conjuncts {
                    acc = acc.intersect(&self.eval(c)?);
                }
                Ok(acc)
            }
            Term::At(..) => Err(ExplicitError::NotAStateFormula(f)),
        }
    }
}

/// Shared handle to the term universe.
#[derive(Debug, Clone)]
pub struct Universe(Rc<RefCell<Store>>);

impl Universe {
    pub fn new(num_states: usize) -> Self {
        Self(Rc::new(RefCell::new(Store {
            num_states,
            terms: Vec::new(),
            index: HashMap::new(),
        })))
    }

    pub fn num_states(&self) -> usize {
        self.0.borrow().num_states
    }

    /// The formula satisfied exactly by `states`.
    pub fn states(&self, states: &[StateId]) -> Formula {
        let n = self.num_states();
        self.set(StateSet::from_states(n, states.iter().copied()))
    }

    pub fn set(&self, set: StateSet) -> Formula {
        let mut store = self.0.borrow_mut();
        assert_eq!(set.universe(), store.num_states, "state set of a different system");
        store.intern(Term::States(set))
    }

    pub fn and(&self, conjuncts: &[Formula]) -> Formula {
        self.0.borrow_mut().intern(Term::And(conjuncts.to_vec()))
    }

    /// `f` asserted at `step`.
    pub fn at(&self, f: Formula, step: usize) -> Formula {
        self.0.borrow_mut().intern(Term::At(f, step))
    }

    pub fn term(&self, f: Formula) -> Result<Term, ExplicitError> {
        self.0.borrow().get(f).cloned()
    }

    /// The states satisfying a state formula.
    pub fn eval(&self, f: Formula) -> Result<StateSet, ExplicitError> {
        self.0.borrow().eval(f)
    }

    /// The states and step of a step formula.
    pub fn step_formula(&self, f: Formula) -> Result<(StateSet, usize), ExplicitError> {
        let store = self.0.borrow();
        match store.get(f)? {
            Term::At(g, step) => Ok((store.eval(*g)?, *step)),
            _ => Err(ExplicitError::NotAStepFormula(f)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.borrow().terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live step terms.
    pub fn step_terms(&self) -> usize {
        self.0
            .borrow()
            .terms
            .iter()
            .filter(|t| matches!(t, Term::At(..)))
            .count()
    }

    /// Drop every step term (and every conjunction mentioning one) and
    /// compact the identities of the rest.
    pub fn collect(&self) -> Relocation {
        let mut store = self.0.borrow_mut();
        let old = std::mem::take(&mut store.terms);
        let mut reloc = Relocation::new();
        let mut terms = Vec::with_capacity(old.len());

        for (i, term) in old.into_iter().enumerate() {
            let from = Formula::from_id(i as u32);
            let kept = match term {
                Term::At(..) => None,
                Term::States(set) => Some(Term::States(set)),
                Term::And(conjuncts) => conjuncts
                    .iter()
                    .map(|&c| reloc.relocate(c))
                    .collect::<Option<Vec<_>>>()
                    .map(Term::And),
            };
            match kept {
                Some(term) => {
                    let to = Formula::from_id(terms.len() as u32);
                    if to != from {
                        reloc.insert_moved(from, to);
                    }
                    terms.push(term);
                }
                None => reloc.insert_collected(from),
            }
        }

        store.index = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), Formula::from_id(i as u32)))
            .collect();
        store.terms = terms;
        debug!(
            live = store.terms.len(),
            moved = reloc.moved_count(),
            collected = reloc.collected_count(),
            "collected term universe"
        );
        reloc
    }
}

impl TermManager for Universe {
    /// Complement over the state space. Panics on step formulas.
    fn mk_not(&self, f: Formula) -> Formula {
        match self.eval(f) {
            Ok(set) => self.set(set.complement()),
            Err(e) => panic!("cannot negate {f}: {e}"),
        }
    }

    fn mk_or(&self, a: Formula, b: Formula) -> Formula {
        match (self.eval(a), self.eval(b)) {
            (Ok(a), Ok(b)) => self.set(a.union(&b)),
            (Err(e), _) | (_, Err(e)) => panic!("cannot build disjunction: {e}"),
        }
    }

    fn conjuncts(&self, f: Formula) -> Option<Vec<Formula>> {
        match self.term(f) {
            Ok(Term::And(conjuncts)) => Some(conjuncts),
            _ => None,
        }
    }

    /// Only known state formulas can be negated.
    fn validate(&self, f: Formula) -> Ic3Result<()> {
        self.eval(f)?;
        Ok(())
    }

    fn display(&self, f: Formula) -> String {
        match self.term(f) {
            Ok(Term::States(set)) => format!("{set:?}"),
            Ok(Term::And(conjuncts)) => {
                let parts: Vec<String> = conjuncts.iter().map(|&c| self.display(c)).collect();
                format!("(and {})", parts.join(" "))
            }
            Ok(Term::At(g, step)) => format!("{}@{step}", self.display(g)),
            Err(_) => f.to_string(),
        }
    }
}
