//! Finite transition systems given as explicit state graphs.

use crate::{ExplicitError, StateId};
use std::fmt;

/// Set of states of an `n`-state system, stored as a bitset of u64 words.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StateSet {
    words: Vec<u64>,
    universe: usize,
}

impl StateSet {
    pub fn empty(universe: usize) -> Self {
        Self {
            words: vec![0; (universe + 63) / 64],
            universe,
        }
    }

    pub fn full(universe: usize) -> Self {
        let mut set = Self::empty(universe);
        set.words.iter_mut().for_each(|w| *w = u64::MAX);
        set.trim();
        set
    }

    pub fn from_states(universe: usize, states: impl IntoIterator<Item = StateId>) -> Self {
        let mut set = Self::empty(universe);
        for s in states {
            set.insert(s);
        }
        set
    }

    /// Number of states of the underlying system.
    #[inline]
    pub fn universe(&self) -> usize {
        self.universe
    }

    #[inline]
    pub fn insert(&mut self, s: StateId) {
        let idx = s as usize;
        debug_assert!(idx < self.universe, "state {s} out of range");
        self.words[idx / 64] |= 1u64 << (idx % 64);
    }

    #[inline]
    pub fn contains(&self, s: StateId) -> bool {
        let idx = s as usize;
        idx < self.universe && self.words[idx / 64] & (1u64 << (idx % 64)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Smallest member.
    pub fn first(&self) -> Option<StateId> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, &w)| w != 0)
            .map(|(i, w)| (i * 64 + w.trailing_zeros() as usize) as StateId)
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = StateId> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut w = word;
            std::iter::from_fn(move || {
                if w == 0 {
                    return None;
                }
                let bit = w.trailing_zeros() as usize;
                w &= w - 1;
                Some((i * 64 + bit) as StateId)
            })
        })
    }

    pub fn union(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a | b)
    }

    pub fn intersect(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a & b)
    }

    pub fn complement(&self) -> Self {
        let mut set = Self {
            words: self.words.iter().map(|w| !w).collect(),
            universe: self.universe,
        };
        set.trim();
        set
    }

    fn zip(&self, other: &Self, op: impl Fn(u64, u64) -> u64) -> Self {
        assert_eq!(self.universe, other.universe, "state sets of different systems");
        Self {
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(&a, &b)| op(a, b))
                .collect(),
            universe: self.universe,
        }
    }

    /// Clear the bits past the last state.
    fn trim(&mut self) {
        let tail = self.universe % 64;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }
}

impl fmt::Debug for StateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// A finite transition system: states `0..num_states`, a set of initial
/// states and a successor relation.
#[derive(Debug, Clone)]
pub struct ExplicitSystem {
    num_states: usize,
    init: StateSet,
    succ: Vec<Vec<StateId>>,
}

impl ExplicitSystem {
    pub fn new(num_states: usize) -> Result<Self, ExplicitError> {
        if num_states == 0 {
            return Err(ExplicitError::EmptySystem);
        }
        if num_states > StateId::MAX as usize {
            return Err(ExplicitError::TooManyStates(num_states));
        }
        Ok(Self {
            num_states,
            init: StateSet::empty(num_states),
            succ: vec![Vec::new(); num_states],
        })
    }

    /// Build a system from its initial states and edge list.
    pub fn from_edges(
        num_states: usize,
        init: &[StateId],
        edges: &[(StateId, StateId)],
    ) -> Result<Self, ExplicitError> {
        let mut system = Self::new(num_states)?;
        for &s in init {
            system.add_init(s)?;
        }
        for &(from, to) in edges {
            system.add_edge(from, to)?;
        }
        Ok(system)
    }

    #[inline]
    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn init(&self) -> &StateSet {
        &self.init
    }

    pub fn successors(&self, s: StateId) -> &[StateId] {
        &self.succ[s as usize]
    }

    pub fn add_init(&mut self, s: StateId) -> Result<(), ExplicitError> {
        self.check(s)?;
        self.init.insert(s);
        Ok(())
    }

    pub fn add_edge(&mut self, from: StateId, to: StateId) -> Result<(), ExplicitError> {
        self.check(from)?;
        self.check(to)?;
        let succ = &mut self.succ[from as usize];
        if let Err(pos) = succ.binary_search(&to) {
            succ.insert(pos, to);
        }
        Ok(())
    }

    fn check(&self, s: StateId) -> Result<(), ExplicitError> {
        if (s as usize) < self.num_states {
            Ok(())
        } else {
            Err(ExplicitError::StateOutOfRange {
                state: s,
                num_states: self.num_states,
            })
        }
    }

    /// Successors of a set of states.
    pub fn post(&self, states: &StateSet) -> StateSet {
        let mut next = StateSet::empty(self.num_states);
        for s in states.iter() {
            for &t in self.successors(s) {
                next.insert(t);
            }
        }
        next
    }

    /// A path through `layers` ending in `last`, where each state is a
    /// successor of the previous one and lies in its layer. Chooses the
    /// smallest predecessor at each step. `last` must be in the last layer
    /// and every layer must be the image of its predecessor intersected
    /// with some constraint.
    pub fn witness(&self, layers: &[StateSet], last: StateId) -> Vec<StateId> {
        let mut path = Vec::with_capacity(layers.len());
        let mut current = last;
        path.push(current);
        for layer in layers[..layers.len().saturating_sub(1)].iter().rev() {
            let pred = layer
                .iter()
                .find(|&s| self.successors(s).binary_search(&current).is_ok());
            match pred {
                Some(p) => {
                    current = p;
                    path.push(p);
                }
                None => unreachable!("layer {layer:?} has no predecessor of state {current}"),
            }
        }
        path.reverse();
        path
    }

    /// Layered forward search from `start ∩ constraints[0]`, intersecting
    /// the image at step `i` with `constraints[i]`. Returns the layers, or
    /// `None` as soon as one is empty.
    pub fn constrained_layers(
        &self,
        start: &StateSet,
        constraints: &[StateSet],
    ) -> Option<Vec<StateSet>> {
        let mut layers: Vec<StateSet> = Vec::with_capacity(constraints.len());
        for (i, constraint) in constraints.iter().enumerate() {
            let layer = if i == 0 {
                start.intersect(constraint)
            } else {
                self.post(&layers[i - 1]).intersect(constraint)
            };
            if layer.is_empty() {
                return None;
            }
            layers.push(layer);
        }
        Some(layers)
    }
}
