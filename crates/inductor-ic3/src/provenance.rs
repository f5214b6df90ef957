//! Why each formula was learnt, and which formulas have been falsified.
//!
//! Provenance is a DAG over formula identities: a learnt formula points at
//! the parent whose counter-state it refutes. Keeping it as maps keyed by
//! identity lets a relocation rewrite the whole graph at once.

use crate::term::{Formula, Relocation};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

/// How a learnt formula came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentInfo {
    /// Formula whose counter-state this one refutes; `None` for roots.
    pub parent: Option<Formula>,
    /// The refuted generalization.
    pub refutes: Formula,
    /// Induction depth active when the formula was learnt.
    pub depth: usize,
}

#[derive(Debug, Default)]
pub struct Provenance {
    parents: BTreeMap<Formula, ParentInfo>,
    invalid: BTreeMap<Formula, usize>,
    properties: BTreeSet<Formula>,
    property_invalid: bool,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_property(&mut self, p: Formula) {
        self.properties.insert(p);
    }

    #[inline]
    pub fn is_property(&self, f: Formula) -> bool {
        self.properties.contains(&f)
    }

    pub fn properties(&self) -> impl Iterator<Item = Formula> + '_ {
        self.properties.iter().copied()
    }

    /// Record that `learnt` was introduced to refute `refutes`, a
    /// generalization of a counterexample to the induction of `parent`.
    pub fn set_refutes(&mut self, parent: Formula, refutes: Formula, learnt: Formula, depth: usize) {
        self.parents.insert(
            learnt,
            ParentInfo {
                parent: Some(parent),
                refutes,
                depth,
            },
        );
    }

    pub fn info(&self, learnt: Formula) -> Option<&ParentInfo> {
        self.parents.get(&learnt)
    }

    pub fn has_parent(&self, learnt: Formula) -> bool {
        self.parent(learnt).is_some()
    }

    pub fn parent(&self, learnt: Formula) -> Option<Formula> {
        self.parents.get(&learnt).and_then(|info| info.parent)
    }

    pub fn refutes(&self, learnt: Formula) -> Option<Formula> {
        self.parents.get(&learnt).map(|info| info.refutes)
    }

    pub fn refutes_depth(&self, learnt: Formula) -> Option<usize> {
        self.parents.get(&learnt).map(|info| info.depth)
    }

    /// Mark `f` as falsifiable at `frame`. Marking a property literal
    /// disproves the property. Panics if `f` is already marked.
    pub fn set_invalid(&mut self, f: Formula, frame: usize) {
        let previous = self.invalid.insert(f, frame);
        assert!(previous.is_none(), "formula {f} is already marked invalid");
        if self.properties.contains(&f) {
            self.property_invalid = true;
        }
    }

    #[inline]
    pub fn is_invalid(&self, f: Formula) -> bool {
        self.invalid.contains_key(&f)
    }

    pub fn invalid_frame(&self, f: Formula) -> Option<usize> {
        self.invalid.get(&f).copied()
    }

    #[inline]
    pub fn property_invalid(&self) -> bool {
        self.property_invalid
    }

    /// Flag the property as disproved without marking a property literal.
    pub fn mark_property_invalid(&mut self) {
        self.property_invalid = true;
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Rewrite all identities. Entries keyed by, or pointing at, a collected
    /// formula are dropped.
    pub fn relocate(&mut self, reloc: &Relocation) {
        self.parents = std::mem::take(&mut self.parents)
            .into_iter()
            .filter_map(|(learnt, info)| {
                let learnt = reloc.relocate(learnt)?;
                let refutes = reloc.relocate(info.refutes)?;
                let parent = match info.parent {
                    Some(parent) => Some(reloc.relocate(parent)?),
                    None => None,
                };
                Some((
                    learnt,
                    ParentInfo {
                        parent,
                        refutes,
                        depth: info.depth,
                    },
                ))
            })
            .collect();
        self.invalid = std::mem::take(&mut self.invalid)
            .into_iter()
            .filter_map(|(f, frame)| Some((reloc.relocate(f)?, frame)))
            .collect();
        self.properties = std::mem::take(&mut self.properties)
            .into_iter()
            .filter_map(|f| reloc.relocate(f))
            .collect();
    }

    /// Write the dependency graph in DOT format.
    pub fn write_dot<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "digraph G {{")?;
        for (learnt, info) in &self.parents {
            if self.is_invalid(*learnt) {
                writeln!(out, "{} [color = red];", learnt.id())?;
            }
            if let Some(parent) = info.parent {
                writeln!(out, "{}->{};", learnt.id(), parent.id())?;
            }
        }
        writeln!(out, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(id: u32) -> Formula {
        Formula::from_id(id)
    }

    #[test]
    fn test_parent_chain() {
        let mut prov = Provenance::new();
        prov.add_property(f(1));
        prov.set_refutes(f(1), f(10), f(2), 1);
        prov.set_refutes(f(2), f(11), f(3), 2);

        assert_eq!(prov.parent(f(3)), Some(f(2)));
        assert_eq!(prov.parent(f(2)), Some(f(1)));
        assert!(!prov.has_parent(f(1)));
        assert_eq!(prov.refutes(f(3)), Some(f(11)));
        assert_eq!(prov.refutes_depth(f(3)), Some(2));
        assert_eq!(prov.refutes_depth(f(1)), None);
    }

    #[test]
    fn test_invalid_property_disproves() {
        let mut prov = Provenance::new();
        prov.add_property(f(1));
        prov.set_invalid(f(5), 0);
        assert!(!prov.property_invalid());
        prov.set_invalid(f(1), 3);
        assert!(prov.property_invalid());
        assert_eq!(prov.invalid_frame(f(1)), Some(3));
    }

    #[test]
    #[should_panic(expected = "already marked invalid")]
    fn test_double_invalid_panics() {
        let mut prov = Provenance::new();
        prov.set_invalid(f(5), 0);
        prov.set_invalid(f(5), 1);
    }

    #[test]
    fn test_relocate_rewrites_and_drops() {
        let mut prov = Provenance::new();
        prov.add_property(f(1));
        prov.set_refutes(f(1), f(10), f(2), 1);
        prov.set_refutes(f(2), f(11), f(3), 1);
        prov.set_invalid(f(3), 0);

        let mut reloc = Relocation::new();
        reloc.insert_moved(f(1), f(101));
        reloc.insert_moved(f(3), f(103));
        reloc.insert_collected(f(10));
        prov.relocate(&reloc);

        // f(2) refuted a collected generalization.
        assert!(prov.info(f(2)).is_none());
        assert_eq!(prov.parent(f(103)), Some(f(2)));
        assert!(prov.is_invalid(f(103)));
        assert!(prov.is_property(f(101)));
        assert!(!prov.is_property(f(1)));
    }

    #[test]
    fn test_dot_output() {
        let mut prov = Provenance::new();
        prov.set_refutes(f(1), f(10), f(2), 1);
        prov.set_refutes(f(2), f(11), f(3), 1);
        prov.set_invalid(f(3), 0);

        let mut out = Vec::new();
        prov.write_dot(&mut out).unwrap();
        let dot = String::from_utf8(out).unwrap();
        assert_eq!(dot, "digraph G {\n2->1;\n3 [color = red];\n3->2;\n}\n");
    }
}
