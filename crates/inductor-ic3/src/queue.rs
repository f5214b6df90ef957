//! Mutable-priority obligation queue.
//!
//! An indexed binary max-heap over a slab of obligations. Slots are stable
//! while an obligation is queued, so a handle can be used to re-establish the
//! heap order in O(log n) after its score changes. A side index maps each
//! queued `f_cex` to its handle.

use crate::obligation::Obligation;
use crate::term::{Formula, Relocation};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Stable handle to a queued obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObligationHandle(usize);

#[derive(Debug, Default)]
pub struct ObligationQueue {
    slots: Vec<Option<Obligation>>,
    free: Vec<usize>,
    /// Slot ids in heap order.
    heap: Vec<usize>,
    /// Slot id -> index into `heap`; meaningful only for occupied slots.
    position: Vec<usize>,
    handles: HashMap<Formula, ObligationHandle>,
}

impl ObligationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Whether an obligation refuting `f_cex` is queued.
    #[inline]
    pub fn contains(&self, f_cex: Formula) -> bool {
        self.handles.contains_key(&f_cex)
    }

    pub fn handle_of(&self, f_cex: Formula) -> Option<ObligationHandle> {
        self.handles.get(&f_cex).copied()
    }

    pub fn get(&self, handle: ObligationHandle) -> Option<&Obligation> {
        self.slots.get(handle.0).and_then(Option::as_ref)
    }

    /// The obligation that would be popped next.
    pub fn peek(&self) -> Option<&Obligation> {
        self.heap.first().map(|&slot| self.ob(slot))
    }

    /// Queued obligations in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Obligation> {
        self.heap.iter().map(|&slot| self.ob(slot))
    }

    /// Insert an obligation. Panics if one with the same `f_cex` is queued.
    pub fn push(&mut self, ob: Obligation) -> ObligationHandle {
        assert!(
            !self.handles.contains_key(&ob.f_cex),
            "obligation for {} is already queued",
            ob.f_cex
        );
        let f_cex = ob.f_cex;
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(ob);
                slot
            }
            None => {
                self.slots.push(Some(ob));
                self.position.push(0);
                self.slots.len() - 1
            }
        };
        let idx = self.heap.len();
        self.heap.push(slot);
        self.position[slot] = idx;
        self.sift_up(idx);

        let handle = ObligationHandle(slot);
        self.handles.insert(f_cex, handle);
        handle
    }

    /// Remove and return the highest-priority obligation. Panics when empty.
    pub fn pop_max(&mut self) -> Obligation {
        assert!(!self.heap.is_empty(), "pop from an empty obligation queue");
        let last = self.heap.len() - 1;
        self.swap(0, last);
        let slot = self.heap.pop().expect("heap is non-empty");
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        let ob = self.slots[slot].take().expect("heap entry points at an empty slot");
        self.free.push(slot);
        self.handles.remove(&ob.f_cex);
        ob
    }

    /// Add `amount` to the score of the obligation refuting `f_cex`.
    ///
    /// Returns false (and does nothing) if no such obligation is queued.
    pub fn bump(&mut self, f_cex: Formula, amount: f64) -> bool {
        let Some(handle) = self.handles.get(&f_cex).copied() else {
            return false;
        };
        if let Some(ob) = self.slots[handle.0].as_mut() {
            ob.bump_score(amount);
        }
        self.update(handle);
        true
    }

    /// Restore heap order after the obligation behind `handle` changed.
    fn update(&mut self, handle: ObligationHandle) {
        let idx = self.position[handle.0];
        self.sift_up(idx);
        let idx = self.position[handle.0];
        self.sift_down(idx);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.heap.clear();
        self.position.clear();
        self.handles.clear();
    }

    /// Rewrite every queued obligation and rebuild the heap, since the
    /// tie-break order depends on formula identities. Obligations that
    /// reference a collected formula are dropped.
    pub fn relocate(&mut self, reloc: &Relocation) -> usize {
        let old: Vec<Obligation> = self.slots.drain(..).flatten().collect();
        self.clear();
        let mut dropped = 0;
        for ob in old {
            match ob.relocate(reloc) {
                Some(moved) if !self.contains(moved.f_cex) => {
                    self.push(moved);
                }
                _ => dropped += 1,
            }
        }
        dropped
    }

    /// Keep only the obligations satisfying `keep`. Returns the number dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&Obligation) -> bool) -> usize {
        let old: Vec<Obligation> = self.slots.drain(..).flatten().collect();
        self.clear();
        let before = old.len();
        for ob in old.into_iter().filter(|ob| keep(ob)) {
            self.push(ob);
        }
        before - self.len()
    }

    #[inline]
    fn ob(&self, slot: usize) -> &Obligation {
        self.slots[slot]
            .as_ref()
            .expect("heap entry points at an empty slot")
    }

    #[inline]
    fn higher(&self, a: usize, b: usize) -> bool {
        self.ob(self.heap[a]).priority_cmp(self.ob(self.heap[b])) == Ordering::Greater
    }

    #[inline]
    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.position[self.heap[a]] = a;
        self.position[self.heap[b]] = b;
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.higher(idx, parent) {
                break;
            }
            self.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut best = idx;
            if left < len && self.higher(left, best) {
                best = left;
            }
            if right < len && self.higher(right, best) {
                best = right;
            }
            if best == idx {
                break;
            }
            self.swap(idx, best);
            idx = best;
        }
    }
}
