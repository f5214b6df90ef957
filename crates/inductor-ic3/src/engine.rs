//! The frame-induction search.
//!
//! [`Ic3Engine`] owns a [`Backend`] and, while a query is live, a [`Search`]
//! context holding the frame, the obligation queue and the provenance graph of
//! that query. Each round drains the queue through the push step; a round that
//! stages every frame member for the next frame is a fixpoint, otherwise the
//! frame is rebuilt from the staged obligations at a deeper induction depth.

use crate::frame::InductionFrame;
use crate::obligation::Obligation;
use crate::oracle::{
    Backend, InductionOracle, InductionRole, ReachStatus, Reachability, SatResult, Session,
    TraceRecorder,
};
use crate::provenance::Provenance;
use crate::queue::ObligationQueue;
use crate::stats::Ic3Stats;
use crate::term::{Formula, Relocation, TermManager};
use crate::{Ic3Config, Ic3Error, Ic3Outcome, Ic3Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, trace};

/// Outcome of pushing one obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushResult {
    /// Staged for the next frame.
    Success,
    /// A refinement was learnt; the obligation must be retried.
    Retry,
    /// The counter-state is reachable.
    Fail,
    /// Never produced by the push step itself.
    #[allow(dead_code)]
    Inconclusive,
}

/// Steps checked for reachability at frame `index` with induction depth
/// `depth`. The window never starts before the initial state.
pub(crate) fn reachability_window(index: usize, depth: usize) -> (usize, usize) {
    ((index + 1).saturating_sub(depth), index)
}

/// Search state of a single query.
pub(crate) struct Search<B: Backend> {
    pub(crate) session: Session<B>,
    pub(crate) config: Ic3Config,
    pub(crate) frame: InductionFrame,
    pub(crate) queue: ObligationQueue,
    /// Obligations staged for the next frame.
    pub(crate) next: Vec<Obligation>,
    pub(crate) provenance: Provenance,
    pub(crate) frame_index: usize,
    pub(crate) depth: usize,
    pub(crate) stats: Ic3Stats,
    pub(crate) outcome: Option<Ic3Outcome>,
}

impl<B: Backend> Search<B> {
    fn new(session: Session<B>, config: Ic3Config) -> Self {
        Self {
            session,
            config,
            frame: InductionFrame::new(),
            queue: ObligationQueue::new(),
            next: Vec::new(),
            provenance: Provenance::new(),
            frame_index: 0,
            depth: 0,
            stats: Ic3Stats::default(),
            outcome: None,
        }
    }

    fn run(&mut self, property: Formula) -> Ic3Result<Ic3Outcome> {
        self.session.terms.validate(property)?;
        self.session.reachability.init(&mut self.session.oracle)?;

        self.frame_index = 0;
        self.depth = 1;
        self.frame.clear(&mut self.session.oracle, self.depth)?;
        self.sync_frame_stats();

        if !self.add_property(property)? {
            info!("property fails in an initial state");
            self.outcome = Some(Ic3Outcome::Invalid);
            return Ok(Ic3Outcome::Invalid);
        }

        info!(properties = self.provenance.properties().count(), "starting IC3 search");
        let outcome = self.search();
        // Nothing stays staged outside a round.
        self.next.clear();
        let outcome = outcome?;
        info!(%outcome, rounds = self.stats.rounds, "IC3 search done");
        self.outcome = Some(outcome);
        Ok(outcome)
    }

    /// Register `p` (or each of its conjuncts) as a property literal.
    /// Returns false if a literal fails in an initial state.
    fn add_property(&mut self, p: Formula) -> Ic3Result<bool> {
        if let Some(conjuncts) = self.session.terms.conjuncts(p) {
            for conjunct in conjuncts {
                if !self.add_property(conjunct)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }

        let not_p = self.session.terms.mk_not(p);
        let init = self.session.oracle.query_at_init(not_p)?;
        match init.result {
            SatResult::Unsat => {
                if !self.frame.contains(p) {
                    self.add_to_frame(p, InductionRole::First)?;
                    self.add_to_frame(p, InductionRole::Intermediate)?;
                    self.enqueue(Obligation::new(p, not_p, 0, 0.0));
                }
                self.queue.bump(not_p, 1.0);
                self.provenance.add_property(p);
                Ok(true)
            }
            SatResult::Sat => {
                let model = init.model.ok_or(Ic3Error::MissingWitness {
                    context: "an initial-state model",
                })?;
                debug!(property = %self.show(p), "property falsified at init");
                self.session.trace.set_model(model);
                self.provenance.add_property(p);
                self.provenance.mark_property_invalid();
                Ok(false)
            }
            SatResult::Unknown => Err(Ic3Error::SolverUnknown {
                context: "initial-state query",
            }),
        }
    }

    fn search(&mut self) -> Ic3Result<Ic3Outcome> {
        loop {
            self.push_current_frame()?;
            self.stats.rounds += 1;

            if self.provenance.property_invalid() {
                return Ok(Ic3Outcome::Invalid);
            }

            if self.frame.len() == self.next.len() {
                if self.config.show_invariant {
                    for f in self.frame.iter() {
                        info!(formula = %self.show(f), "invariant");
                    }
                }
                return Ok(Ic3Outcome::Valid);
            }

            self.queue.clear();
            self.stats.queue_size = 0;

            let frame_size = self.frame.len();
            self.depth = self.frame_index + 1;
            self.frame.clear(&mut self.session.oracle, self.depth)?;
            self.sync_frame_stats();
            self.stats.induction_depth = self.depth;

            info!(
                frame = self.frame_index,
                depth = self.depth,
                pushed = self.next.len(),
                frame_size,
                "extending trace"
            );

            if self.config.max_frames > 0 && self.stats.rounds >= self.config.max_frames {
                info!(rounds = self.stats.rounds, "frame bound reached");
                return Ok(Ic3Outcome::Interrupted);
            }

            // Refutations first: a staged F_fwd may coincide with a later
            // refutation, which must still go through the FIRST registration.
            let staged = std::mem::take(&mut self.next);
            let mut forward = Vec::with_capacity(staged.len());
            for ob in staged {
                let refutation = self.session.terms.mk_not(ob.f_cex);
                self.add_to_frame(refutation, InductionRole::First)?;
                self.add_to_frame(refutation, InductionRole::Intermediate)?;
                forward.push(ob.f_fwd);
                self.enqueue(ob);
            }
            for f_fwd in forward {
                self.frame.insert(f_fwd);
            }
            self.sync_frame_stats();
            self.stats.frame_pushed = 0;
            self.check_queue_in_frame();

            self.frame_index += self.depth;
            self.stats.frame_index = self.frame_index;

            if let Some(reloc) = self.session.oracle.gc()? {
                self.gc_collect(&reloc);
            }
        }
    }

    /// Drain the queue through the push step.
    fn push_current_frame(&mut self) -> Ic3Result<()> {
        while !self.queue.is_empty() && !self.provenance.property_invalid() {
            let ob = self.pop();
            match self.push_if_inductive(&ob)? {
                PushResult::Retry => self.enqueue(ob),
                PushResult::Success | PushResult::Fail | PushResult::Inconclusive => {}
            }
        }

        if let Some(dir) = self.config.dump_dependencies.clone() {
            self.write_dependencies(&dir)?;
        }
        Ok(())
    }

    fn push_if_inductive(&mut self, ob: &Obligation) -> Ic3Result<PushResult> {
        let Obligation {
            f_fwd, f_cex, depth, ..
        } = *ob;

        trace!(frame = self.frame_index, f_cex = %self.show(f_cex), "pushing F_cex");

        let refutation = self.session.terms.mk_not(f_cex);
        let cex_result = self.session.oracle.check_inductive(refutation)?;
        match cex_result.result {
            SatResult::Unsat => return self.push_inductive(f_fwd, f_cex, depth, refutation),
            SatResult::Unknown => {
                return Err(Ic3Error::SolverUnknown {
                    context: "induction check",
                })
            }
            SatResult::Sat => {}
        }

        let g = cex_result.generalization.ok_or(Ic3Error::MissingWitness {
            context: "a generalization",
        })?;
        let model = cex_result.model.ok_or(Ic3Error::MissingWitness {
            context: "a counter-model",
        })?;
        trace!(g = %self.show(g), "generalization");

        let (start, end) = reachability_window(self.frame_index, self.depth);
        let status = self.session.reachability.check_reachable(
            &mut self.session.oracle,
            start,
            end,
            g,
            &model,
        )?;
        debug!(start, end, ?status, "reachability check");

        if status == ReachStatus::Reachable {
            self.fail_induction(refutation)?;
            return Ok(PushResult::Fail);
        }

        let backward = self.session.terms.mk_not(g);
        trace!(learnt = %self.show(backward), "backward learnt");
        let forward = self.session.oracle.learn_forward(self.frame_index, g)?;
        trace!(learnt = %self.show(forward), "forward learnt");

        self.add_to_frame(backward, InductionRole::First)?;
        // Bookkeeping only; the oracle is not told about it.
        self.frame.insert(forward);
        self.sync_frame_stats();

        self.provenance
            .set_refutes(refutation, g, backward, self.depth);
        debug!(frame = self.frame_index, depth = depth + self.depth, "learnt refinement");
        self.enqueue(Obligation::new(forward, g, depth + self.depth, 0.0));

        Ok(PushResult::Retry)
    }

    /// `¬F_cex` is inductive: stage the obligation, weakening `f_fwd` by an
    /// interpolant if it is not inductive itself.
    fn push_inductive(
        &mut self,
        mut f_fwd: Formula,
        f_cex: Formula,
        depth: usize,
        refutation: Formula,
    ) -> Ic3Result<PushResult> {
        trace!(frame = self.frame_index, f_fwd = %self.show(f_fwd), "pushing F_fwd");

        let fwd_result = self.session.oracle.check_inductive(f_fwd)?;
        match fwd_result.result {
            SatResult::Unsat => {}
            SatResult::Sat => {
                let interpolant = self.session.oracle.interpolate_induction(refutation)?;
                self.frame.remove(f_fwd);
                f_fwd = self.session.terms.mk_or(f_fwd, interpolant);
                self.frame.insert(f_fwd);
                self.sync_frame_stats();
                self.check_queue_in_frame();
                trace!(f_fwd = %self.show(f_fwd), "weakened by interpolant");
            }
            SatResult::Unknown => {
                return Err(Ic3Error::SolverUnknown {
                    context: "induction check",
                })
            }
        }

        self.next.push(Obligation::new(f_fwd, f_cex, depth, 0.0));
        self.session
            .oracle
            .add_to_induction_solver(f_fwd, InductionRole::First)?;
        self.session
            .oracle
            .add_to_induction_solver(f_fwd, InductionRole::Intermediate)?;
        self.stats.frame_pushed = self.next.len();

        Ok(PushResult::Success)
    }

    /// The counter-state of `refutation`'s obligation is reachable.
    fn fail_induction(&mut self, refutation: Formula) -> Ic3Result<()> {
        let cex_len = self.session.reachability.cex().len();
        assert!(cex_len > 0, "reachable verdict without a counter-trace");
        let k = cex_len - 1 + self.depth;
        debug!(frame = k, "counter-state reachable");
        self.set_invalid(refutation, k);
        self.provenance.mark_property_invalid();
        self.extend_induction_failure(refutation)
    }

    pub(crate) fn set_invalid(&mut self, f: Formula, frame: usize) {
        assert!(
            frame >= self.frame_index,
            "formula {f} marked invalid at frame {frame} before the active frame {}",
            self.frame_index
        );
        self.provenance.set_invalid(f, frame);
    }

    fn add_to_frame(&mut self, f: Formula, role: InductionRole) -> Ic3Result<()> {
        self.frame.add(f, role, &mut self.session.oracle)?;
        self.sync_frame_stats();
        Ok(())
    }

    fn enqueue(&mut self, ob: Obligation) {
        let refutation = self.session.terms.mk_not(ob.f_cex);
        assert!(
            self.frame.contains(refutation),
            "obligation for {} queued without its refutation in the frame",
            ob.f_cex
        );
        self.queue.push(ob);
        self.stats.queue_size = self.queue.len();
    }

    /// Every queued `F_cex` has its refutation in the frame. Checked in debug
    /// builds after the mutations that can remove frame members.
    fn check_queue_in_frame(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        for ob in self.queue.iter() {
            let refutation = self.session.terms.mk_not(ob.f_cex);
            assert!(
                self.frame.contains(refutation),
                "queued obligation for {} lost its refutation from the frame",
                ob.f_cex
            );
        }
    }

    fn pop(&mut self) -> Obligation {
        let ob = self.queue.pop_max();
        self.stats.queue_size = self.queue.len();
        ob
    }

    fn sync_frame_stats(&mut self) {
        self.stats.frame_size = self.frame.len();
    }

    pub(crate) fn show(&self, f: Formula) -> String {
        self.session.terms.display(f)
    }

    fn write_dependencies(&self, dir: &Path) -> Ic3Result<()> {
        let path = dir.join(format!("dependency.{}.dot", self.frame_index));
        let mut out = BufWriter::new(File::create(&path)?);
        self.provenance.write_dot(&mut out)?;
        out.flush()?;
        debug!(path = %path.display(), "wrote dependency graph");
        Ok(())
    }

    /// Rewrite every stored formula after a collection of the term universe.
    fn gc_collect(&mut self, reloc: &Relocation) {
        assert!(
            self.next.is_empty(),
            "relocation while obligations are staged for the next frame"
        );
        self.frame.relocate(reloc);
        let mut dropped = self.queue.relocate(reloc);
        let frame = &self.frame;
        let terms = &self.session.terms;
        dropped += self
            .queue
            .retain(|ob| frame.contains(terms.mk_not(ob.f_cex)));
        self.check_queue_in_frame();
        self.provenance.relocate(reloc);
        self.session.oracle.gc_collect(reloc);
        self.session.reachability.gc_collect(reloc);
        self.sync_frame_stats();
        self.stats.queue_size = self.queue.len();
        debug!(
            moved = reloc.moved_count(),
            collected = reloc.collected_count(),
            dropped,
            "relocated search state"
        );
    }
}

/// IC3 frame-induction engine.
pub struct Ic3Engine<B: Backend> {
    backend: B,
    config: Ic3Config,
    search: Option<Search<B>>,
}

impl<B: Backend> Ic3Engine<B> {
    pub fn new(backend: B, config: Ic3Config) -> Self {
        Self {
            backend,
            config,
            search: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Check `property` on `system`. The property must be a formula of the
    /// backend's term universe. Any previous query state is discarded first.
    pub fn query(&mut self, system: &B::System, property: Formula) -> Ic3Result<Ic3Outcome> {
        self.reset();
        let session = self.backend.open(system)?;
        let search = self.search.insert(Search::new(session, self.config.clone()));
        search.run(property)
    }

    /// Drop all query state.
    pub fn reset(&mut self) {
        if let Some(mut search) = self.search.take() {
            search.session.reachability.clear();
        }
    }

    /// Counterexample trace of the last query.
    pub fn get_trace(&self) -> Option<&B::Trace> {
        self.search.as_ref().map(|s| &s.session.trace)
    }

    /// Outcome of the last query, if it finished.
    pub fn outcome(&self) -> Option<Ic3Outcome> {
        self.search.as_ref().and_then(|s| s.outcome)
    }

    pub fn stats(&self) -> Ic3Stats {
        self.search
            .as_ref()
            .map(|s| s.stats.clone())
            .unwrap_or_default()
    }

    /// The inductive invariant, if the last query proved the property.
    pub fn invariant(&self) -> Option<Vec<Formula>> {
        let search = self.search.as_ref()?;
        (search.outcome == Some(Ic3Outcome::Valid)).then(|| search.frame.iter().collect())
    }

    /// Members of the current frame set.
    pub fn frame_formulas(&self) -> Vec<Formula> {
        self.search
            .as_ref()
            .map(|s| s.frame.iter().collect())
            .unwrap_or_default()
    }

    pub fn frame_index(&self) -> usize {
        self.search.as_ref().map_or(0, |s| s.frame_index)
    }

    pub fn induction_depth(&self) -> usize {
        self.search.as_ref().map_or(0, |s| s.depth)
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.search.as_ref().map(|s| &s.provenance)
    }

    pub fn is_invalid(&self, f: Formula) -> bool {
        self.search
            .as_ref()
            .is_some_and(|s| s.provenance.is_invalid(f))
    }

    /// Apply a relocation from the owner of the term universe. Callable at
    /// any point outside a query; within one, the oracle's collection point
    /// is used instead.
    pub fn gc_collect(&mut self, reloc: &Relocation) {
        if let Some(search) = self.search.as_mut() {
            search.gc_collect(reloc);
        }
    }

    /// Write the provenance graph of the last query in DOT format.
    pub fn dump_dependencies<W: Write>(&self, out: &mut W) -> Ic3Result<()> {
        let search = self.search.as_ref().ok_or(Ic3Error::NoQuery)?;
        search.provenance.write_dot(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reachability_windows_tile() {
        let mut index = 0;
        let mut depth = 1;
        let mut windows = Vec::new();
        for _ in 0..4 {
            windows.push(reachability_window(index, depth));
            depth = index + 1;
            index += depth;
        }
        assert_eq!(windows, vec![(0, 0), (1, 1), (2, 3), (4, 7)]);
    }

    #[test]
    fn test_window_never_starts_before_init() {
        assert_eq!(reachability_window(0, 5), (0, 0));
        assert_eq!(reachability_window(2, 4), (0, 2));
    }
}
