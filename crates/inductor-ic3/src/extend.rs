//! Backward extension of counterexamples through the provenance graph.
//!
//! A reachable counter-state to the induction of `f` gives a concrete trace
//! on which `f` is false. Since `f` was learnt to refute a counter-state of
//! its parent, the same trace may continue to a state falsifying the parent,
//! and so on up to a property root.

use crate::engine::Search;
use crate::oracle::{
    Backend, CounterexampleSolver, FormulaClass, InductionOracle, Reachability, SatResult,
    TraceRecorder,
};
use crate::term::{Formula, TermManager};
use crate::Ic3Result;
use tracing::{debug, info};

impl<B: Backend> Search<B> {
    /// Materialize the counterexample showing `f` false and extend it as far
    /// up the provenance of `f` as it stays satisfiable. `f` must already be
    /// marked invalid.
    pub(crate) fn extend_induction_failure(&mut self, f: Formula) -> Ic3Result<()> {
        let cex = self.session.reachability.cex().to_vec();
        assert!(!cex.is_empty(), "extension without a counter-trace");
        assert!(
            cex.len() - 1 + self.depth > self.frame_index,
            "counter-trace ends before the active frame"
        );

        self.session
            .oracle
            .ensure_counterexample_solver_depth(self.frame_index + 1);
        self.session.oracle.counterexample_solver().push();

        let result = self.extend_in_scope(f, &cex);
        self.session.oracle.counterexample_solver().pop();
        result
    }

    fn extend_in_scope(&mut self, mut f: Formula, cex: &[Formula]) -> Ic3Result<()> {
        for (step, &g) in cex.iter().enumerate() {
            let at = self.session.trace.state_formula(g, step);
            self.session
                .oracle
                .counterexample_solver()
                .add(at, FormulaClass::A)?;
        }

        let mut k = cex.len() - 1 + self.depth;
        self.assert_false_at(f, k)?;
        let r = self.session.oracle.counterexample_solver().check()?;
        assert_eq!(
            r,
            SatResult::Sat,
            "counter-trace does not falsify {f} at frame {k}"
        );
        self.record_model()?;

        if !self.config.extend_counterexample {
            return Ok(());
        }

        loop {
            debug_assert!(self.provenance.is_invalid(f));
            self.stats.max_cex_depth = self.stats.max_cex_depth.max(k);

            let f_cex = self.session.terms.mk_not(f);
            self.queue.bump(f_cex, 1.0);

            let (Some(parent), Some(refutes_depth)) =
                (self.provenance.parent(f), self.provenance.refutes_depth(f))
            else {
                if self.provenance.is_property(f) {
                    info!(
                        depth = self.session.oracle.counterexample_solver_depth(),
                        frame = self.frame_index,
                        "counterexample found"
                    );
                }
                break;
            };

            k += refutes_depth;
            f = parent;

            if self.provenance.is_invalid(f) {
                break;
            }

            self.assert_false_at(f, k)?;
            if self.session.oracle.counterexample_solver().check()? != SatResult::Sat {
                debug!(formula = %self.show(f), frame = k, "counterexample extension stopped");
                break;
            }

            self.set_invalid(f, k);
            self.record_model()?;
            debug!(formula = %self.show(f), frame = k, "extended counterexample");
        }

        Ok(())
    }

    fn assert_false_at(&mut self, f: Formula, k: usize) -> Ic3Result<()> {
        self.session.oracle.ensure_counterexample_solver_depth(k);
        let not_f = self.session.terms.mk_not(f);
        let at = self.session.trace.state_formula(not_f, k);
        self.session
            .oracle
            .counterexample_solver()
            .add(at, FormulaClass::A)
    }

    fn record_model(&mut self) -> Ic3Result<()> {
        let model = self.session.oracle.counterexample_solver().model()?;
        self.session.trace.set_model(model);
        Ok(())
    }
}
