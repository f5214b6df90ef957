/// Search statistics, updated as the search progresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ic3Stats {
    /// Index of the active frame.
    pub frame_index: usize,
    /// Induction depth of the active frame.
    pub induction_depth: usize,
    /// Formulas in the frame set.
    pub frame_size: usize,
    /// Obligations staged for the next frame.
    pub frame_pushed: usize,
    /// Obligations currently queued.
    pub queue_size: usize,
    /// Deepest frame a counterexample was extended to.
    pub max_cex_depth: usize,
    /// Completed push rounds.
    pub rounds: usize,
}
