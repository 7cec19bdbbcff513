// ─────────────────────────────────────────────
// ProgressSink
// ─────────────────────────────────────────────

/// Advisory progress reporting for long scans.
///
/// Purely informational: a sink never affects which candidates are
/// evaluated, the result set, or its order. `begin` receives the size of
/// the candidate universe about to be scanned, `step` fires once per
/// candidate visited (including candidates the optimizer skips), `end`
/// fires when the scan is over.
pub trait ProgressSink {
    fn begin(&mut self, total: usize);
    fn step(&mut self);
    fn end(&mut self);
}

/// Discards every progress event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn begin(&mut self, _total: usize) {}

    fn step(&mut self) {}

    fn end(&mut self) {}
}

/// Records every progress event. A test double.
#[derive(Debug, Clone, Default)]
pub struct CountingProgress {
    pub total: usize,
    pub steps: usize,
    pub ended: bool,
}

impl ProgressSink for CountingProgress {
    fn begin(&mut self, total: usize) {
        self.total = total;
    }

    fn step(&mut self) {
        self.steps += 1;
    }

    fn end(&mut self) {
        self.ended = true;
    }
}
