//! Progress handles passed into the scan entry points.
//!
//! Scans write fractional progress through an explicit sink instead of any
//! global state; a display attaches by implementing [`ProgressSink`].

/// Receives fractional scan progress in [0, 1] for one of the two file slots.
///
/// Called once per byte scanned, so implementations must be cheap and must
/// never block. Values per slot only ever increase within a run.
pub trait ProgressSink: Send + Sync {
    fn report(&self, file: usize, fraction: f64);
}

/// Sink used when no progress display is attached.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _file: usize, _fraction: f64) {}
}

/// A sink bound to one file slot, handed to a single scan.
pub struct FileProgress<'a> {
    sink: &'a dyn ProgressSink,
    file: usize,
}

impl<'a> FileProgress<'a> {
    pub fn new(sink: &'a dyn ProgressSink, file: usize) -> Self {
        Self { sink, file }
    }

    pub fn report(&self, fraction: f64) {
        self.sink.report(self.file, fraction);
    }
}
