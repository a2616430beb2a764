//! Progress reporting.

/// Receives `(current, total)` chunk counts while an operation runs.
///
/// Called synchronously on the thread running the operation, so it should
/// return quickly.
pub trait ProgressSink {
    fn report(&mut self, current: u64, total: u64);
}

impl<F: FnMut(u64, u64)> ProgressSink for F {
    #[inline]
    fn report(&mut self, current: u64, total: u64) {
        self(current, total);
    }
}

/// Discards all reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    #[inline]
    fn report(&mut self, _current: u64, _total: u64) {}
}
