//! Batch progress reporting.

/// Trait for receiving batch sync progress updates.
pub trait BatchProgress {
    /// Called when a phase starts (e.g., "Checking 10 titles").
    fn on_phase(&self, message: &str);

    /// Called after each title's result has been applied.
    fn on_title(&self, current: usize, total: usize, slug: &str, outcome: &str);

    /// Called when the batch is complete.
    fn on_complete(&self, message: &str);
}

/// A no-op progress reporter that discards all updates.
pub struct SilentProgress;

impl BatchProgress for SilentProgress {
    fn on_phase(&self, _message: &str) {}
    fn on_title(&self, _current: usize, _total: usize, _slug: &str, _outcome: &str) {}
    fn on_complete(&self, _message: &str) {}
}

/// A progress reporter that logs to the `log` crate.
pub struct LogProgress;

impl BatchProgress for LogProgress {
    fn on_phase(&self, message: &str) {
        log::info!("{}", message);
    }

    fn on_title(&self, current: usize, total: usize, slug: &str, outcome: &str) {
        log::info!("  [{}/{}] {}: {}", current, total, slug, outcome);
    }

    fn on_complete(&self, message: &str) {
        log::info!("{}", message);
    }
}
