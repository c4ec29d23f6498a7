//! Progress reporting for long-running pipeline stages.
//!
//! Loading, merging, and scoring report through [`ProgressCallback`] so the
//! library crates stay independent of any terminal UI. The CLI plugs in
//! `indicatif` bars; tests use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a pipeline stage.
///
/// Implementations must be `Send + Sync`: scoring stages report from
/// blocking worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Mark the stage complete with a final message.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
