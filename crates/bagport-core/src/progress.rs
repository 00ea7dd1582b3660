// crates/bagport-core/src/progress.rs

/// Narrow status-reporting seam. The pipeline calls this once per table
/// boundary and periodically during long row scans; rendering (throttling,
/// terminal redraw, number formatting) is entirely the sink's business.
pub trait ProgressSink: Send + Sync {
    fn update(&self, processed: u64, total: u64, label: &str);
}

/// Discards every update. Useful for tests and headless runs.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&self, _processed: u64, _total: u64, _label: &str) {}
}

/// Forwards updates to the structured log stream.
#[derive(Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn update(&self, processed: u64, total: u64, label: &str) {
        tracing::info!(processed, total, label, "progress");
    }
}
