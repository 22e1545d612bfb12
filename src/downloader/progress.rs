// Progress reporting - bytes remaining → percentage → caller-supplied sink

use std::sync::Arc;

use super::retry::Phase;

/// Receives progress updates. Implementations called from a worker task must
/// marshal to their UI thread themselves.
pub trait ProgressSink: Send + Sync {
    /// Percentage in `[0, 100]`
    fn on_progress(&self, percentage: f64);

    /// State-machine phase changes (for status lines)
    fn on_phase(&self, _phase: Phase) {}
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn on_progress(&self, percentage: f64) {
        self(percentage)
    }
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&self, _percentage: f64) {}
}

/// Snapshot of one transfer, computed per callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub downloaded: u64,
    pub total: u64,
}

impl TransferProgress {
    /// `None` when the total is zero (unknown); clamped to `[0, 100]` otherwise
    pub fn percentage(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        let percent = self.downloaded as f64 / self.total as f64 * 100.0;
        Some(percent.clamp(0.0, 100.0))
    }
}

/// Converts byte-level transfer signals into percentages for a sink.
/// Only state: the total size of the current transfer.
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    total: Option<u64>,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink, total: None }
    }

    /// Forward `(total - remaining) / total * 100`; no-op when total is zero.
    pub fn on_progress(&self, total_size: u64, bytes_remaining: u64) {
        let progress = TransferProgress {
            downloaded: total_size.saturating_sub(bytes_remaining),
            total: total_size,
        };
        if let Some(percentage) = progress.percentage() {
            self.sink.on_progress(percentage);
        }
    }

    /// Start a transfer whose size may be unknown
    pub fn begin(&mut self, total_size: Option<u64>) {
        self.total = total_size;
    }

    /// Report cumulative bytes written for the transfer started with `begin`
    pub fn advance(&self, downloaded: u64) {
        if let Some(total) = self.total {
            self.on_progress(total, total.saturating_sub(downloaded));
        }
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }
}
