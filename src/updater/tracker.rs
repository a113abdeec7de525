//! Single source of truth for download progress within one session.

use super::types::DownloadProgress;

#[derive(Debug, Clone, Default)]
pub struct DownloadTracker {
    current: DownloadProgress,
}

impl DownloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session at 0%.
    pub fn reset(&mut self, bytes_total: u64) {
        self.current = DownloadProgress { bytes_transferred: 0, bytes_total, percent: 0.0 };
    }

    /// Fold a progress tick into the session and return the resulting snapshot.
    ///
    /// Percent is clamped to `[0, 100]` and never goes backwards; a stale tick
    /// keeps the previous percent (and byte counts) untouched.
    pub fn on_progress(&mut self, tick: DownloadProgress) -> DownloadProgress {
        let percent = if tick.percent.is_nan() { 0.0 } else { tick.percent.clamp(0.0, 100.0) };

        if percent < self.current.percent {
            log::debug!(
                "Ignoring out-of-order progress {percent:.1}% (at {:.1}%)",
                self.current.percent
            );
            return self.current;
        }

        let bytes_total =
            if tick.bytes_total > 0 { tick.bytes_total } else { self.current.bytes_total };
        self.current = DownloadProgress {
            bytes_transferred: tick.bytes_transferred.max(self.current.bytes_transferred),
            bytes_total,
            percent,
        };
        self.current
    }

    pub fn current(&self) -> DownloadProgress {
        self.current
    }
}
