// Performance metrics module
//
// Provides lightweight metrics tracking for relabel runs

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Process-wide relabel metrics
///
/// Uses atomic operations for thread-safe metric tracking without locks.
/// The background worker records into it while the caller reads it.
#[derive(Debug)]
pub struct Metrics {
    /// Total number of candidate files read
    pub files_scanned: AtomicUsize,

    /// Total number of files rewritten
    pub files_modified: AtomicUsize,

    /// Total number of directories entered
    pub directories_visited: AtomicUsize,

    /// Runs that completed normally
    pub runs_completed: AtomicUsize,

    /// Runs stopped by a cancel request
    pub runs_cancelled: AtomicUsize,

    /// Runs aborted by an error
    pub runs_failed: AtomicUsize,

    /// Total walk time in milliseconds
    pub total_walk_time_ms: AtomicU64,

    /// Application start time
    start_time: Instant,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            files_scanned: AtomicUsize::new(0),
            files_modified: AtomicUsize::new(0),
            directories_visited: AtomicUsize::new(0),
            runs_completed: AtomicUsize::new(0),
            runs_cancelled: AtomicUsize::new(0),
            runs_failed: AtomicUsize::new(0),
            total_walk_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a processed file
    pub fn record_file(&self, modified: bool) {
        self.files_scanned.fetch_add(1, Ordering::Relaxed);
        if modified {
            self.files_modified.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an entered directory
    pub fn record_directory(&self) {
        self.directories_visited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_cancelled(&self) {
        self.runs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the wall time of one walk
    pub fn record_walk_time(&self, duration: Duration) {
        self.total_walk_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get average walk time per scanned file in milliseconds
    pub fn avg_file_time_ms(&self) -> f64 {
        let total = self.total_walk_time_ms.load(Ordering::Relaxed);
        let count = self.files_scanned.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Relabel Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Runs: {} completed, {} cancelled, {} failed",
            self.runs_completed.load(Ordering::Relaxed),
            self.runs_cancelled.load(Ordering::Relaxed),
            self.runs_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Files: {} scanned, {} modified in {} directories",
            self.files_scanned.load(Ordering::Relaxed),
            self.files_modified.load(Ordering::Relaxed),
            self.directories_visited.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total walk time: {:.2}s (avg: {:.2}ms per file)",
            self.total_walk_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_file_time_ms()
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
