//! Per-run shared counters and completion flags.
//!
//! One [`RunContext`] is created per invocation and handed to every worker
//! as an `Arc` - there are no process-wide singletons. Counters are plain
//! atomics; the completion flags are monotonic (false → true, never back).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Shared run state: discovery/download counters and phase flags.
///
/// Counters are updated exactly once per terminal outcome per target
/// (downloaded, skipped, or failed) and never reset during a run.
#[derive(Debug)]
pub struct RunContext {
    total_discovered: AtomicUsize,
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    containers_finished: AtomicBool,
    discovery_finished: AtomicBool,
    started_at: Instant,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    /// Creates a fresh context with zeroed counters and cleared flags.
    #[must_use]
    pub fn new() -> Self {
        Self {
            total_discovered: AtomicUsize::new(0),
            downloaded: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            containers_finished: AtomicBool::new(false),
            discovery_finished: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    /// Records one discovered download link.
    pub fn record_discovered(&self) {
        self.total_discovered.fetch_add(1, Ordering::SeqCst);
    }

    /// Records one completed download.
    pub fn record_downloaded(&self) {
        self.downloaded.fetch_add(1, Ordering::SeqCst);
    }

    /// Records one target skipped by the Ignore collision policy.
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    /// Records one target that exhausted its fetch attempts.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Total download links discovered so far.
    #[must_use]
    pub fn total_discovered(&self) -> usize {
        self.total_discovered.load(Ordering::SeqCst)
    }

    /// Downloads completed so far.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Targets skipped so far.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Targets that permanently failed so far.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Marks the outer (container) walk as exhausted. Monotonic.
    pub fn finish_containers(&self) {
        self.containers_finished.store(true, Ordering::SeqCst);
    }

    /// True once the outer walk has exhausted its chain.
    #[must_use]
    pub fn containers_finished(&self) -> bool {
        self.containers_finished.load(Ordering::SeqCst)
    }

    /// Marks all discovery (outer walk and every inner worker) as done. Monotonic.
    pub fn finish_discovery(&self) {
        self.discovery_finished.store(true, Ordering::SeqCst);
    }

    /// True once every discovery worker has exited.
    #[must_use]
    pub fn discovery_finished(&self) -> bool {
        self.discovery_finished.load(Ordering::SeqCst)
    }

    /// Time elapsed since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// The run-complete predicate: discovery is finished, the target queue
    /// is drained (`pending_targets == 0`), and every discovered link has
    /// reached a terminal outcome.
    #[must_use]
    pub fn is_run_complete(&self, pending_targets: usize) -> bool {
        self.discovery_finished()
            && pending_targets == 0
            && self.downloaded() + self.skipped() + self.failed() == self.total_discovered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_zeroed() {
        let ctx = RunContext::new();
        assert_eq!(ctx.total_discovered(), 0);
        assert_eq!(ctx.downloaded(), 0);
        assert_eq!(ctx.skipped(), 0);
        assert_eq!(ctx.failed(), 0);
        assert!(!ctx.containers_finished());
        assert!(!ctx.discovery_finished());
    }

    #[test]
    fn test_counters_accumulate() {
        let ctx = RunContext::new();
        ctx.record_discovered();
        ctx.record_discovered();
        ctx.record_downloaded();
        ctx.record_skipped();
        assert_eq!(ctx.total_discovered(), 2);
        assert_eq!(ctx.downloaded(), 1);
        assert_eq!(ctx.skipped(), 1);
    }

    #[test]
    fn test_flags_are_monotonic() {
        let ctx = RunContext::new();
        ctx.finish_containers();
        ctx.finish_discovery();
        assert!(ctx.containers_finished());
        assert!(ctx.discovery_finished());
    }

    #[test]
    fn test_run_complete_requires_all_conditions() {
        let ctx = RunContext::new();
        ctx.record_discovered();
        ctx.record_discovered();
        ctx.record_downloaded();

        // Discovery not finished yet
        assert!(!ctx.is_run_complete(0));

        ctx.finish_discovery();
        // One target still unaccounted for
        assert!(!ctx.is_run_complete(0));

        ctx.record_skipped();
        // Queue not drained
        assert!(!ctx.is_run_complete(1));
        assert!(ctx.is_run_complete(0));
    }

    #[test]
    fn test_run_complete_counts_failed_targets() {
        let ctx = RunContext::new();
        ctx.record_discovered();
        ctx.record_failed();
        ctx.finish_discovery();
        assert!(ctx.is_run_complete(0));
    }
}
