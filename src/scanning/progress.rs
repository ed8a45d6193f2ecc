//! Shared scan progress
//!
//! A cloneable handle the scanning worker advances block by block while
//! readers on other tasks poll it without taking any wallet lock.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

#[derive(Debug, Default)]
struct ProgressState {
    active: AtomicBool,
    current_height: AtomicU64,
    target_height: AtomicU64,
    records_found: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub struct ScanProgressHandle {
    state: Arc<ProgressState>,
}

impl ScanProgressHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a scan towards `target_height` as running
    pub fn begin(&self, start_height: u64, target_height: u64) {
        self.state.current_height.store(start_height, Ordering::SeqCst);
        self.state.target_height.store(target_height, Ordering::SeqCst);
        self.state.records_found.store(0, Ordering::SeqCst);
        self.state.active.store(true, Ordering::SeqCst);
    }

    /// Move the target of a running scan, e.g. after the node rebuilt its index
    pub fn set_target(&self, target_height: u64) {
        self.state.target_height.store(target_height, Ordering::SeqCst);
    }

    /// Record that every block up to `height` has been processed
    pub fn advance(&self, height: u64, records_found: u64) {
        self.state.current_height.store(height, Ordering::SeqCst);
        self.state
            .records_found
            .fetch_add(records_found, Ordering::SeqCst);
    }

    /// Called once the scanned state is visible to readers
    pub fn finish(&self) {
        self.state.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    pub fn current_height(&self) -> u64 {
        self.state.current_height.load(Ordering::SeqCst)
    }

    pub fn target_height(&self) -> u64 {
        self.state.target_height.load(Ordering::SeqCst)
    }

    pub fn records_found(&self) -> u64 {
        self.state.records_found.load(Ordering::SeqCst)
    }

    /// Height to report while the scan runs
    ///
    /// Stays below the target until `finish`, so a poller that sees the tip
    /// also sees the published result.
    pub fn reported_height(&self) -> u64 {
        self.current_height()
            .min(self.target_height().saturating_sub(1))
    }

    /// Completed fraction in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        let target = self.target_height();
        if target == 0 {
            return if self.is_active() { 0.0 } else { 1.0 };
        }
        (self.current_height() as f64 / target as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_height_stays_below_target_until_finish() {
        let progress = ScanProgressHandle::new();
        progress.begin(0, 10);
        assert!(progress.is_active());

        progress.advance(4, 2);
        assert_eq!(progress.reported_height(), 4);
        progress.advance(10, 1);
        assert_eq!(progress.reported_height(), 9);
        assert_eq!(progress.records_found(), 3);

        progress.finish();
        assert!(!progress.is_active());
        assert!((progress.fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clones_share_state() {
        let progress = ScanProgressHandle::new();
        let observer = progress.clone();
        progress.begin(0, 5);
        progress.advance(3, 0);
        assert_eq!(observer.current_height(), 3);
    }
}
