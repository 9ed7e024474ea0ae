//! Progress tracking shared by concurrent transfer workers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback invoked as discrete work units finish: `(processed, total)`.
pub type UnitProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// A unit-progress callback that does nothing.
pub fn silent() -> UnitProgress {
    Arc::new(|_, _| {})
}

/// Cumulative byte counter updated concurrently by transfer workers.
#[derive(Debug)]
pub struct ByteProgress {
    transferred: AtomicU64,
    total: u64,
}

impl ByteProgress {
    pub fn new(total: u64) -> Self {
        Self {
            transferred: AtomicU64::new(0),
            total,
        }
    }

    /// Record `bytes` more transferred; returns the new cumulative count.
    pub fn add(&self, bytes: u64) -> u64 {
        self.transferred.fetch_add(bytes, Ordering::Relaxed) + bytes
    }

    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Whole percentage transferred; 100 when the total is zero.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.transferred() * 100) / self.total).min(100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates() {
        let progress = ByteProgress::new(100);
        assert_eq!(progress.add(30), 30);
        assert_eq!(progress.add(20), 50);
        assert_eq!(progress.transferred(), 50);
        assert_eq!(progress.percent(), 50);
    }

    #[test]
    fn test_zero_total_is_complete() {
        let progress = ByteProgress::new(0);
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_percent_caps_at_100() {
        let progress = ByteProgress::new(10);
        progress.add(25);
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_concurrent_adds() {
        let progress = Arc::new(ByteProgress::new(1000));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let progress = Arc::clone(&progress);
            handles.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    progress.add(10);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(progress.transferred(), 1000);
    }
}
