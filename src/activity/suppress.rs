use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Grace window added to every hold. Mutation observation is asynchronous and
/// can fire a tick after the write, so the window must outlive the write.
pub const SUPPRESS_GRACE: Duration = Duration::from_millis(250);

/// Deadline-based suppression flag shared by every pipeline-originated canvas
/// writer. While held, the debouncer treats incoming mutation events as
/// self-caused: the quiet timer neither resets nor starts.
#[derive(Debug)]
pub struct SuppressGuard {
    epoch: Instant,
    until_ms: AtomicU64,
}

impl Default for SuppressGuard {
    fn default() -> Self {
        Self {
            epoch: Instant::now(),
            until_ms: AtomicU64::new(0),
        }
    }
}

impl SuppressGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend suppression to at least `dur` from now. Overlapping holds keep
    /// the later deadline.
    pub fn hold(&self, dur: Duration) {
        let deadline = self.now_ms() + dur.as_millis() as u64;
        self.until_ms.fetch_max(deadline, Ordering::SeqCst);
    }

    pub fn active(&self) -> bool {
        self.now_ms() < self.until_ms.load(Ordering::SeqCst)
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_expires() {
        let guard = SuppressGuard::new();
        assert!(!guard.active());
        guard.hold(Duration::from_millis(30));
        assert!(guard.active());
        std::thread::sleep(Duration::from_millis(50));
        assert!(!guard.active());
    }

    #[test]
    fn overlapping_holds_keep_the_later_deadline() {
        let guard = SuppressGuard::new();
        guard.hold(Duration::from_secs(5));
        guard.hold(Duration::from_millis(1));
        assert!(guard.active(), "shorter hold must not shrink the deadline");
    }
}
