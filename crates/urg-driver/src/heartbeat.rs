//! Connection Monitor - tracks when the last scan frame was accepted
//!
//! Uses monotonic time anchored to the first access, stored in an `AtomicU64`
//! so the acquisition thread can update it without locking.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static APP_START: OnceLock<Instant> = OnceLock::new();

/// Microseconds since the anchor, offset by one so that zero means "never"
fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64 + 1
}

const NEVER: u64 = 0;

/// Stream liveness monitor
pub struct ConnectionMonitor {
    last_frame: AtomicU64,
    timeout: Duration,
}

impl ConnectionMonitor {
    /// # Example
    /// ```
    /// # use urg_driver::ConnectionMonitor;
    /// # use std::time::Duration;
    /// let monitor = ConnectionMonitor::new(Duration::from_millis(500));
    /// assert!(!monitor.is_receiving());
    /// monitor.register_frame();
    /// assert!(monitor.is_receiving());
    /// ```
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_frame: AtomicU64::new(NEVER),
            timeout,
        }
    }

    /// Returns true if a frame was accepted within the timeout window
    pub fn is_receiving(&self) -> bool {
        self.time_since_last_frame()
            .is_some_and(|elapsed| elapsed < self.timeout)
    }

    /// Call after each accepted frame
    pub fn register_frame(&self) {
        self.last_frame.store(monotonic_micros(), Ordering::Relaxed);
    }

    /// `None` until the first frame arrives
    pub fn time_since_last_frame(&self) -> Option<Duration> {
        let last = self.last_frame.load(Ordering::Relaxed);
        if last == NEVER {
            return None;
        }
        Some(Duration::from_micros(monotonic_micros().saturating_sub(last)))
    }

    /// Forget the last frame (used when a session closes)
    pub fn reset(&self) {
        self.last_frame.store(NEVER, Ordering::Relaxed);
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_never_received() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(1));
        assert!(!monitor.is_receiving());
        assert!(monitor.time_since_last_frame().is_none());
    }

    #[test]
    fn test_timeout_expires() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(20));
        monitor.register_frame();
        assert!(monitor.is_receiving());
        thread::sleep(Duration::from_millis(40));
        assert!(!monitor.is_receiving());
        assert!(monitor.time_since_last_frame().unwrap() >= Duration::from_millis(20));
    }

    #[test]
    fn test_reset() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(1));
        monitor.register_frame();
        monitor.reset();
        assert!(monitor.time_since_last_frame().is_none());
    }
}
