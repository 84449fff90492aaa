use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

/// Time source for every wait and timeout in a hunt.
pub trait Clock: Send {
    /// Monotonic time since the clock was created.
    fn now(&self) -> Duration;
    fn sleep(&self, d: Duration);
}

/// Real time, with optional +/- random jitter on each sleep.
pub struct SystemClock {
    origin: Instant,
    jitter: f64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::with_jitter(0.0)
    }

    pub fn with_jitter(jitter: f64) -> Self {
        Self { origin: Instant::now(), jitter: jitter.clamp(0.0, 0.99) }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        let secs = d.as_secs_f64();
        let actual = if self.jitter > 0.0 {
            let j = secs * self.jitter;
            secs + rand::thread_rng().gen_range(-j..j)
        } else {
            secs
        };
        thread::sleep(Duration::from_secs_f64(actual.max(0.001)));
    }
}

/// Virtual time: sleeping advances the clock instantly. Clones share one timeline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.nanos.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_on_sleep_and_shares_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.sleep(Duration::from_millis(1500));
        other.advance(Duration::from_millis(500));
        assert_eq!(clock.now(), Duration::from_secs(2));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::with_jitter(0.3);
        let a = clock.now();
        clock.sleep(Duration::from_millis(2));
        assert!(clock.now() > a);
    }
}
