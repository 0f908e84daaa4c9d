//! Token bucket pacer measured in operations.
//!
//! The rate controller publishes an operations-per-second budget here and the
//! transmission layer calls [`Pacer::acquire`] once per send. Rate updates and
//! reservations share one short critical section, so a reservation always sees
//! a whole rate value and never the middle of an update.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

use crate::time_source::{InstantTimeSrc, TimeSource};

/// Default burst capacity in operations.
pub const DEFAULT_PACER_BURST: u32 = 10;

/// Token bucket pacer.
///
/// Uses a reserve-then-wait pattern: tokens are deducted immediately (the
/// balance may go negative) and the caller sleeps for the returned duration.
/// Because debt carries over, concurrent callers queue behind each other
/// instead of all waking at the same instant.
pub struct Pacer<T: TimeSource = InstantTimeSrc> {
    state: Mutex<PacerState>,
    time_source: T,
}

struct PacerState {
    /// Maximum banked tokens (operations).
    capacity: f64,
    /// Available tokens; negative while callers are queued.
    tokens: f64,
    /// Refill rate (operations/second), never 0.
    rate: u64,
    last_refill: Instant,
}

impl Pacer<InstantTimeSrc> {
    /// Create a pacer at `ops_per_sec` with `burst` operations of capacity.
    pub fn new(ops_per_sec: u64, burst: u32) -> Self {
        Self::new_with_time_source(ops_per_sec, burst, InstantTimeSrc::new())
    }
}

impl<T: TimeSource> Pacer<T> {
    pub fn new_with_time_source(ops_per_sec: u64, burst: u32, time_source: T) -> Self {
        let capacity = f64::from(burst.max(1));
        let now = time_source.now();
        Self {
            state: Mutex::new(PacerState {
                capacity,
                tokens: capacity, // Start full
                rate: ops_per_sec.max(1),
                last_refill: now,
            }),
            time_source,
        }
    }

    /// Reserve one operation and return how long the caller must wait before performing it.
    pub fn reserve(&self) -> Duration {
        self.reserve_n(1)
    }

    /// Reserve `ops` operations at once.
    pub fn reserve_n(&self, ops: u32) -> Duration {
        let now = self.time_source.now();
        let mut state = self.state.lock();
        state.refill(now);

        state.tokens -= f64::from(ops);
        if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-state.tokens / state.rate as f64)
        }
    }

    /// Block the calling thread until one operation is within budget.
    ///
    /// The internal lock is released before sleeping.
    pub fn acquire(&self) {
        let wait = self.reserve();
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }

    /// Update the refill rate. Rates below 1 op/s are raised to 1.
    pub fn set_rate(&self, ops_per_sec: u64) {
        let now = self.time_source.now();
        let mut state = self.state.lock();
        // Settle tokens earned at the old rate first.
        state.refill(now);
        state.rate = ops_per_sec.max(1);
    }

    /// Current rate (operations/second).
    pub fn rate(&self) -> u64 {
        self.state.lock().rate
    }

    #[cfg(test)]
    pub(crate) fn available_tokens(&self) -> f64 {
        let now = self.time_source.now();
        let mut state = self.state.lock();
        state.refill(now);
        state.tokens
    }
}

impl PacerState {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed.is_zero() {
            return;
        }
        let earned = self.rate as f64 * elapsed.as_secs_f64();
        self.tokens = (self.tokens + earned).min(self.capacity);
        self.last_refill = now;
    }
}

impl<T: TimeSource> std::fmt::Debug for Pacer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Pacer")
            .field("rate", &state.rate)
            .field("capacity", &state.capacity)
            .field("tokens", &state.tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_source::SharedMockTimeSource;
    use std::sync::Arc;

    fn mock_pacer(rate: u64, burst: u32) -> (Pacer<SharedMockTimeSource>, SharedMockTimeSource) {
        let clock = SharedMockTimeSource::new(Instant::now());
        (
            Pacer::new_with_time_source(rate, burst, clock.clone()),
            clock,
        )
    }

    #[test]
    fn test_pacer_creation() {
        let (pacer, _) = mock_pacer(100, 10);
        assert_eq!(pacer.rate(), 100);
        assert_eq!(pacer.available_tokens(), 10.0);
    }

    #[test]
    fn test_burst_is_immediate() {
        let (pacer, _) = mock_pacer(100, 10);
        for _ in 0..10 {
            assert_eq!(pacer.reserve(), Duration::ZERO);
        }
        assert_eq!(pacer.available_tokens(), 0.0);
    }

    #[test]
    fn test_debt_accumulates_across_callers() {
        let (pacer, _) = mock_pacer(100, 1);
        assert_eq!(pacer.reserve(), Duration::ZERO);

        // Each further caller queues 10ms behind the previous one.
        let first = pacer.reserve();
        let second = pacer.reserve();
        let third = pacer.reserve();
        assert!((first.as_secs_f64() - 0.01).abs() < 1e-9);
        assert!((second.as_secs_f64() - 0.02).abs() < 1e-9);
        assert!((third.as_secs_f64() - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_refill_over_time_capped_at_capacity() {
        let (pacer, clock) = mock_pacer(100, 5);
        pacer.reserve_n(5);
        assert_eq!(pacer.available_tokens(), 0.0);

        clock.advance_time(Duration::from_millis(20));
        assert!((pacer.available_tokens() - 2.0).abs() < 1e-9);

        clock.advance_time(Duration::from_secs(10));
        assert_eq!(pacer.available_tokens(), 5.0);
    }

    #[test]
    fn test_set_rate_changes_wait() {
        let (pacer, _) = mock_pacer(10, 1);
        pacer.reserve();
        assert!((pacer.reserve().as_secs_f64() - 0.1).abs() < 1e-9);

        pacer.set_rate(1000);
        assert_eq!(pacer.rate(), 1000);
        // Two operations of debt at 1000 op/s.
        assert!((pacer.reserve().as_secs_f64() - 0.002).abs() < 1e-9);
    }

    #[test]
    fn test_zero_rate_floors_at_one() {
        let (pacer, _) = mock_pacer(0, 1);
        assert_eq!(pacer.rate(), 1);
        pacer.set_rate(0);
        assert_eq!(pacer.rate(), 1);
    }

    #[test]
    fn test_unbounded_rate_never_waits_meaningfully() {
        let (pacer, _) = mock_pacer(u64::MAX, 1);
        for _ in 0..1000 {
            assert!(pacer.reserve() < Duration::from_micros(1));
        }
    }

    #[test]
    fn test_acquire_rate_limiting_accuracy() {
        let pacer = Pacer::new(1000, 1);
        let start = Instant::now();
        for _ in 0..101 {
            pacer.acquire();
        }
        let elapsed = start.elapsed();

        // 100 paced operations at 1000 op/s ~= 100ms; loose bounds for scheduler noise.
        assert!(
            elapsed >= Duration::from_millis(80),
            "Too fast: {:?}",
            elapsed
        );
        assert!(
            elapsed <= Duration::from_millis(600),
            "Too slow: {:?}",
            elapsed
        );
    }

    #[test]
    fn test_concurrent_acquire_with_rate_updates() {
        let pacer = Arc::new(Pacer::new(2000, 1));
        let start = Instant::now();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let pacer = pacer.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        pacer.acquire();
                    }
                })
            })
            .collect();

        let updater = {
            let pacer = pacer.clone();
            std::thread::spawn(move || {
                for i in 0..20u64 {
                    pacer.set_rate(2000 + i);
                    std::thread::sleep(Duration::from_millis(1));
                }
            })
        };

        for worker in workers {
            worker.join().unwrap();
        }
        updater.join().unwrap();

        // 200 operations at ~2000 op/s ~= 100ms.
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(70),
            "Too fast: {:?}",
            elapsed
        );
        assert!(
            elapsed <= Duration::from_millis(800),
            "Too slow: {:?}",
            elapsed
        );
        assert!(pacer.rate() >= 2000);
    }
}
