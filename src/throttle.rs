use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::Utc;

/// Source of "now" in milliseconds since the epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn starting_at(now_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now_ms)),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Per-key rate limiter over a window measured backward from "now".
///
/// Each key keeps the timestamps of its accepted attempts. Timestamps that
/// have aged out of the window are purged lazily on the next
/// [`try_acquire`](Self::try_acquire) for that key; there is no background
/// sweep other than the explicit [`prune_idle`](Self::prune_idle).
pub struct SlidingWindowThrottle {
    windows: HashMap<String, VecDeque<i64>>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowThrottle {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: HashMap::new(),
            clock,
        }
    }

    /// Records an attempt for `key`. Returns `false` without recording when
    /// `limit` attempts were already accepted inside the last `window`.
    pub fn try_acquire(&mut self, key: &str, limit: usize, window: Duration) -> bool {
        let now = self.clock.now_ms();
        let window_ms = window_millis(window);
        let recent = self.windows.entry(key.to_string()).or_default();

        while recent.front().is_some_and(|&ts| now - ts >= window_ms) {
            recent.pop_front();
        }

        if recent.len() >= limit {
            return false;
        }

        recent.push_back(now);
        true
    }

    /// Estimated wait before `key` may send again.
    ///
    /// This is measured from the single oldest recorded timestamp, so it is an
    /// approximation for display: the exact retry instant is when the oldest
    /// of the `limit` most recent attempts expires, which can be later when
    /// more than `limit` attempts were recorded over time.
    pub fn remaining_cooldown(&self, key: &str, window: Duration) -> Duration {
        let Some(oldest) = self.windows.get(key).and_then(|recent| recent.front()) else {
            return Duration::ZERO;
        };

        let elapsed = self.clock.now_ms() - oldest;
        let remaining = window_millis(window) - elapsed;
        Duration::from_millis(remaining.max(0) as u64)
    }

    /// Drops keys with no timestamp inside `window`. Returns how many were removed.
    pub fn prune_idle(&mut self, window: Duration) -> usize {
        let now = self.clock.now_ms();
        let window_ms = window_millis(window);
        let before = self.windows.len();
        self.windows.retain(|_, recent| {
            recent
                .back()
                .is_some_and(|&newest| now - newest < window_ms)
        });
        before - self.windows.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

fn window_millis(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    fn throttle_at(now_ms: i64) -> (SlidingWindowThrottle, ManualClock) {
        let clock = ManualClock::starting_at(now_ms);
        (SlidingWindowThrottle::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn accepts_exactly_limit_attempts_inside_window() {
        let (mut throttle, clock) = throttle_at(0);

        for step in 0..3 {
            clock.set(step);
            assert!(throttle.try_acquire("alice", 3, MINUTE));
        }
        clock.set(3);
        assert!(!throttle.try_acquire("alice", 3, MINUTE));
    }

    #[test]
    fn window_slides_once_earliest_attempt_expires() {
        let (mut throttle, clock) = throttle_at(0);
        assert!(throttle.try_acquire("alice", 2, MINUTE));
        clock.set(10_000);
        assert!(throttle.try_acquire("alice", 2, MINUTE));
        clock.set(59_999);
        assert!(!throttle.try_acquire("alice", 2, MINUTE));

        clock.set(60_000);
        assert!(throttle.try_acquire("alice", 2, MINUTE));
        assert!(!throttle.try_acquire("alice", 2, MINUTE));
    }

    #[test]
    fn rejected_attempts_are_not_recorded() {
        let (mut throttle, clock) = throttle_at(0);
        assert!(throttle.try_acquire("alice", 1, MINUTE));
        for offset in 1..50 {
            clock.set(offset * 1_000);
            assert!(!throttle.try_acquire("alice", 1, MINUTE));
        }
        clock.set(60_000);
        assert!(throttle.try_acquire("alice", 1, MINUTE));
    }

    #[test]
    fn keys_are_independent() {
        let (mut throttle, _clock) = throttle_at(0);
        assert!(throttle.try_acquire("alice", 1, MINUTE));
        assert!(!throttle.try_acquire("alice", 1, MINUTE));
        assert!(throttle.try_acquire("bob", 1, MINUTE));
    }

    #[test]
    fn cooldown_is_zero_without_history() {
        let (throttle, _clock) = throttle_at(5_000);
        assert_eq!(throttle.remaining_cooldown("nobody", MINUTE), Duration::ZERO);
    }

    #[test]
    fn cooldown_counts_down_from_oldest_attempt() {
        let (mut throttle, clock) = throttle_at(0);
        for step in 0..3 {
            clock.set(step);
            throttle.try_acquire("alice", 3, MINUTE);
        }
        clock.set(3);
        assert!(!throttle.try_acquire("alice", 3, MINUTE));
        assert_eq!(
            throttle.remaining_cooldown("alice", MINUTE),
            Duration::from_millis(59_997)
        );
    }

    #[test]
    fn cooldown_never_goes_negative() {
        let (mut throttle, clock) = throttle_at(0);
        throttle.try_acquire("alice", 3, MINUTE);
        clock.set(600_000);
        assert_eq!(throttle.remaining_cooldown("alice", MINUTE), Duration::ZERO);
    }

    #[test]
    fn prune_idle_drops_only_stale_keys() {
        let (mut throttle, clock) = throttle_at(0);
        throttle.try_acquire("stale", 3, MINUTE);
        clock.set(50_000);
        throttle.try_acquire("fresh", 3, MINUTE);

        clock.set(70_000);
        assert_eq!(throttle.prune_idle(MINUTE), 1);
        assert_eq!(throttle.tracked_keys(), 1);
        assert!(throttle.remaining_cooldown("fresh", MINUTE) > Duration::ZERO);
    }
}
