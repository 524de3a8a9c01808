//! In-memory login lockout.
//!
//! Failures are tracked per client identifier inside a rolling window. When
//! the count inside the window reaches the limit the bucket's failures are
//! cleared and a lockout expiry is set. The login handler checks the lockout
//! before counting, so attempts made while locked neither count nor extend
//! it. State lives for the life of the process.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

#[derive(Debug, Default)]
struct Bucket {
    failures: VecDeque<Duration>,
    lock_until: Option<Duration>,
}

impl Bucket {
    fn prune(&mut self, now: Duration, window: Duration) {
        let cutoff = now.saturating_sub(window);
        while self.failures.front().is_some_and(|at| *at < cutoff) {
            self.failures.pop_front();
        }
    }

    fn is_empty(&self) -> bool {
        self.failures.is_empty() && self.lock_until.is_none()
    }
}

/// Per-identifier failure counter with absolute lockouts.
///
/// Timestamps are durations since the unix epoch so callers (and tests) own
/// the clock.
#[derive(Debug)]
pub struct LoginLimiter {
    limit: usize,
    window: Duration,
    lock: Duration,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl LoginLimiter {
    #[must_use]
    pub fn new(limit: u32, window: Duration, lock: Duration) -> Self {
        Self {
            limit: usize::try_from(limit.max(1)).unwrap_or(usize::MAX),
            window,
            lock,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// True iff the identifier's lockout expiry is strictly after `now`.
    pub fn is_locked(&self, identifier: &str, now: Duration) -> bool {
        let mut buckets = self.buckets();
        let Some(bucket) = buckets.get_mut(identifier) else {
            return false;
        };
        bucket.prune(now, self.window);
        match bucket.lock_until {
            Some(until) if until > now => true,
            Some(_) => {
                bucket.lock_until = None;
                if bucket.is_empty() {
                    buckets.remove(identifier);
                }
                false
            }
            None => false,
        }
    }

    /// Record a failed attempt, locking the identifier once the limit is hit.
    ///
    /// Returns true when this failure triggered a lockout.
    pub fn register_failure(&self, identifier: &str, now: Duration) -> bool {
        let mut buckets = self.buckets();
        let bucket = buckets.entry(identifier.to_string()).or_default();
        bucket.failures.push_back(now);
        bucket.prune(now, self.window);
        if bucket.failures.len() >= self.limit {
            bucket.failures.clear();
            bucket.lock_until = Some(now.saturating_add(self.lock));
            return true;
        }
        false
    }

    /// Forget every failure and lockout recorded for the identifier.
    pub fn register_success(&self, identifier: &str) {
        self.buckets().remove(identifier);
    }

    // Poisoning is ignored; no mutation above can leave a bucket half-written.
    fn buckets(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(600);
    const LOCK: Duration = Duration::from_secs(900);
    const T0: Duration = Duration::from_secs(1_700_000_000);

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    #[test]
    fn concurrent_failures_trigger_exactly_one_lockout() {
        use std::sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        };

        const LIMIT: u32 = 50;
        const THREADS: u32 = 10;

        let limiter = Arc::new(LoginLimiter::new(LIMIT, WINDOW, LOCK));
        let triggered = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                let limiter = Arc::clone(&limiter);
                let triggered = &triggered;
                scope.spawn(move || {
                    for _ in 0..LIMIT / THREADS {
                        if limiter.register_failure("a", T0) {
                            triggered.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(triggered.load(Ordering::SeqCst), 1);
        assert!(limiter.is_locked("a", T0));
    }

    #[test]
    fn locks_after_limit_until_lock_elapses() {
        let limiter = LoginLimiter::new(3, WINDOW, LOCK);
        assert!(!limiter.register_failure("a", T0));
        assert!(!limiter.register_failure("a", T0 + secs(1)));
        assert!(!limiter.is_locked("a", T0 + secs(2)));
        assert!(limiter.register_failure("a", T0 + secs(2)));

        assert!(limiter.is_locked("a", T0 + secs(2)));
        assert!(limiter.is_locked("a", T0 + secs(2) + LOCK - secs(1)));
        assert!(!limiter.is_locked("a", T0 + secs(2) + LOCK));
    }

    #[test]
    fn failures_outside_window_do_not_count() {
        let limiter = LoginLimiter::new(2, WINDOW, LOCK);
        limiter.register_failure("a", T0);
        assert!(!limiter.register_failure("a", T0 + WINDOW + secs(1)));
        assert!(!limiter.is_locked("a", T0 + WINDOW + secs(1)));
    }

    #[test]
    fn lockout_is_absolute_from_trigger() {
        let limiter = LoginLimiter::new(2, WINDOW, LOCK);
        limiter.register_failure("a", T0);
        assert!(limiter.register_failure("a", T0 + secs(1)));
        for offset in [1, 100, 500, 900] {
            assert!(limiter.is_locked("a", T0 + secs(offset)));
        }
        assert!(!limiter.is_locked("a", T0 + secs(1) + LOCK));
        // The count restarted when the lockout fired.
        assert!(!limiter.register_failure("a", T0 + secs(2) + LOCK));
    }

    #[test]
    fn success_resets_the_count() {
        let limiter = LoginLimiter::new(3, WINDOW, LOCK);
        limiter.register_failure("a", T0);
        limiter.register_failure("a", T0 + secs(1));
        limiter.register_success("a");

        assert!(!limiter.register_failure("a", T0 + secs(2)));
        assert!(!limiter.register_failure("a", T0 + secs(3)));
        assert!(!limiter.is_locked("a", T0 + secs(3)));
        assert!(limiter.register_failure("a", T0 + secs(4)));
    }

    #[test]
    fn success_clears_an_active_lockout() {
        let limiter = LoginLimiter::new(1, WINDOW, LOCK);
        limiter.register_failure("a", T0);
        assert!(limiter.is_locked("a", T0));
        limiter.register_success("a");
        assert!(!limiter.is_locked("a", T0));
    }

    #[test]
    fn identifiers_are_isolated() {
        let limiter = LoginLimiter::new(2, WINDOW, LOCK);
        limiter.register_failure("x", T0);
        limiter.register_failure("y", T0);
        limiter.register_success("x");

        assert!(limiter.register_failure("y", T0 + secs(1)));
        assert!(limiter.is_locked("y", T0 + secs(1)));
        assert!(!limiter.is_locked("x", T0 + secs(1)));
    }

    #[test]
    fn zero_limit_behaves_like_one() {
        let limiter = LoginLimiter::new(0, WINDOW, LOCK);
        assert!(limiter.register_failure("a", T0));
    }
}
