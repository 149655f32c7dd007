//! Bounded retry with exponential backoff for remote operations.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, warn};

/// Default number of attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Retry policy: run an operation up to `max_attempts` times, sleeping
/// `base_delay * 2^i` after the i-th failure (0-based).
///
/// The last error is returned once attempts are exhausted. Success is never
/// retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` below one is treated as one.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            base_delay,
        }
    }

    /// A policy that runs the operation exactly once.
    #[must_use]
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept after failed attempt `attempt` (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run a self-contained operation.
    ///
    /// # Errors
    ///
    /// Returns the last error once every attempt has failed.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => self.after_failure(&mut attempt, e).await?,
            }
        }
    }

    /// Run an operation that needs exclusive access to `target` on every
    /// attempt, such as a method on an open session.
    ///
    /// # Errors
    ///
    /// Returns the last error once every attempt has failed.
    pub async fn run_on<S, T, E, F>(&self, target: &mut S, mut op: F) -> Result<T, E>
    where
        S: ?Sized,
        F: for<'a> FnMut(&'a mut S) -> BoxFuture<'a, Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match op(&mut *target).await {
                Ok(value) => return Ok(value),
                Err(e) => self.after_failure(&mut attempt, e).await?,
            }
        }
    }

    /// Record a failure: sleep and return `Ok` when another attempt is
    /// allowed, otherwise hand the error back.
    async fn after_failure<E: Display>(&self, attempt: &mut u32, error: E) -> Result<(), E> {
        let failed = *attempt;
        *attempt += 1;
        if *attempt >= self.max_attempts {
            warn!(attempts = *attempt, %error, "Giving up after retries");
            return Err(error);
        }

        let delay = self.delay_for(failed);
        debug!(
            attempt = *attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            %error,
            "Remote operation failed, retrying"
        );
        tokio::time::sleep(delay).await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// Operation that fails `failures` times, then returns the call count.
    fn flaky(
        failures: u32,
        calls: Arc<AtomicU32>,
    ) -> impl FnMut() -> BoxFuture<'static, Result<u32, String>> {
        move || -> BoxFuture<'static, Result<u32, String>> {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures { Err(format!("failure {n}")) } else { Ok(n) }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = RetryPolicy::default().run(flaky(0, Arc::clone(&calls))).await;
        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_k_times_then_succeeds() {
        for k in 0..DEFAULT_MAX_ATTEMPTS {
            let calls = Arc::new(AtomicU32::new(0));
            let result = RetryPolicy::default().run(flaky(k, Arc::clone(&calls))).await;
            assert_eq!(result, Ok(k + 1));
            assert_eq!(calls.load(Ordering::SeqCst), k + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = RetryPolicy::default().run(flaky(10, Arc::clone(&calls))).await;
        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), DEFAULT_MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles() {
        let stamps = Arc::new(std::sync::Mutex::new(Vec::new()));
        let policy = RetryPolicy::default();

        let recorded = Arc::clone(&stamps);
        let result: Result<(), &str> = policy
            .run(move || {
                recorded.lock().unwrap().push(Instant::now());
                async { Err("down") }
            })
            .await;
        assert!(result.is_err());

        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 3);
        assert_eq!(stamps[1] - stamps[0], Duration::from_millis(1000));
        assert_eq!(stamps[2] - stamps[1], Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_wait_on_exhaustion() {
        let start = Instant::now();
        let _: Result<(), &str> = RetryPolicy::default().run(|| async { Err("down") }).await;
        // 1s + 2s, no sleep after the final attempt.
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_on_reborrows_target() {
        let mut counter = 0u32;
        let result: Result<u32, String> = RetryPolicy::default()
            .run_on(&mut counter, |c| {
                Box::pin(async move {
                    *c += 1;
                    if *c < 2 { Err("again".to_string()) } else { Ok(*c) }
                })
            })
            .await;
        assert_eq!(result, Ok(2));
        assert_eq!(counter, 2);
    }

    #[test]
    fn test_delay_for() {
        let policy = RetryPolicy::new(5, Duration::from_millis(250));
        assert_eq!(policy.delay_for(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(64), Duration::from_millis(250).saturating_mul(u32::MAX));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::once().max_attempts(), 1);
    }
}
