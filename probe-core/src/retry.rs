//! Fixed-delay retry bounded by total elapsed time.
//!
//! A [`RetryPolicy`] is a plain value composed around a call:
//!
//! ```ignore
//! let policy = RetryPolicy::fixed(Duration::from_secs(2), Duration::from_secs(500))
//!     .retry_on_result(|matched: &bool| !*matched);
//! let matched = policy.run(|| probe.attempt()).await?;
//! ```
//!
//! After each attempt the policy decides whether the outcome is worth
//! another try (error predicate for `Err`, result predicate for `Ok`). It
//! gives up once the next attempt would start past `max_elapsed` and hands
//! back the last outcome unchanged, so a final failure is never swallowed.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

type Predicate<V> = Arc<dyn Fn(&V) -> bool + Send + Sync>;

/// Delay between attempts used by the cluster suites.
pub const DEFAULT_FIXED_DELAY: Duration = Duration::from_secs(2);

/// Elapsed ceiling used by the cluster suites.
pub const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(500);

/// Bounded retry over operations returning `Result<T, E>`.
pub struct RetryPolicy<T, E> {
    fixed_delay: Duration,
    max_elapsed: Duration,
    retry_on_result: Predicate<T>,
    retry_on_error: Predicate<E>,
}

impl<T, E> RetryPolicy<T, E> {
    /// Retry every error, accept every value.
    pub fn fixed(fixed_delay: Duration, max_elapsed: Duration) -> Self {
        Self {
            fixed_delay,
            max_elapsed,
            retry_on_result: Arc::new(|_: &T| false),
            retry_on_error: Arc::new(|_: &E| true),
        }
    }

    /// Also retry when a returned value satisfies `predicate`.
    pub fn retry_on_result(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.retry_on_result = Arc::new(predicate);
        self
    }

    /// Only retry errors that satisfy `predicate`.
    pub fn retry_on_error(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.retry_on_error = Arc::new(predicate);
        self
    }

    /// Sleep between attempts.
    pub fn fixed_delay(&self) -> Duration {
        self.fixed_delay
    }

    /// Total budget measured from the first attempt.
    pub fn max_elapsed(&self) -> Duration {
        self.max_elapsed
    }

    /// Invoke `op` until it produces an acceptable outcome or the budget runs out.
    pub async fn run<F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let outcome = op().await;

            let wants_retry = match &outcome {
                Ok(value) => (self.retry_on_result)(value),
                Err(err) => (self.retry_on_error)(err),
            };
            if !wants_retry {
                return outcome;
            }

            let elapsed = start.elapsed();
            if elapsed + self.fixed_delay > self.max_elapsed {
                tracing::debug!(
                    attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "retry budget exhausted"
                );
                return outcome;
            }

            tracing::trace!(attempt, delay_ms = self.fixed_delay.as_millis() as u64, "retrying");
            tokio::time::sleep(self.fixed_delay).await;
        }
    }
}

impl<T, E> Default for RetryPolicy<T, E> {
    fn default() -> Self {
        Self::fixed(DEFAULT_FIXED_DELAY, DEFAULT_MAX_ELAPSED)
    }
}

impl<T, E> Clone for RetryPolicy<T, E> {
    fn clone(&self) -> Self {
        Self {
            fixed_delay: self.fixed_delay,
            max_elapsed: self.max_elapsed,
            retry_on_result: Arc::clone(&self.retry_on_result),
            retry_on_error: Arc::clone(&self.retry_on_error),
        }
    }
}

impl<T, E> fmt::Debug for RetryPolicy<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("fixed_delay", &self.fixed_delay)
            .field("max_elapsed", &self.max_elapsed)
            .finish_non_exhaustive()
    }
}
