//! Bounded fixed-interval retries.
//!
//! Both polling loops in the workflow (the connectivity probe and the restore
//! verification) share [`RetryPolicy`]. The caller supplies the operation and
//! a predicate deciding which errors are worth another attempt; anything else
//! stops the loop at once.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// How the retry loop ended without a success.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// The error from the final attempt.
        last_error: E,
    },

    /// An attempt failed with an error the predicate rejected.
    #[error("attempt {attempt} failed: {error}")]
    Fatal {
        /// The attempt that failed, counting from 1.
        attempt: u32,
        /// The error it failed with.
        error: E,
    },
}

/// Maximum attempts and the pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. A zero attempt budget is raised to one.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            delay,
        }
    }

    /// Create a policy from an attempt count and a delay in whole seconds.
    #[must_use]
    pub const fn from_secs(max_attempts: u32, delay_secs: u64) -> Self {
        Self::new(max_attempts, Duration::from_secs(delay_secs))
    }

    /// Attempts allowed, at least one.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause between consecutive attempts.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `operation` until it succeeds, fails fatally, or the budget runs out.
    ///
    /// `operation` receives the 1-based attempt number. The delay is slept
    /// only between attempts, never after the last one.
    ///
    /// # Errors
    ///
    /// Returns `RetryError::Fatal` as soon as an error fails `is_retryable`,
    /// and `RetryError::Exhausted` with the last error once every attempt has
    /// failed.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        is_retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        self.run_with(
            (),
            |(), attempt| {
                let pending = operation(attempt);
                async move { ((), pending.await) }
            },
            is_retryable,
        )
        .await
    }

    /// Like [`Self::run`], but each attempt takes ownership of `state` and
    /// hands it back alongside its result.
    ///
    /// Suits attempts that need exclusive use of a value, such as an open
    /// session, across the whole loop.
    ///
    /// # Errors
    ///
    /// As for [`Self::run`].
    pub async fn run_with<S, T, E, F, Fut, P>(
        &self,
        mut state: S,
        mut operation: F,
        is_retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(S, u32) -> Fut,
        Fut: Future<Output = (S, Result<T, E>)>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            let (returned, outcome) = operation(state, attempt).await;
            state = returned;
            match outcome {
                Ok(value) => return Ok(value),
                Err(error) if !is_retryable(&error) => {
                    return Err(RetryError::Fatal { attempt, error });
                }
                Err(error) if attempt >= self.max_attempts => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last_error: error,
                    });
                }
                Err(error) => {
                    debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        %error,
                        "attempt failed; retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}
