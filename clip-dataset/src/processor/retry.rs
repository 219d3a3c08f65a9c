//! Retry with exponential backoff.

use crate::common::*;

/// The error returned when an operation keeps failing.
#[derive(Debug)]
pub struct RetryError<E> {
    pub error: E,
    /// The number of attempts made, including the first one.
    pub attempts: usize,
}

/// Decides how many times and how fast a failed operation is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Build a retry policy.
    ///
    /// * `max_retries` - The number of retries after the first attempt.
    /// * `initial_backoff` - The delay before the first retry.
    /// * `backoff_multiplier` - The growth factor of the delay per retry.
    pub fn new(max_retries: usize, initial_backoff: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_backoff,
            backoff_multiplier: backoff_multiplier.max(1.0),
        }
    }

    /// A policy that runs the operation exactly once.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO, 1.0)
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// The delay before the `retry`-th retry, counting from 1.
    pub fn backoff(&self, retry: usize) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exp = (retry - 1).min(i32::MAX as usize) as i32;
        let nanos = self.initial_backoff.as_nanos() as f64 * self.backoff_multiplier.powi(exp);
        if !nanos.is_finite() || nanos >= u64::MAX as f64 {
            return Duration::MAX;
        }
        Duration::from_nanos(nanos as u64)
    }

    /// Run `op` until it succeeds, fails with a permanent error or runs out
    /// of attempts. The closure receives the zero-based attempt number.
    pub fn run<T, E, F, P>(&self, mut op: F, is_transient: P) -> Result<T, RetryError<E>>
    where
        F: FnMut(usize) -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            match op(attempt) {
                Ok(output) => return Ok(output),
                Err(error) => {
                    let attempts = attempt + 1;
                    if attempts >= self.max_attempts() || !is_transient(&error) {
                        return Err(RetryError { error, attempts });
                    }

                    let delay = self.backoff(attempts);
                    warn!(
                        "attempt {}/{} failed: {}, retry in {:?}",
                        attempts,
                        self.max_attempts(),
                        error,
                        delay
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt = attempts;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::ZERO, 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::ZERO, 2.0);
        let mut calls = 0;

        let output = policy
            .run(
                |attempt| {
                    calls += 1;
                    if attempt < 2 {
                        Err("busy")
                    } else {
                        Ok(attempt)
                    }
                },
                |_| true,
            )
            .unwrap();

        assert_eq!(output, 2);
        assert_eq!(calls, 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(2, Duration::ZERO, 2.0);
        let mut calls = 0;

        let err = policy
            .run(
                |_| -> Result<(), _> {
                    calls += 1;
                    Err("broken")
                },
                |_| true,
            )
            .unwrap_err();

        assert_eq!(err.attempts, 3);
        assert_eq!(err.error, "broken");
        assert_eq!(calls, 3);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let policy = RetryPolicy::new(5, Duration::ZERO, 2.0);
        let mut calls = 0;

        let err = policy
            .run(
                |_| -> Result<(), _> {
                    calls += 1;
                    Err("missing")
                },
                |err| *err != "missing",
            )
            .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn no_retry_runs_once() {
        let policy = RetryPolicy::no_retry();
        let err = policy.run(|_| -> Result<(), _> { Err("x") }, |_| true).unwrap_err();
        assert_eq!(err.attempts, 1);
    }

    #[test]
    fn backoff_grows_exponentially() {
        let policy = RetryPolicy::new(4, Duration::from_millis(10), 2.0);
        assert_eq!(policy.backoff(0), Duration::ZERO);
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(40));
    }
}
