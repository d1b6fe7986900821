//! Retry policy for transient HTTP failures.
//!
//! Only failures carrying a whitelisted status code are retried. Everything
//! else is logged and the caller receives its default value; callers treat
//! that default as "could not complete, carry on without it".

use crate::error::SessionError;
use iapd_core::RetryConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Errors that may carry an HTTP status code.
pub trait Retryable {
    /// Status code of the failed response, if the failure had one.
    fn status_code(&self) -> Option<u16>;
}

impl Retryable for SessionError {
    fn status_code(&self) -> Option<u16> {
        SessionError::status_code(self)
    }
}

/// Retry parameters: `{max_retries, delay, back_off, retry_codes}`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
    back_off: f64,
    retry_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Create a policy from explicit parameters.
    #[must_use]
    pub fn new(max_retries: u32, delay: Duration, back_off: f64, retry_codes: Vec<u16>) -> Self {
        Self {
            max_retries,
            delay,
            back_off,
            retry_codes,
        }
    }

    /// Create a policy from the retry section of the configuration.
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.delay(),
            config.back_off,
            config.retry_codes.clone(),
        )
    }

    /// Whether a status code is worth another attempt.
    #[must_use]
    pub fn is_retry_code(&self, status: u16) -> bool {
        self.retry_codes.contains(&status)
    }

    /// Fresh backoff state for one logical operation.
    #[must_use]
    pub fn backoff(&self) -> Backoff<'_> {
        Backoff {
            policy: self,
            failures: 0,
            next_delay: self.delay,
        }
    }

    /// Run `operation` until it succeeds, a non-retryable failure occurs, or
    /// retries are exhausted. Failures are logged and yield `default_value`.
    pub async fn run<T, E, F, Fut>(&self, default_value: T, mut operation: F) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut backoff = self.backoff();
        loop {
            match operation().await {
                Ok(value) => return value,
                Err(error) => match backoff.on_failure(&error) {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => return default_value,
                },
            }
        }
    }
}

/// Per-operation retry state.
///
/// For loops that cannot hand the policy a re-callable closure, e.g. because
/// each attempt needs `&mut` access to a session:
///
/// ```rust,ignore
/// let mut backoff = policy.backoff();
/// let page = loop {
///     match driver.advance().await {
///         Ok(page) => break Some(page),
///         Err(e) => match backoff.on_failure(&e) {
///             Some(delay) => tokio::time::sleep(delay).await,
///             None => break None,
///         },
///     }
/// };
/// ```
#[derive(Debug)]
pub struct Backoff<'a> {
    policy: &'a RetryPolicy,
    failures: u32,
    next_delay: Duration,
}

impl Backoff<'_> {
    /// Record a failed attempt.
    ///
    /// Returns the delay to wait before the next attempt, or `None` when the
    /// operation should give up. Giving up is logged here.
    pub fn on_failure<E: Retryable + Display>(&mut self, error: &E) -> Option<Duration> {
        self.failures += 1;
        if self.failures > self.policy.max_retries {
            tracing::warn!(
                attempts = self.failures,
                error = %error,
                "Max retries exceeded"
            );
            return None;
        }

        match error.status_code() {
            Some(status) if self.policy.is_retry_code(status) => {
                let delay = self.next_delay;
                tracing::debug!(status, "Error: {}, retrying in {:?}", error, delay);
                self.next_delay =
                    Duration::try_from_secs_f64(delay.as_secs_f64() * self.policy.back_off)
                        .unwrap_or(Duration::MAX);
                Some(delay)
            }
            Some(status) => {
                tracing::error!(status, error = %error, "Request failed, not retrying");
                None
            }
            None => {
                tracing::error!(error = %error, "Operation failed, not retrying");
                None
            }
        }
    }

    /// Failed attempts recorded so far.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
