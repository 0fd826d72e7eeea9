//! Retry logic with exponential backoff, and bounded polling
//!
//! Two waiting strategies live here:
//!
//! - [`with_retry`] re-runs a request that failed transiently, backing off
//!   exponentially with optional jitter.
//! - [`poll_until`] repeatedly checks the status of a remote job at a fixed
//!   interval and gives up after a bounded number of checks.
//!
//! # Example
//!
//! ```no_run
//! use geoedf_connectors::retry::{IsRetryable, with_retry};
//! use geoedf_connectors::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let result = with_retry(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{PollConfig, RetryConfig};
use crate::error::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, refused connections, throttling, server
/// errors) should return `true`. Permanent failures (bad parameters, missing
/// resources, malformed payloads) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            // Throttled or server-side failure
            Error::HttpStatus { status, .. } => *status == 429 || (500..600).contains(status),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. } => false,
            Error::Operation { .. } => false,
            Error::Serialization(_) => false,
            Error::Shapefile { .. } => false,
            Error::Projection(_) => false,
            Error::Xml(_) => false,
            Error::Csv(_) => false,
            Error::Archive { .. } => false,
            Error::PollExhausted { .. } => false,
            Error::InvalidResponse(_) => false,
            Error::InvalidUrl { .. } => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Returns the successful result or the last error after all retry attempts
/// are exhausted. Non-retryable errors are returned immediately.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tokio::time::sleep(jittered_delay).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}

/// Outcome of a single status check in [`poll_until`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    /// The job finished; stop polling
    Ready(T),
    /// Not finished yet; check again after the interval
    Pending,
}

/// Check a remote job at a fixed interval until it is ready
///
/// `check` receives the zero-based attempt number. Errors returned by `check`
/// abort the poll immediately. After `config.max_attempts` pending results the
/// poll fails with [`Error::PollExhausted`].
pub async fn poll_until<F, Fut, T>(config: &PollConfig, what: &str, mut check: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStatus<T>>>,
{
    for attempt in 0..config.max_attempts {
        match check(attempt).await? {
            PollStatus::Ready(value) => {
                tracing::debug!(what, checks = attempt + 1, "job ready");
                return Ok(value);
            }
            PollStatus::Pending => {
                tracing::info!(
                    what,
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts,
                    "job still running"
                );
                if attempt + 1 < config.max_attempts {
                    tokio::time::sleep(config.interval).await;
                }
            }
        }
    }

    Err(Error::PollExhausted {
        what: what.to_string(),
        attempts: config.max_attempts,
    })
}
