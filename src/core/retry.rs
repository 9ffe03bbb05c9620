//! Retry utility for handling transient errors in async operations
//!
//! Provides a fixed-delay retry policy. Errors the caller classifies as
//! permanent end the loop on the spot.

use std::time::Duration;
use tokio::time::sleep;

/// Configurable retry policy for async operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Execute an async operation with retry logic for transient errors
///
/// Every failure is considered transient.
///
/// # Examples
/// ```rust
/// use eventpipe::core::retry::{retry_async, RetryPolicy};
///
/// # async fn example() -> Result<String, String> {
/// let result = retry_async(
///     "broker_connection",
///     RetryPolicy::default(),
///     || async {
///         Ok::<String, String>("connected".to_string())
///     }
/// ).await?;
/// # Ok(result)
/// # }
/// ```
pub async fn retry_async<F, T, E, Fut>(
    operation_name: &str,
    policy: RetryPolicy,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_async_when(operation_name, policy, |_| true, operation).await
}

/// Execute an async operation, retrying only errors accepted by `should_retry`
///
/// An error rejected by `should_retry` is returned immediately without
/// sleeping. After `policy.max_attempts` failed attempts the last error is
/// returned. A policy with zero attempts still runs the operation once.
pub async fn retry_async_when<F, T, E, Fut, P>(
    operation_name: &str,
    policy: RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) if !should_retry(&error) => {
                log::debug!(
                    "Operation '{}' failed on attempt {}/{} with a permanent error: {}",
                    operation_name,
                    attempt,
                    max_attempts,
                    error
                );
                return Err(error);
            }
            Err(error) if attempt >= max_attempts => return Err(error),
            Err(error) => {
                log::debug!(
                    "Operation '{}' failed on attempt {}/{}, retrying in {:?}: {}",
                    operation_name,
                    attempt,
                    max_attempts,
                    policy.delay,
                    error
                );
                sleep(policy.delay).await;
            }
        }
    }
}
