//! Retry with exponential backoff for transient remote failures.
//!
//! Only errors for which [`AppError::is_transient`] holds are retried:
//! transport failures and HTTP 429. Everything else is returned on the
//! first attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Executes `operation`, retrying transient errors up to `max_retries` times.
///
/// The sleep before retry `n` (zero-based) is `backoff_base_secs * 2^n`
/// seconds, except after a rate-limit response, where the server's own
/// `retry_after_secs` is honored instead.
///
/// With `max_retries = 3` the operation is attempted at most 4 times total.
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_transient() || attempt >= max_retries {
            return Err(err);
        }

        let delay_secs = match &err {
            AppError::RateLimited {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => backoff_base_secs.saturating_mul(1u64 << attempt.min(62)),
        };
        log::warn!(
            "Transient error (attempt {}/{}), retrying in {}s: {}",
            attempt + 1,
            max_retries + 1,
            delay_secs,
            err
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        attempt += 1;
    }
}
