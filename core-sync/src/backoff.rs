//! Status-check retry with capped exponential backoff.
//!
//! A failed status check is retried up to the policy's attempt limit. The
//! wait after failure `n` is `base * multiplier^(n-1)`, capped at the
//! policy's maximum. Only transient failures are retried; anything else is
//! returned as soon as it is seen.

use crate::{Result, StateSource, SyncError};
use core_runtime::StatusRetryPolicy;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Run `op` until it succeeds, fails permanently, or the attempts run out.
///
/// `on_retry` is called with the failed attempt number, the wait before the
/// next attempt and the error, before the wait starts.
///
/// # Errors
///
/// - [`SyncError::Cancelled`] if `token` fires first
/// - [`SyncError::SourceUnavailable`] once every attempt has failed
/// - the first non-transient error returned by `op`
pub async fn retry_with_backoff<T, F, Fut, R>(
    policy: &StatusRetryPolicy,
    token: &CancellationToken,
    mut on_retry: R,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    R: FnMut(u32, Duration, &SyncError),
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(SyncError::Cancelled),
            result = op() => result,
        };

        let error = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Status check recovered");
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => e,
        };

        if attempt >= policy.max_attempts {
            warn!(attempts = attempt, error = %error, "Status check retries exhausted");
            return Err(SyncError::SourceUnavailable {
                origin: StateSource::Transfer,
                message: format!(
                    "status check failed after {} attempts: {}",
                    attempt,
                    detail(&error)
                ),
            });
        }

        let delay = policy.delay_for(attempt);
        warn!(
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Status check failed, retrying"
        );
        on_retry(attempt, delay, &error);

        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(SyncError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn detail(error: &SyncError) -> String {
    match error {
        SyncError::SourceUnavailable { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
