//! Bounded retry for per-item network calls.
//!
//! Every attempt is a full call to the gateway; a failed attempt is followed
//! by a fixed pause unless it was the last one. Errors that cannot succeed on
//! repetition (rejected credentials, missing resources) stop immediately.

use bridge_traits::error::BridgeError;
use core_runtime::config::RetrySettings;
use std::future::Future;
use tracing::warn;

/// Result of a retried call plus how many attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, BridgeError>,
    pub attempts: u32,
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Calls `operation` until it succeeds or `settings.max_attempts` is reached.
///
/// # Arguments
///
/// * `settings` - Attempt bound and pause between attempts
/// * `label` - Item name used in log records
/// * `operation` - Produces a fresh future per attempt
pub async fn retry_with_policy<T, F, Fut>(
    settings: &RetrySettings,
    label: &str,
    mut operation: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BridgeError>>,
{
    let max_attempts = settings.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                warn!(
                    item = label,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Attempt failed; retrying"
                );
                if !settings.delay.is_zero() {
                    core_async::time::sleep(settings.delay).await;
                }
            }
            Err(e) => {
                warn!(item = label, attempt, error = %e, "Giving up");
                return RetryOutcome {
                    result: Err(e),
                    attempts: attempt,
                };
            }
        }
    }
}
