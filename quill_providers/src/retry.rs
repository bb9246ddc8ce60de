use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use quill_core::{Error, Result};

/// Retry an async operation with exponential backoff.
///
/// Overload errors are returned immediately: the conversation core
/// reacts to those by offering a model fallback, and hammering the same
/// model with retries would only extend the quota window.
///
/// # Arguments
/// * `operation` - The async operation to retry
/// * `base_delays` - Initial delays in seconds for exponential backoff
/// * `final_retries` - Number of additional retries at max delay
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    base_delays: &[u64],
    final_retries: usize,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let total = base_delays.len() + final_retries;
    let mut last_error = None;

    // Initial attempt plus exponential backoff retries
    for (i, delay_secs) in base_delays.iter().enumerate() {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_overloaded() => return Err(e),
            Err(e) => {
                let attempt = i + 1;
                if attempt < total {
                    warn!(
                        "Request failed (attempt {attempt}/{total}): {e}. Retrying after {delay_secs}s..."
                    );
                    sleep(Duration::from_secs(*delay_secs)).await;
                }
                last_error = Some(e);
            }
        }
    }

    // Final retries at 10 second intervals
    for i in 0..final_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_overloaded() => return Err(e),
            Err(e) => {
                let attempt = base_delays.len() + i + 1;
                if i < final_retries - 1 {
                    warn!("Request failed (attempt {attempt}/{total}): {e}. Retrying after 10s...");
                    sleep(Duration::from_secs(10)).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| Error::provider("all retry attempts exhausted", None)))
}
