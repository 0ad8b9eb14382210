use foreman_core::ForemanResult;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `call` under a time limit, substituting `fallback()` on error or timeout.
///
/// The fallback must be pure; it is the answer of last resort.
pub async fn with_fallback<T, Fut, F>(limit: Duration, call: Fut, fallback: F) -> T
where
    Fut: Future<Output = ForemanResult<T>>,
    F: FnOnce() -> T,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            warn!(error = %e, "Best-effort call failed, using fallback");
            fallback()
        }
        Err(_) => {
            warn!(
                limit_ms = limit.as_millis() as u64,
                "Best-effort call timed out, using fallback"
            );
            fallback()
        }
    }
}
