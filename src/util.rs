//! Shared utility functions.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

/// Await `fut`, giving up after `limit` when one is set.
///
/// Returns `Err(limit)` when the bound elapses first.
pub async fn bounded<F, T>(limit: Option<Duration>, fut: F) -> std::result::Result<T, Duration>
where
    F: Future<Output = T>,
{
    match limit {
        Some(duration) => timeout(duration, fut).await.map_err(|_| duration),
        None => Ok(fut.await),
    }
}
