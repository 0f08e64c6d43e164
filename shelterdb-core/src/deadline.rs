//! Caller deadlines for store operations.
//!
//! Dropping a future cancels the store call it wraps; [`with_deadline`] does exactly that once
//! the deadline elapses and reports [`StoreError::DeadlineExceeded`].

use std::{future::Future, time::Duration};

use tracing::warn;

use crate::error::{StoreError, StoreResult};

/// Runs `operation`, abandoning it if it has not completed within `deadline`.
pub async fn with_deadline<T, F>(deadline: Duration, operation: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?deadline, "store operation exceeded its deadline");
            Err(StoreError::DeadlineExceeded(deadline))
        }
    }
}

/// Like [`with_deadline`], but runs unbounded when no deadline is configured.
pub async fn with_optional_deadline<T, F>(deadline: Option<Duration>, operation: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match deadline {
        Some(deadline) => with_deadline(deadline, operation).await,
        None => operation.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_operations_time_out() {
        let result = with_deadline(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(1)
        })
        .await;

        assert!(matches!(result, Err(StoreError::DeadlineExceeded(d)) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn fast_operations_pass_through() {
        let result = with_optional_deadline(Some(Duration::from_secs(1)), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result.unwrap(), 7);

        let result = with_optional_deadline(None, async { Ok::<_, StoreError>(8) }).await;
        assert_eq!(result.unwrap(), 8);
    }
}
