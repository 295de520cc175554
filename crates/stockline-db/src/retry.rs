//! Single retry on lock contention.
//!
//! Only [`DbError::ConcurrencyConflict`] is retried, and only once. Every
//! ledger operation is bounded by its quantity precondition, so re-running a
//! transaction that already committed fails the bound instead of applying
//! twice.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{DbError, DbResult};

/// Pause before the second attempt, long enough for the competing writer to
/// commit.
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Runs `attempt`, and once more if the first run hit lock contention.
pub async fn retry_on_conflict<T, F, Fut>(operation: &str, mut attempt: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    match attempt().await {
        Err(DbError::ConcurrencyConflict(reason)) => {
            warn!(operation, reason = %reason, "Lock contention, retrying once");
            tokio::time::sleep(RETRY_BACKOFF).await;
            attempt().await
        }
        other => other,
    }
}
