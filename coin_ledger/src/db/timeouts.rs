//! Storage timeout helpers
//!
//! Bounds every ledger unit of work so a stalled database surfaces as a
//! retryable storage error instead of an indefinite hang.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::ledger::{LedgerError, LedgerResult};

/// Default timeout for one repository call, read or write (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Execute a ledger operation with timeout
///
/// Dropping the inner future on expiry also drops any open database
/// transaction, which rolls it back.
///
/// # Arguments
///
/// * `duration` - Timeout duration
/// * `future` - Async operation to execute
///
/// # Returns
///
/// * `LedgerResult<T>` - Operation result or `LedgerError::Timeout`
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!("Ledger storage operation timed out after {duration:?}");
            Err(LedgerError::Timeout(duration))
        }
    }
}
