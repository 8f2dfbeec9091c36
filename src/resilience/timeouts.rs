//! Timeout enforcement.
//!
//! The caller owns the deadline: when it passes, the inner future is dropped
//! and whatever the driver was doing is abandoned. Nothing waits past the
//! limit for a driver that ignores its own timeouts.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The bounded operation did not finish in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation exceeded its {0:?} deadline")]
pub struct DeadlineExceeded(pub Duration);

/// Run `fut` for at most `limit`.
pub async fn bounded<F>(limit: Duration, fut: F) -> Result<F::Output, DeadlineExceeded>
where
    F: Future,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| DeadlineExceeded(limit))
}
