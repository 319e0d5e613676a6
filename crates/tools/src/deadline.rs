//! Cancellation-aware deadline race.
//!
//! The executor future, a timer and a cancellation token race each other.
//! Whichever loses is dropped on return, so a timed-out tool's future is
//! cancelled at its next await point rather than left running.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a raced future settled.
#[derive(Debug, PartialEq, Eq)]
pub enum Deadline<T> {
    Completed(T),
    TimedOut,
    Cancelled,
}

/// Race `fut` against `timeout` and `cancel`.
///
/// Cancellation is checked first so a shutdown always wins over a result
/// that happens to be ready in the same poll.
pub async fn race<F>(fut: F, timeout: Duration, cancel: &CancellationToken) -> Deadline<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Deadline::Cancelled,
        out = fut => Deadline::Completed(out),
        _ = tokio::time::sleep(timeout) => Deadline::TimedOut,
    }
}
