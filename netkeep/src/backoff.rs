//! Bounded retry with a fixed delay between attempts.

use futures::{FutureExt, Stream, StreamExt};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::sleep;

/// Helper trait alias for backoff streams.
/// We define any stream that yields `Duration`s as a backoff
pub trait Backoff: Stream<Item = Duration> + Unpin {}

// Blanket implementation of `Backoff` for any stream that yields `Duration`s.
impl<T> Backoff for T where T: Stream<Item = Duration> + Unpin {}

/// A stream that yields the same delay after each elapsed timeout, at most `max_retries`
/// times.
#[derive(Debug)]
pub struct FixedBackoff {
    /// Current number of retries.
    retry_count: usize,
    /// Maximum number of retries before closing the stream.
    max_retries: usize,
    /// The delay between attempts.
    delay: Duration,
    /// The current timeout, if any.
    /// We need the timeout to be pinned (`Sleep` is not `Unpin`)
    timeout: Option<Pin<Box<tokio::time::Sleep>>>,
}

impl FixedBackoff {
    /// Creates a backoff that waits `delay` before each of `max_retries` retries.
    pub fn new(delay: Duration, max_retries: usize) -> Self {
        Self { retry_count: 0, max_retries, delay, timeout: None }
    }

    /// Creates a backoff allowing `attempts` attempts in total, i.e. `attempts - 1` waits.
    /// Zero behaves like one: [`retry`] always makes the first attempt.
    pub fn attempts(delay: Duration, attempts: usize) -> Self {
        Self::new(delay, attempts.saturating_sub(1))
    }

    /// (Re)-set the timeout to the configured delay.
    fn reset_timeout(&mut self) {
        self.timeout = Some(Box::pin(sleep(self.delay)));
    }
}

impl Stream for FixedBackoff {
    type Item = Duration;

    /// Returns `Poll::Ready` with the delay once the current timeout has elapsed, and
    /// `Poll::Ready(None)` once every retry has been handed out.
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.retry_count >= this.max_retries {
            return Poll::Ready(None);
        }

        loop {
            let Some(ref mut timeout) = this.timeout else {
                // Set the initial timeout
                this.reset_timeout();
                continue;
            };

            if timeout.poll_unpin(cx).is_ready() {
                this.retry_count += 1;
                this.timeout = None;
                return Poll::Ready(Some(this.delay));
            }

            return Poll::Pending;
        }
    }
}

/// Runs `attempt` until it yields a value, waiting on `backoff` between attempts.
///
/// The closure receives the 1-based attempt number. Returns `None` once the backoff stream
/// is exhausted without a successful attempt.
pub async fn retry<B, F, Fut, T>(mut backoff: B, mut attempt: F) -> Option<T>
where
    B: Backoff,
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let mut n = 1;
    loop {
        if let Some(value) = attempt(n).await {
            return Some(value);
        }

        backoff.next().await?;
        n += 1;
    }
}
