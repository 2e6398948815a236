//! Retry controller.
//!
//! # Responsibilities
//! - Attempt the executor call up to the service's retry budget
//! - Sleep a linearly growing backoff between attempts
//! - Stop early when the caller's deadline expires
//!
//! # Design Decisions
//! - Only transport failures retry; a received HTTP response is
//!   terminal, whatever its status code. Retrying a backend 4xx/5xx
//!   would mask real errors, not transient blips.
//! - Attempts run strictly sequentially; no speculative parallelism.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::resilience::backoff::retry_delay;
use crate::upstream::{FailureReason, ProxyResponse, UpstreamError};

/// Backoff configuration shared by all services.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Backoff step: attempt i waits i × step before retrying.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_step: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Run `attempt` up to `max_retries` times against the same logical
    /// request, sleeping `n × backoff_step` before retry `n`.
    ///
    /// Deadline expiry before an attempt or during a backoff sleep
    /// yields `Cancelled`, never `Exhausted`, so callers can tell
    /// "gateway gave up waiting" from "transport kept failing".
    pub async fn run<F, Fut>(
        &self,
        max_retries: u32,
        deadline: Instant,
        mut attempt: F,
    ) -> Result<ProxyResponse, UpstreamError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<ProxyResponse, FailureReason>>,
    {
        let mut last = FailureReason::Connect;

        for n in 0..max_retries {
            if Instant::now() >= deadline {
                return Err(UpstreamError::Cancelled);
            }

            match attempt(n).await {
                Ok(response) => return Ok(response),
                Err(FailureReason::Cancelled) => return Err(UpstreamError::Cancelled),
                Err(reason) => {
                    last = reason;
                    tracing::warn!(
                        attempt = n + 1,
                        max_retries,
                        reason = %reason,
                        "upstream attempt failed"
                    );
                }
            }

            if n + 1 < max_retries {
                let wake = Instant::now() + retry_delay(n + 1, self.backoff_step.as_millis() as u64);
                if wake >= deadline {
                    // Sleeping out the backoff would overshoot the
                    // caller's deadline.
                    tokio::time::sleep_until(deadline).await;
                    return Err(UpstreamError::Cancelled);
                }
                tokio::time::sleep_until(wake).await;
            }
        }

        Err(UpstreamError::Exhausted {
            attempts: max_retries,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, StatusCode};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn response() -> ProxyResponse {
        ProxyResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"ok"),
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();

        let started = Instant::now();
        let result = policy
            .run(3, far_deadline(), move |_| {
                let seen = seen.clone();
                async move {
                    if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(FailureReason::Connect)
                    } else {
                        Ok(response())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two backoffs: 100ms then 200ms.
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_retries() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();

        let started = Instant::now();
        let result = policy
            .run(2, far_deadline(), move |_| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err(FailureReason::Connect)
                }
            })
            .await;

        assert_eq!(
            result.unwrap_err(),
            UpstreamError::Exhausted {
                attempts: 2,
                last: FailureReason::Connect,
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // Exactly one backoff of 100ms between the two attempts.
        assert_eq!(started.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_failures_also_retry() {
        let policy = RetryPolicy::default();
        let result = policy
            .run(2, far_deadline(), |_| async { Err(FailureReason::Timeout) })
            .await;
        assert_eq!(
            result.unwrap_err(),
            UpstreamError::Exhausted {
                attempts: 2,
                last: FailureReason::Timeout,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_attempt_stops_retrying() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();

        let result = policy
            .run(5, far_deadline(), move |_| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err(FailureReason::Cancelled)
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), UpstreamError::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_backoff_cancels() {
        let policy = RetryPolicy::default();
        // Deadline expires 50ms in; the first 100ms backoff overshoots it.
        let deadline = Instant::now() + Duration::from_millis(50);

        let result = policy
            .run(3, deadline, |_| async { Err(FailureReason::Connect) })
            .await;
        assert_eq!(result.unwrap_err(), UpstreamError::Cancelled);
        assert!(Instant::now() >= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_skips_all_attempts() {
        let policy = RetryPolicy::default();
        let deadline = Instant::now();
        tokio::time::advance(Duration::from_millis(1)).await;

        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let result = policy
            .run(3, deadline, move |_| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(response())
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), UpstreamError::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
