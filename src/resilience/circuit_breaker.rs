//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, outcomes are counted in a rolling window
//! - Open: upstream assumed down, calls fail fast without touching it
//! - Half-Open: a bounded number of probe calls test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: window has >= min_requests samples and the failure
//!                ratio reaches failure_ratio
//! Open → Half-Open: after the cool-down elapses
//! Half-Open → Closed: a probe call succeeds
//! Half-Open → Open: a probe call fails
//! ```
//!
//! The breaker is generic over any fallible async operation; it knows
//! nothing about HTTP. One instance guards one upstream, under its own
//! lock, so a tripped service never blocks calls to any other.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        f.write_str(s)
    }
}

/// Tunables for one breaker instance.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Length of the rolling counting window while Closed.
    pub counting_interval: Duration,

    /// How long an Open breaker waits before allowing probes.
    pub cooldown: Duration,

    /// Minimum samples in the window before a trip decision is made.
    pub min_requests: u32,

    /// Failure ratio at or above which the breaker trips.
    pub failure_ratio: f64,

    /// Maximum concurrent probe calls while Half-Open.
    pub max_probes: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            counting_interval: Duration::from_secs(1),
            cooldown: Duration::from_secs(5),
            min_requests: 3,
            failure_ratio: 0.6,
            max_probes: 10,
        }
    }
}

/// Classifies operation errors for breaker accounting.
///
/// Errors that reflect caller abandonment rather than upstream health
/// return `false` and are removed from the window instead of being
/// recorded as either outcome.
pub trait ErrorClass {
    fn counts_as_failure(&self) -> bool {
        true
    }
}

/// Result of a protected call.
#[derive(Debug, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The breaker refused the call: it is Open, or Half-Open with all
    /// probe slots taken.
    Open,

    /// The protected call ran and failed.
    Inner(E),
}

#[derive(Debug, Default, Clone, Copy)]
struct Window {
    requests: u32,
    failures: u32,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    /// Bumped on every transition and window reset; outcomes from an
    /// older generation are discarded.
    generation: u64,
    window: Window,
    /// Closed: when the counting window resets. Open: when probes are
    /// allowed. Half-Open: unused.
    expiry: Option<Instant>,
}

enum Tally {
    Success,
    Failure,
    Ignore,
}

/// Per-upstream circuit breaker.
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        let now = Instant::now();
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                generation: 0,
                window: Window::default(),
                expiry: Some(now + settings.counting_interval),
            }),
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, after applying any due time-based transition.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    /// Run `call` under the breaker.
    ///
    /// Returns `BreakerError::Open` without invoking `call` when the
    /// breaker refuses it; otherwise the outcome is recorded against
    /// the window and the state transition check runs before the
    /// result is handed back.
    pub async fn execute<T, E, F, Fut>(&self, call: F) -> Result<T, BreakerError<E>>
    where
        E: ErrorClass,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let generation = self.admit().ok_or(BreakerError::Open)?;

        // If the caller drops us mid-call the slot stays claimed until
        // the next generation; no outcome is ever recorded for it.
        let result = call().await;

        let tally = match &result {
            Ok(_) => Tally::Success,
            Err(e) if e.counts_as_failure() => Tally::Failure,
            Err(_) => Tally::Ignore,
        };
        self.settle(generation, tally);

        result.map_err(BreakerError::Inner)
    }

    /// Claim a slot for one call, returning the generation it belongs to.
    fn admit(&self) -> Option<u64> {
        let mut inner = self.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);

        match inner.state {
            CircuitState::Open => None,
            CircuitState::HalfOpen if inner.window.requests >= self.settings.max_probes => None,
            _ => {
                inner.window.requests += 1;
                Some(inner.generation)
            }
        }
    }

    /// Record the outcome of a call admitted under `generation`.
    fn settle(&self, generation: u64, tally: Tally) {
        let mut inner = self.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);

        if inner.generation != generation {
            // Outcome from a window that has since been reset.
            return;
        }

        match tally {
            Tally::Ignore => {
                inner.window.requests = inner.window.requests.saturating_sub(1);
            }
            Tally::Success => {
                if inner.state == CircuitState::HalfOpen {
                    self.transition(&mut inner, CircuitState::Closed, now);
                }
            }
            Tally::Failure => match inner.state {
                CircuitState::Closed => {
                    inner.window.failures += 1;
                    if self.should_trip(&inner.window) {
                        self.transition(&mut inner, CircuitState::Open, now);
                    }
                }
                CircuitState::HalfOpen => {
                    self.transition(&mut inner, CircuitState::Open, now);
                }
                CircuitState::Open => {}
            },
        }
    }

    fn should_trip(&self, window: &Window) -> bool {
        window.requests >= self.settings.min_requests
            && f64::from(window.failures) / f64::from(window.requests)
                >= self.settings.failure_ratio
    }

    /// Apply time-based transitions: window reset while Closed, and
    /// Open → Half-Open once the cool-down elapses.
    fn refresh(&self, inner: &mut Inner, now: Instant) {
        let due = matches!(inner.expiry, Some(expiry) if now >= expiry);
        if !due {
            return;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.generation += 1;
                inner.window = Window::default();
                inner.expiry = Some(now + self.settings.counting_interval);
            }
            CircuitState::Open => {
                self.transition(inner, CircuitState::HalfOpen, now);
            }
            CircuitState::HalfOpen => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState, now: Instant) {
        if inner.state == to {
            return;
        }
        tracing::info!(
            breaker = %self.name,
            from = %inner.state,
            to = %to,
            "circuit breaker state change"
        );
        inner.state = to;
        inner.generation += 1;
        inner.window = Window::default();
        inner.expiry = match to {
            CircuitState::Closed => Some(now + self.settings.counting_interval),
            CircuitState::Open => Some(now + self.settings.cooldown),
            CircuitState::HalfOpen => None,
        };
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock only poisons this breaker's
        // own counters; recover rather than wedging the service.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.lock().state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    enum StubError {
        Backend,
        CallerGaveUp,
    }

    impl ErrorClass for StubError {
        fn counts_as_failure(&self) -> bool {
            !matches!(self, StubError::CallerGaveUp)
        }
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("test", BreakerSettings::default())
    }

    async fn fail(cb: &CircuitBreaker) {
        let _ = cb
            .execute::<(), _, _, _>(|| async { Err(StubError::Backend) })
            .await;
    }

    async fn succeed(cb: &CircuitBreaker) {
        let _ = cb
            .execute::<_, StubError, _, _>(|| async { Ok(()) })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn trips_at_failure_ratio() {
        let cb = breaker();
        succeed(&cb).await;
        fail(&cb).await;
        fail(&cb).await;
        // 2 failures out of 3 requests: ratio 0.667 >= 0.6
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn stays_closed_below_ratio() {
        let cb = breaker();
        succeed(&cb).await;
        succeed(&cb).await;
        fail(&cb).await;
        // 1 failure out of 3 requests: ratio 0.333
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn needs_minimum_samples_to_trip() {
        let cb = breaker();
        fail(&cb).await;
        fail(&cb).await;
        // 100% failures but only 2 samples
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn open_rejects_without_invoking_call() {
        let cb = breaker();
        for _ in 0..3 {
            fail(&cb).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let invoked = Arc::new(AtomicU32::new(0));
        let seen = invoked.clone();
        let result = cb
            .execute::<(), StubError, _, _>(|| async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert_eq!(result, Err(BreakerError::Open));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_only_after_cooldown() {
        let cb = breaker();
        for _ in 0..3 {
            fail(&cb).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(4_900)).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_success_closes() {
        let cb = breaker();
        for _ in 0..3 {
            fail(&cb).await;
        }
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        succeed(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_reopens() {
        let cb = breaker();
        for _ in 0..3 {
            fail(&cb).await;
        }
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_interval() {
        let cb = breaker();
        fail(&cb).await;
        fail(&cb).await;

        tokio::time::advance(Duration::from_millis(1_001)).await;

        // Old samples are gone; one more failure is 1/1 in a fresh
        // window, under the minimum sample count.
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn caller_abandonment_is_not_a_failure() {
        let cb = breaker();
        for _ in 0..5 {
            let _ = cb
                .execute::<(), _, _, _>(|| async { Err(StubError::CallerGaveUp) })
                .await;
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_bounds_concurrent_probes() {
        let settings = BreakerSettings {
            max_probes: 1,
            ..BreakerSettings::default()
        };
        let cb = Arc::new(CircuitBreaker::new("probe-test", settings));
        for _ in 0..3 {
            fail(&cb).await;
        }
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let probe_cb = cb.clone();
        let probe = tokio::spawn(async move {
            probe_cb
                .execute::<(), StubError, _, _>(|| async move {
                    let _ = rx.await;
                    Ok(())
                })
                .await
        });
        tokio::task::yield_now().await;

        // The single probe slot is taken; further calls are refused.
        let result = cb
            .execute::<(), StubError, _, _>(|| async { Ok(()) })
            .await;
        assert_eq!(result, Err(BreakerError::Open));

        let _ = tx.send(());
        probe.await.unwrap().unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
