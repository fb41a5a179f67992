use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub consecutive_failures: u32,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }
}

#[derive(Debug)]
struct State {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    next_retry_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Per-provider circuit breaker.
///
/// - `Closed` passes calls through and counts consecutive failures
/// - `Open` rejects with `CircuitOpen` until the recovery timeout elapses
/// - `HalfOpen` admits exactly one trial call; its outcome closes or re-opens the circuit
pub struct CircuitBreaker {
    name: String,
    cfg: CircuitBreakerConfig,
    state: Mutex<State>,
}

/// Admission for one guarded call. Report the outcome with [`CallPermit::succeed`] or
/// [`CallPermit::fail`]; dropping it unreported (cancellation) frees a half-open trial slot
/// without counting as a failure.
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CallPermit<'_> {
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.lock().trial_in_flight = false;
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, cfg: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            cfg,
            state: Mutex::new(State {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                next_retry_at: None,
                trial_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // State stays consistent under poisoning: every mutation is a plain field write.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Asks for admission of one call.
    pub fn acquire(&self) -> Result<CallPermit<'_>> {
        let mut st = self.lock();
        let now = Instant::now();
        let trial = match st.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let until = st.next_retry_at.unwrap_or(now);
                if now < until {
                    return Err(Error::circuit_open(&self.name, Some(until - now)));
                }
                st.state = CircuitState::HalfOpen;
                st.trial_in_flight = true;
                info!(provider = %self.name, "circuit breaker half-open, admitting trial call");
                true
            }
            CircuitState::HalfOpen => {
                if st.trial_in_flight {
                    return Err(Error::circuit_open(&self.name, None));
                }
                st.trial_in_flight = true;
                true
            }
        };
        Ok(CallPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    /// Runs `op` under the breaker, recording its outcome. The error is never swallowed.
    pub async fn call<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let permit = self.acquire()?;
        match op().await {
            Ok(v) => {
                permit.succeed();
                Ok(v)
            }
            Err(e) => {
                permit.fail();
                Err(e)
            }
        }
    }

    fn on_success(&self, trial: bool) {
        let mut st = self.lock();
        match st.state {
            CircuitState::Closed => st.consecutive_failures = 0,
            CircuitState::HalfOpen if trial => {
                st.state = CircuitState::Closed;
                st.consecutive_failures = 0;
                st.next_retry_at = None;
                st.trial_in_flight = false;
                info!(provider = %self.name, "circuit breaker closed after successful trial");
            }
            // A call admitted before the circuit opened; it says nothing about recovery.
            _ => {}
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut st = self.lock();
        let now = Instant::now();
        st.consecutive_failures = st.consecutive_failures.saturating_add(1);
        st.last_failure_at = Some(now);
        match st.state {
            CircuitState::Closed => {
                if st.consecutive_failures >= self.cfg.failure_threshold {
                    st.state = CircuitState::Open;
                    st.next_retry_at = Some(now + self.cfg.recovery_timeout());
                    warn!(
                        provider = %self.name,
                        consecutive_failures = st.consecutive_failures,
                        recovery_timeout_ms = self.cfg.recovery_timeout_ms,
                        "circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen if trial => {
                st.state = CircuitState::Open;
                st.next_retry_at = Some(now + self.cfg.recovery_timeout());
                st.trial_in_flight = false;
                warn!(provider = %self.name, "trial call failed, circuit breaker re-opened");
            }
            _ => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = Instant::now();
        let st = self.lock();
        let open_remaining_ms = match (st.state, st.next_retry_at) {
            (CircuitState::Open, Some(until)) if until > now => {
                Some((until - now).as_millis() as u64)
            }
            _ => None,
        };
        CircuitBreakerSnapshot {
            state: st.state,
            failure_threshold: self.cfg.failure_threshold,
            recovery_timeout_ms: self.cfg.recovery_timeout_ms,
            consecutive_failures: st.consecutive_failures,
            open_remaining_ms,
        }
    }

    pub fn last_failure_at(&self) -> Option<Instant> {
        self.lock().last_failure_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn breaker(threshold: u32, timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig::new()
                .with_failure_threshold(threshold)
                .with_recovery_timeout(Duration::from_millis(timeout_ms)),
        )
    }

    async fn fail(cb: &CircuitBreaker) -> Result<()> {
        cb.call(|| async { Err::<(), _>(Error::network("boom")) }).await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<()> {
        cb.call(|| async { Ok(()) }).await
    }

    #[test]
    fn test_circuit_breaker_config_defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.recovery_timeout(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let cb = breaker(5, 1000);
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.snapshot().consecutive_failures, 2);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.snapshot().consecutive_failures, 0);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_without_invoking() {
        let cb = breaker(3, 100);
        for _ in 0..3 {
            let _ = fail(&cb).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let invoked = AtomicU32::new(0);
        let err = cb
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error_code::ErrorKind::CircuitOpen);
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert!(cb.snapshot().open_remaining_ms.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_trial_success_closes() {
        let cb = breaker(2, 100);
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(101)).await;
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_trial_failure_reopens_and_restarts_timeout() {
        let cb = breaker(2, 100);
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;

        tokio::time::advance(Duration::from_millis(101)).await;
        let err = fail(&cb).await.unwrap_err();
        assert_eq!(err.kind(), crate::error_code::ErrorKind::Network);
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(succeed(&cb).await.is_err());

        tokio::time::advance(Duration::from_millis(51)).await;
        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_exactly_one_trial() {
        let cb = breaker(1, 100);
        let _ = fail(&cb).await;
        tokio::time::advance(Duration::from_millis(101)).await;

        let first = cb.acquire().unwrap();
        assert!(first.is_trial());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.acquire().is_err());

        // Cancelled trial frees the slot without reopening.
        drop(first);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        let second = cb.acquire().unwrap();
        second.succeed();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_success_does_not_close_open_circuit() {
        let cb = breaker(1, 100);
        let stale = cb.acquire().unwrap();
        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);
        stale.succeed();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_circuit_breaker_thread_safe() {
        let cb = Arc::new(breaker(1000, 1000));
        let mut handles = vec![];
        for _ in 0..10 {
            let cb = Arc::clone(&cb);
            handles.push(std::thread::spawn(move || {
                for _ in 0..5 {
                    cb.acquire().unwrap().fail();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cb.snapshot().consecutive_failures, 50);
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
