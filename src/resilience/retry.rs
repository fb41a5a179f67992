//! Retry handler
//!
//! Repeats a fallible async operation on transient errors with capped exponential backoff.
//! Attempts are strictly sequential: attempt N+1 starts only after attempt N failed and
//! its backoff delay elapsed.

use crate::error_code::ErrorKind;
use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry logic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
    /// Longest server-requested wait (`Retry-After`) honoured. A longer hint ends the
    /// retry loop so the caller can fall back elsewhere.
    pub max_retry_after_ms: u64,
    /// Status codes retried even when their error kind is not retryable on its own.
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
            max_retry_after_ms: 60_000,
            retryable_status_codes: vec![408, 409, 425, 429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_base_delay(mut self, d: Duration) -> Self {
        self.base_delay_ms = d.as_millis() as u64;
        self
    }

    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay_ms = d.as_millis() as u64;
        self
    }

    pub fn with_backoff_multiplier(mut self, m: f64) -> Self {
        self.backoff_multiplier = m;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_retry_after(mut self, d: Duration) -> Self {
        self.max_retry_after_ms = d.as_millis() as u64;
        self
    }

    pub fn with_retryable_status(mut self, status: u16) -> Self {
        if !self.retryable_status_codes.contains(&status) {
            self.retryable_status_codes.push(status);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    NonRetryable,
}

impl RetryClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryClass::Retryable => "retryable",
            RetryClass::NonRetryable => "non_retryable",
        }
    }
}

pub struct RetryHandler {
    config: RetryConfig,
}

impl RetryHandler {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn classify(&self, error: &Error) -> RetryClass {
        match error.kind() {
            ErrorKind::Authentication | ErrorKind::Validation => RetryClass::NonRetryable,
            kind if kind.retryable() => RetryClass::Retryable,
            _ => match error.status_code() {
                Some(s) if self.config.retryable_status_codes.contains(&s) => {
                    RetryClass::Retryable
                }
                _ => RetryClass::NonRetryable,
            },
        }
    }

    /// Backoff before retry number `attempt + 1`, without jitter.
    ///
    /// `min(base * multiplier^attempt, max)`; a multiplier below 1 is treated as 1 so the
    /// sequence never shrinks.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = self.config.backoff_multiplier.max(1.0);
        let cap = self.config.max_delay_ms as f64;
        let raw = self.config.base_delay_ms as f64 * multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        Duration::from_millis(raw.min(cap) as u64)
    }

    /// `None` when the server asked for a wait longer than `max_retry_after_ms`.
    fn delay_for(&self, attempt: u32, error: &Error) -> Option<Duration> {
        if let Some(hint) = error.retry_after() {
            let ceiling = Duration::from_millis(self.config.max_retry_after_ms);
            return (hint <= ceiling).then_some(hint);
        }
        let base = self.backoff(attempt);
        if self.config.jitter {
            let factor: f64 = rand::thread_rng().gen_range(0.5..=1.0);
            Some(base.mul_f64(factor))
        } else {
            Some(base)
        }
    }

    /// Runs `operation` until it succeeds, fails non-retryably, or retries are exhausted.
    ///
    /// The closure receives the 0-based attempt number. The surfaced error records how many
    /// attempts were made and, on exhaustion, its classification.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let err = match operation(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };
            let attempts = attempt + 1;
            let class = self.classify(&err);

            if class == RetryClass::NonRetryable {
                debug!(
                    operation = label,
                    attempts,
                    error_kind = err.kind().name(),
                    "non-retryable failure, aborting"
                );
                return Err(err.map_context(|c| c.with_attempts(attempts)));
            }

            if attempt >= self.config.max_retries {
                warn!(
                    operation = label,
                    attempts,
                    error_kind = err.kind().name(),
                    "retries exhausted"
                );
                let tag = format!("classification: {}, retries exhausted", class.as_str());
                return Err(err.map_context(|mut c| {
                    c.details = Some(match c.details.take() {
                        Some(d) => format!("{}; {}", d, tag),
                        None => tag,
                    });
                    c.with_attempts(attempts)
                }));
            }

            let Some(delay) = self.delay_for(attempt, &err) else {
                warn!(
                    operation = label,
                    attempts,
                    retry_after_ms = err.retry_after().map(|d| d.as_millis() as u64),
                    ceiling_ms = self.config.max_retry_after_ms,
                    "retry-after hint exceeds ceiling, giving up"
                );
                return Err(err.map_context(|c| c.with_attempts(attempts)));
            };
            debug!(
                operation = label,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error_kind = err.kind().name(),
                "retrying after transient failure"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
