//! 错误分类：定义编排层的错误种类及其重试/回退语义。
//!
//! Error kinds for the orchestration runtime.
//!
//! Every [`crate::Error`] maps onto exactly one [`ErrorKind`]. The kind carries the
//! retry and fallback semantics used by the retry handler and the orchestrator, so both
//! layers classify failures the same way.
//!
//! ## Error Code Categories
//!
//! | Prefix | Category      | Description                              |
//! |--------|---------------|------------------------------------------|
//! | E1xxx  | client        | Request or credential problems           |
//! | E2xxx  | rate          | Rate limit errors                        |
//! | E3xxx  | server        | Provider-side or network failures        |
//! | E4xxx  | resilience    | Local safety valves (circuit breaker)    |
//! | E5xxx  | orchestration | Selection and fallback exhaustion        |
//! | E6xxx  | local         | Configuration and serialization          |
//! | E9xxx  | unknown       | Catch-all                                |
//!
//! ## Example
//!
//! ```rust
//! use ai_lib_orchestrator::error_code::ErrorKind;
//!
//! let kind = ErrorKind::from_http_status(429);
//! assert_eq!(kind.code(), "E2001");
//! assert!(kind.retryable());
//! assert!(kind.fallbackable());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// E1001: Malformed request or parameters rejected by the provider
    Validation,
    /// E1002: Invalid, expired, or missing credential
    Authentication,
    /// E2001: Provider rate limit exceeded
    RateLimited,
    /// E3001: Provider returned a 5xx response
    ServerError,
    /// E3002: Connection-level failure
    Network,
    /// E3003: Call exceeded its deadline
    Timeout,
    /// E4001: Local circuit breaker rejected the call
    CircuitOpen,
    /// E5001: No provider satisfied the request's constraints
    NoSuitableProvider,
    /// E5002: Primary and every fallback failed
    AllProvidersFailed,
    /// E6001: Local configuration problem (unknown provider, bad config file)
    Configuration,
    /// E6002: Payload could not be encoded or decoded
    Serialization,
    /// E9999: Unclassified provider error
    Unknown,
}

impl ErrorKind {
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation => "E1001",
            Self::Authentication => "E1002",
            Self::RateLimited => "E2001",
            Self::ServerError => "E3001",
            Self::Network => "E3002",
            Self::Timeout => "E3003",
            Self::CircuitOpen => "E4001",
            Self::NoSuitableProvider => "E5001",
            Self::AllProvidersFailed => "E5002",
            Self::Configuration => "E6001",
            Self::Serialization => "E6002",
            Self::Unknown => "E9999",
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authentication => "authentication",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::CircuitOpen => "circuit_open",
            Self::NoSuitableProvider => "no_suitable_provider",
            Self::AllProvidersFailed => "all_providers_failed",
            Self::Configuration => "configuration",
            Self::Serialization => "serialization",
            Self::Unknown => "unknown",
        }
    }

    /// Transient failures worth repeating against the same provider.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::Network | Self::Timeout
        )
    }

    /// Failures another provider may not share.
    ///
    /// Mirrors the retryable set, plus an open breaker: the provider is known bad right now
    /// but the request itself is fine. Authentication and validation stop the chain.
    #[inline]
    pub fn fallbackable(&self) -> bool {
        self.retryable() || matches!(self, Self::CircuitOpen)
    }

    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation | Self::Authentication => "client",
            Self::RateLimited => "rate",
            Self::ServerError | Self::Network | Self::Timeout => "server",
            Self::CircuitOpen => "resilience",
            Self::NoSuitableProvider | Self::AllProvidersFailed => "orchestration",
            Self::Configuration | Self::Serialization => "local",
            Self::Unknown => "unknown",
        }
    }

    /// Maps an HTTP-like status code reported by a transport.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 404 | 413 | 422 => Self::Validation,
            401 | 403 => Self::Authentication,
            408 | 504 => Self::Timeout,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::from_http_status(401), ErrorKind::Authentication);
        assert_eq!(ErrorKind::from_http_status(403), ErrorKind::Authentication);
        assert_eq!(ErrorKind::from_http_status(400), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_http_status(429), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::from_http_status(502), ErrorKind::ServerError);
        assert_eq!(ErrorKind::from_http_status(504), ErrorKind::Timeout);
        assert_eq!(ErrorKind::from_http_status(302), ErrorKind::Unknown);
    }

    #[test]
    fn test_retry_and_fallback_sets() {
        for kind in [
            ErrorKind::RateLimited,
            ErrorKind::ServerError,
            ErrorKind::Network,
            ErrorKind::Timeout,
        ] {
            assert!(kind.retryable(), "{:?} should be retryable", kind);
            assert!(kind.fallbackable(), "{:?} should be fallbackable", kind);
        }
        for kind in [ErrorKind::Authentication, ErrorKind::Validation] {
            assert!(!kind.retryable());
            assert!(!kind.fallbackable());
        }
        assert!(!ErrorKind::CircuitOpen.retryable());
        assert!(ErrorKind::CircuitOpen.fallbackable());
        assert!(!ErrorKind::AllProvidersFailed.fallbackable());
    }

    #[test]
    fn test_codes_are_unique() {
        let all = [
            ErrorKind::Validation,
            ErrorKind::Authentication,
            ErrorKind::RateLimited,
            ErrorKind::ServerError,
            ErrorKind::Network,
            ErrorKind::Timeout,
            ErrorKind::CircuitOpen,
            ErrorKind::NoSuitableProvider,
            ErrorKind::AllProvidersFailed,
            ErrorKind::Configuration,
            ErrorKind::Serialization,
            ErrorKind::Unknown,
        ];
        let codes: std::collections::HashSet<_> = all.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), all.len());
    }
}
