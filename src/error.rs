use crate::error_code::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Structured error context attached to every error the runtime surfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Provider responsible for the failure, if any (e.g. "openai").
    pub provider: Option<String>,
    /// Model that was being called.
    pub model: Option<String>,
    /// Correlation id of the orchestrated request.
    pub request_id: Option<String>,
    /// HTTP-like status code reported by the transport.
    pub status_code: Option<u16>,
    /// Number of attempts made before the error was surfaced.
    pub attempts: Option<u32>,
    /// Source of the error (e.g. "retry_handler", "strategy_engine").
    pub source: Option<String>,
    /// Additional free-form details.
    pub details: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Unified error type for the orchestration runtime.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication failed: {message}{}", format_context(.context))]
    AuthenticationFailed {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Rate limit exceeded: {message}{}", format_context(.context))]
    RateLimitExceeded {
        message: String,
        retry_after: Option<Duration>,
        context: ErrorContext,
    },

    #[error("Provider server error: {message}{}", format_context(.context))]
    Server {
        message: String,
        context: ErrorContext,
    },

    #[error("Network error: {message}{}", format_context(.context))]
    Network {
        message: String,
        context: ErrorContext,
    },

    #[error("Timed out after {}ms{}", .after.as_millis(), format_context(.context))]
    Timeout {
        after: Duration,
        context: ErrorContext,
    },

    #[error("Circuit open: {message}{}", format_context(.context))]
    CircuitOpen {
        message: String,
        retry_in: Option<Duration>,
        context: ErrorContext,
    },

    #[error("No suitable provider: {message}{}", format_context(.context))]
    NoSuitableProvider {
        message: String,
        context: ErrorContext,
    },

    #[error(
        "All providers failed (primary: {primary}, fallbacks attempted: [{}]){}",
        .attempted.join(", "),
        format_context(.context)
    )]
    AllProvidersFailed {
        primary: String,
        attempted: Vec<String>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {message}{}", format_context(.context))]
    Serialization {
        message: String,
        context: ErrorContext,
    },

    #[error("Unknown provider error: {message}{}", format_context(.context))]
    Unknown {
        message: String,
        context: ErrorContext,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref provider) = ctx.provider {
        parts.push(format!("provider: {}", provider));
    }
    if let Some(ref model) = ctx.model {
        parts.push(format!("model: {}", model));
    }
    if let Some(status) = ctx.status_code {
        parts.push(format!("status: {}", status));
    }
    if let Some(attempts) = ctx.attempts {
        parts.push(format!("attempts: {}", attempts));
    }
    if let Some(ref id) = ctx.request_id {
        parts.push(format!("request_id: {}", id));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn authentication(msg: impl Into<String>) -> Self {
        Error::AuthenticationFailed {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn rate_limited(msg: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Error::RateLimitExceeded {
            message: msg.into(),
            retry_after,
            context: ErrorContext::new(),
        }
    }

    pub fn server(status: u16, msg: impl Into<String>) -> Self {
        Error::Server {
            message: msg.into(),
            context: ErrorContext::new().with_status_code(status),
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Error::Timeout {
            after,
            context: ErrorContext::new(),
        }
    }

    pub fn circuit_open(provider: impl Into<String>, retry_in: Option<Duration>) -> Self {
        let provider = provider.into();
        Error::CircuitOpen {
            message: format!("{} is rejecting calls", provider),
            retry_in,
            context: ErrorContext::new()
                .with_provider(provider)
                .with_source("circuit_breaker"),
        }
    }

    pub fn no_suitable_provider(msg: impl Into<String>) -> Self {
        Error::NoSuitableProvider {
            message: msg.into(),
            context: ErrorContext::new().with_source("strategy_engine"),
        }
    }

    pub fn all_providers_failed(primary: impl Into<String>, attempted: Vec<String>) -> Self {
        Error::AllProvidersFailed {
            primary: primary.into(),
            attempted,
            context: ErrorContext::new().with_source("orchestrator"),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Error::Unknown {
            message: msg.into(),
            context: ErrorContext::new(),
            cause: None,
        }
    }

    /// Wraps an arbitrary cause as an unclassified provider error.
    pub fn wrap<E>(msg: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Unknown {
            message: msg.into(),
            context: ErrorContext::new(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Builds the typed error for a non-success transport status.
    pub fn from_status(status: u16, body: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = body.into();
        let err = match ErrorKind::from_http_status(status) {
            ErrorKind::Authentication => Error::authentication(message),
            ErrorKind::Validation => Error::validation(message),
            ErrorKind::RateLimited => Error::rate_limited(message, retry_after),
            ErrorKind::Timeout => Error::Timeout {
                after: Duration::ZERO,
                context: ErrorContext::new().with_details(message),
            },
            ErrorKind::ServerError => Error::server(status, message),
            _ => Error::unknown(message),
        };
        err.map_context(|c| c.with_status_code(status))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AuthenticationFailed { .. } => ErrorKind::Authentication,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::RateLimitExceeded { .. } => ErrorKind::RateLimited,
            Error::Server { .. } => ErrorKind::ServerError,
            Error::Network { .. } => ErrorKind::Network,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Error::NoSuitableProvider { .. } => ErrorKind::NoSuitableProvider,
            Error::AllProvidersFailed { .. } => ErrorKind::AllProvidersFailed,
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::Serialization { .. } => ErrorKind::Serialization,
            Error::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Error::AuthenticationFailed { context, .. }
            | Error::Validation { context, .. }
            | Error::RateLimitExceeded { context, .. }
            | Error::Server { context, .. }
            | Error::Network { context, .. }
            | Error::Timeout { context, .. }
            | Error::CircuitOpen { context, .. }
            | Error::NoSuitableProvider { context, .. }
            | Error::AllProvidersFailed { context, .. }
            | Error::Configuration { context, .. }
            | Error::Serialization { context, .. }
            | Error::Unknown { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Error::AuthenticationFailed { context, .. }
            | Error::Validation { context, .. }
            | Error::RateLimitExceeded { context, .. }
            | Error::Server { context, .. }
            | Error::Network { context, .. }
            | Error::Timeout { context, .. }
            | Error::CircuitOpen { context, .. }
            | Error::NoSuitableProvider { context, .. }
            | Error::AllProvidersFailed { context, .. }
            | Error::Configuration { context, .. }
            | Error::Serialization { context, .. }
            | Error::Unknown { context, .. } => context,
        }
    }

    /// Rewrites the attached context in place.
    pub fn map_context(mut self, f: impl FnOnce(ErrorContext) -> ErrorContext) -> Self {
        let ctx = std::mem::take(self.context_mut());
        *self.context_mut() = f(ctx);
        self
    }

    /// Attaches the provider (and model) only when no provider was recorded yet.
    pub fn with_provider(self, provider: &str, model: &str) -> Self {
        self.map_context(|c| {
            if c.provider.is_some() {
                c
            } else {
                c.with_provider(provider).with_model(model)
            }
        })
    }

    pub fn with_request_id(self, id: &str) -> Self {
        self.map_context(|c| c.with_request_id(id))
    }

    pub fn status_code(&self) -> Option<u16> {
        self.context().status_code
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimitExceeded { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn provider(&self) -> Option<&str> {
        self.context().provider.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.context().request_id.as_deref()
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization {
            message: e.to_string(),
            context: ErrorContext::new().with_source("serde_json"),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Configuration {
            message: e.to_string(),
            context: ErrorContext::new().with_source("serde_yaml"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Configuration {
            message: e.to_string(),
            context: ErrorContext::new().with_source("io"),
        }
    }
}
