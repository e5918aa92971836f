use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Configuration key or field that caused the error (e.g., "base_url", "max_concurrent_requests")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_validator", "env_loader")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// How a caller surfacing an error to a user should present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Remote side is struggling or unreachable; try again later.
    TemporarilyUnavailable,
    /// The server completed the exchange and refused the request.
    RejectedByServer,
    /// The calling code is wrong (bad method, bad config, bad payload).
    CallerError,
    /// Local infrastructure failure (credential storage and the like).
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::RejectedByServer => "rejected_by_server",
            Self::CallerError => "caller_error",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for every logical request routed through the client.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any network attempt because the endpoint's breaker is open.
    #[error("Circuit breaker open for {endpoint}; retry in {retry_after_ms} ms")]
    CircuitOpen { endpoint: String, retry_after_ms: u64 },

    #[error("Request to {endpoint} timed out after {timeout_ms} ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("Network transport error for {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    /// A completed exchange answered with status >= 400.
    #[error("HTTP {status} from {endpoint}: {body}")]
    HttpStatus {
        status: u16,
        endpoint: String,
        body: String,
    },

    #[error("Unsupported HTTP method: {method}")]
    UnsupportedOperation { method: String },

    #[error("Client has been shut down")]
    Shutdown,

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Credential store error: {message}")]
    Credential { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn credential(msg: impl Into<String>) -> Self {
        Error::Credential {
            message: msg.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }

    /// HTTP status for completed exchanges.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::CircuitOpen { .. }
            | Error::Timeout { .. }
            | Error::Transport { .. }
            | Error::Shutdown => ErrorCategory::TemporarilyUnavailable,
            Error::HttpStatus { .. } => ErrorCategory::RejectedByServer,
            Error::UnsupportedOperation { .. }
            | Error::Configuration { .. }
            | Error::Serialization(_) => ErrorCategory::CallerError,
            Error::Credential { .. } => ErrorCategory::Internal,
        }
    }

    /// Whether this outcome is a remote failure the circuit breaker must count.
    pub fn counts_against_breaker(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Transport { .. } | Error::HttpStatus { .. }
        )
    }

    /// 401/403 responses invalidate the stored credential.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}
