use std::time::Duration;
use thiserror::Error;

/// Macro to log an error with context before returning it.
/// Usage: `log_and_return!(error, "context message")`
#[macro_export]
macro_rules! log_and_return {
    ($error:expr, $context:expr) => {{
        $error.log_with_context($context);
        return Err($error);
    }};
}

/// Macro to log an error with context and return it as a `Result`.
/// Usage: `log_error!(error, "context message")`
#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {{
        $error.log_with_context($context);
        Err($error)
    }};
}

/// Application-specific error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Database pool error: {0}")]
    DatabasePool(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation errors: {0}")]
    ValidationErrors(#[from] validator::ValidationErrors),

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// Missing required API key, malformed DSN, invalid `LOG_LEVEL`, or an
    /// out-of-range numeric setting. Fatal at startup or first collector use.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Network timeout, DNS failure, 5xx, or 429 with `Retry-After`. The
    /// HTTP substrate retries these internally; if retries exhaust, this is
    /// what a collector surfaces as an `error_message` or warning.
    /// `retry_after`, when set (parsed from a 429's `Retry-After` header),
    /// is the minimum the substrate must wait before the next attempt,
    /// overriding whatever the backoff schedule would otherwise pick.
    #[error("Transient upstream error: {message}")]
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },

    /// 4xx other than 429, malformed response, schema violation. Never
    /// retried by the substrate.
    #[error("Fatal upstream error: {0}")]
    Fatal(String),

    /// XML/HTML/JSON structure did not match what a parser expected.
    /// Downgrades to a collector warning, never a panic.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A single item failed to persist; the caller rolls back to the
    /// phase's savepoint and continues with the next item.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A per-host token bucket has no permits left and the caller asked for
    /// a non-blocking check rather than waiting.
    #[error("Rate limited on {host}, retry after {retry_after:?}")]
    RateLimited { host: String, retry_after: Duration },

    #[error("LLM client error: {0}")]
    LlmClient(String),
}

/// Result type alias used throughout the workspace.
pub type AppResult<T> = Result<T, AppError>;

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for AppError {
    fn from(err: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        AppError::ConnectionPool(err.to_string())
    }
}

impl From<diesel_migrations::MigrationError> for AppError {
    fn from(err: diesel_migrations::MigrationError) -> Self {
        AppError::MigrationError(err.to_string())
    }
}

impl From<chrono::ParseError> for AppError {
    fn from(err: chrono::ParseError) -> Self {
        AppError::Parse(format!("invalid date/time: {err}"))
    }
}

impl From<bigdecimal::ParseBigDecimalError> for AppError {
    fn from(err: bigdecimal::ParseBigDecimalError) -> Self {
        AppError::Validation(format!("invalid decimal: {err}"))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Validation(format!("invalid URL: {err}"))
    }
}

/// Utility constructors for common error scenarios.
impl AppError {
    pub fn not_found<T: std::fmt::Display>(resource: T) -> Self {
        AppError::NotFound(format!("{resource} not found"))
    }

    pub fn config<T: std::fmt::Display>(message: T) -> Self {
        AppError::Configuration(message.to_string())
    }

    pub fn transient<T: std::fmt::Display>(message: T) -> Self {
        AppError::Transient {
            message: message.to_string(),
            retry_after: None,
        }
    }

    /// A transient error carrying the minimum delay the caller must honor
    /// before retrying, e.g. a 429's `Retry-After` header.
    pub fn transient_after<T: std::fmt::Display>(message: T, retry_after: Duration) -> Self {
        AppError::Transient {
            message: message.to_string(),
            retry_after: Some(retry_after),
        }
    }

    pub fn fatal<T: std::fmt::Display>(message: T) -> Self {
        AppError::Fatal(message.to_string())
    }

    pub fn parse<T: std::fmt::Display>(message: T) -> Self {
        AppError::Parse(message.to_string())
    }

    pub fn persistence<T: std::fmt::Display>(message: T) -> Self {
        AppError::Persistence(message.to_string())
    }

    /// `true` for the error kinds the HTTP substrate should retry
    /// (§4.1 Transient classification).
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Transient { .. } | AppError::HttpClient(_))
    }

    /// Log the error at the level its kind warrants, with a caller-supplied
    /// context string prefixed to the message. Call this before an error is
    /// swallowed into a `warning`/`error_message` field so nothing is lost
    /// silently.
    pub fn log_with_context(&self, context: &str) {
        match self {
            AppError::Database(_)
            | AppError::DatabasePool(_)
            | AppError::ConnectionPool(_)
            | AppError::MigrationError(_)
            | AppError::InternalError(_)
            | AppError::Persistence(_) => {
                tracing::error!("{} - {}: {}", context, self.error_type(), self);
            }
            AppError::HttpClient(_) | AppError::Transient { .. } | AppError::Fatal(_) => {
                tracing::error!("{} - {}: {}", context, self.error_type(), self);
            }
            AppError::Validation(_) | AppError::ValidationErrors(_) | AppError::Parse(_) => {
                tracing::warn!("{} - {}: {}", context, self.error_type(), self);
            }
            AppError::RateLimited { .. } => {
                tracing::warn!("{} - {}: {}", context, self.error_type(), self);
            }
            AppError::NotFound(_) => {
                tracing::info!("{} - {}: {}", context, self.error_type(), self);
            }
            AppError::Configuration(_) => {
                tracing::error!("{} - {}: {}", context, self.error_type(), self);
            }
            _ => {
                tracing::error!("{} - {}: {}", context, self.error_type(), self);
            }
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DatabaseError",
            AppError::DatabasePool(_) => "DatabasePoolError",
            AppError::HttpClient(_) => "HttpClientError",
            AppError::JsonSerialization(_) => "JsonSerializationError",
            AppError::Validation(_) => "ValidationError",
            AppError::ValidationErrors(_) => "ValidationErrors",
            AppError::ConnectionPool(_) => "ConnectionPoolError",
            AppError::Configuration(_) => "ConfigurationError",
            AppError::Io(_) => "IoError",
            AppError::InternalError(_) => "InternalError",
            AppError::MigrationError(_) => "MigrationError",
            AppError::NotFound(_) => "NotFound",
            AppError::Transient { .. } => "TransientError",
            AppError::Fatal(_) => "FatalError",
            AppError::Parse(_) => "ParseError",
            AppError::Persistence(_) => "PersistenceError",
            AppError::RateLimited { .. } => "RateLimited",
            AppError::LlmClient(_) => "LlmClientError",
        }
    }
}
