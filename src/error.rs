//! Unified error hierarchy for sportlens
//!
//! Only two things are errors here: a failing store and a malformed or
//! superseded request. Unknown views, empty windows and unusable numbers are
//! ordinary outcomes encoded in the result types.

use thiserror::Error;

/// Top-level error type for analytics operations
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Store failure, surfaced unchanged
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Caller passed arguments the operation cannot accept
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A newer request of the same kind started before this one finished
    #[error("Request superseded (generation {generation})")]
    Superseded { generation: u64 },

    /// Background worker panicked or was cancelled by the runtime
    #[error("Worker error: {0}")]
    Worker(String),
}

/// Errors raised at the data store boundary
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite backend failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Backend not reachable
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    /// Backend gave up waiting
    #[error("Store timed out during {operation}")]
    Timeout { operation: String },

    /// Row could not be mapped onto the data model
    #[error("Invalid row in {table}: {reason}")]
    InvalidRow { table: String, reason: String },
}

/// Result type alias for analytics operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;

impl AnalyticsError {
    /// Check if the caller may sensibly retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalyticsError::Store(StoreError::Unavailable { .. })
                | AnalyticsError::Store(StoreError::Timeout { .. })
        )
    }

    /// True when the result was discarded because a newer request won
    pub fn is_superseded(&self) -> bool {
        matches!(self, AnalyticsError::Superseded { .. })
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AnalyticsError::Superseded { .. } => ErrorSeverity::Info,
            AnalyticsError::InvalidRequest(_) => ErrorSeverity::Warning,
            AnalyticsError::Store(StoreError::Timeout { .. }) => ErrorSeverity::Warning,
            AnalyticsError::Store(_) => ErrorSeverity::Error,
            AnalyticsError::Worker(_) => ErrorSeverity::Critical,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            AnalyticsError::Store(StoreError::Unavailable { .. })
            | AnalyticsError::Store(StoreError::Timeout { .. }) => {
                "Training history is temporarily unavailable. Please try again.".to_string()
            }
            AnalyticsError::InvalidRequest(reason) => {
                format!("Cannot run this comparison: {}", reason)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
