//! Error types for myqb

use thiserror::Error;

/// Result type alias for myqb operations
pub type QbResult<T> = Result<T, QbError>;

/// Error types for statement building and execution
#[derive(Debug, Error)]
pub enum QbError {
    /// Malformed builder configuration (bad table/join/order argument, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Statement could not be compiled into SQL
    #[error("Compile error: {0}")]
    Compile(String),

    /// Bind data does not match the statement's placeholders
    #[error("Bind error: {0}")]
    Bind(String),

    /// Error surfaced by the sqlx driver
    #[cfg(feature = "mysql")]
    #[error("Driver error: {0}")]
    Driver(#[from] sqlx::Error),

    /// Driver-agnostic execution failure
    #[error("Execution error: {0}")]
    Execution(String),
}

impl QbError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a compile error
    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile(message.into())
    }

    /// Create a bind error
    pub fn bind(message: impl Into<String>) -> Self {
        Self::Bind(message.into())
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a compile error
    pub fn is_compile(&self) -> bool {
        matches!(self, Self::Compile(_))
    }

    /// Check if this is a bind error
    pub fn is_bind(&self) -> bool {
        matches!(self, Self::Bind(_))
    }
}
