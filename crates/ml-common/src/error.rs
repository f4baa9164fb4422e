//! Error taxonomy shared by every stage of the pipeline.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, LogError>;

/// Errors raised while configuring or running a logging pipeline.
#[derive(Error, Debug)]
pub enum LogError {
    /// Bad level name, malformed masking rule, non-masking processor where a
    /// masking one is required, non-positive size limit.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Programmer error: mutating a finalized value, unsupported operation.
    #[error("logic error: {0}")]
    Logic(String),

    /// Failure raised by a processor or handler while a record is submitted.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// I/O error from a sink.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LogError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        LogError::InvalidArgument(message.into())
    }

    pub fn logic(message: impl Into<String>) -> Self {
        LogError::Logic(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        LogError::Runtime(message.into())
    }

    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            LogError::InvalidArgument(_) => 10,
            LogError::Logic(_) => 11,
            LogError::Runtime(_) => 12,
            LogError::Io(_) => 13,
            LogError::Json(_) => 14,
        }
    }

    /// Short name of the error kind, used by exception handlers.
    pub fn kind(&self) -> &'static str {
        match self {
            LogError::InvalidArgument(_) => "InvalidArgument",
            LogError::Logic(_) => "Logic",
            LogError::Runtime(_) => "Runtime",
            LogError::Io(_) => "Io",
            LogError::Json(_) => "Json",
        }
    }

    /// Configuration errors that must surface immediately rather than be
    /// routed to an exception handler.
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, LogError::InvalidArgument(_) | LogError::Logic(_))
    }
}
