/// Core error types for the Kinetix engine.
use std::path::PathBuf;

/// A specialized Result type for Kinetix operations.
pub type KinetixResult<T> = Result<T, KinetixError>;

/// Top-level error type encompassing all Kinetix subsystems.
#[derive(Debug, thiserror::Error)]
pub enum KinetixError {
    /// The engine could not be constructed (for example, no drawing surface).
    #[error("initialization error: {0}")]
    Init(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("encode error: {0}")]
    Encode(String),

    /// The caller aborted a long-running operation. Not a failure.
    #[error("export cancelled")]
    Cancelled,

    #[error("config error: {message} ({path:?})")]
    Config { message: String, path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported feature: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Other(String),
}

impl KinetixError {
    /// Create a configuration error tied to a file.
    pub fn config(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        KinetixError::Config {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Whether this error represents a user cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, KinetixError::Cancelled)
    }
}
