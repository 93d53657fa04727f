use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Invalid document path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, DocError>;

impl DocError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error came from the store rather than from the caller's input.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Connection(_))
    }
}

impl From<sqlx::Error> for DocError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io) => Self::Connection(io.to_string()),
            sqlx::Error::Tls(tls) => Self::Connection(tls.to_string()),
            sqlx::Error::PoolTimedOut => Self::Connection("timed out".into()),
            other => Self::Backend(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DocError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<std::io::Error> for DocError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
