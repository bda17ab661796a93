use std::path::PathBuf;
use thiserror::Error;

/// All possible errors raised while building or running a table request
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Invalid table name: '{0}'")]
    InvalidTable(String),

    #[error("Invalid column name: '{0}'")]
    InvalidIdentifier(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid mode '{0}'. Use 'save' or 'read'.")]
    InvalidMode(String),

    #[error("Unsupported operator: '{0}'")]
    InvalidOperator(String),

    #[error("Invalid ORDER BY expression: '{0}'")]
    InvalidOrderBy(String),

    #[error("LIMIT must be a non-negative integer no larger than {max}, got {value}", max = u32::MAX)]
    InvalidLimit { value: String },

    #[error("Update on '{0}' has no columns to set")]
    EmptyUpdate(String),

    #[error("Cannot read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid date/time: {0}")]
    Datetime(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AccessError {
    /// True when the error was detected before any file or database I/O
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AccessError::InvalidTable(_)
                | AccessError::InvalidIdentifier(_)
                | AccessError::InvalidRequest(_)
                | AccessError::InvalidMode(_)
                | AccessError::InvalidOperator(_)
                | AccessError::InvalidOrderBy(_)
                | AccessError::InvalidLimit { .. }
                | AccessError::EmptyUpdate(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AccessError>;
