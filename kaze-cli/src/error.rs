use thiserror::Error;

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// Engine operation failed
    #[error(transparent)]
    Sync(#[from] kaze_sync::SyncError),

    /// Database could not be opened or queried
    #[error("Database error: {0}")]
    Database(String),

    /// Settings file or environment is invalid
    #[error("Config error: {0}")]
    Config(String),

    /// Runtime creation or server error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Referenced title or chapter does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl CliError {
    pub(crate) fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<kaze_db::OperationError> for CliError {
    fn from(e: kaze_db::OperationError) -> Self {
        Self::Database(e.to_string())
    }
}
