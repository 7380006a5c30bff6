use kaze_catalog::{Provider, UnknownProvider};
use kaze_connector::ProviderError;
use kaze_db::OperationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    UnknownProvider(#[from] UnknownProvider),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Could not fetch details for {provider}/{provider_id}: {reason}")]
    FetchDetailsFailed {
        provider: Provider,
        provider_id: String,
        reason: String,
    },
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Title '{0}' has no source link")]
    NoSourceLink(String),
    #[error("Title not found: {0}")]
    TitleNotFound(String),
    #[error("Chapter not found: {0}")]
    ChapterNotFound(String),
    #[error("Database error: {0}")]
    Db(#[from] OperationError),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl SyncError {
    /// True when the store itself failed, as opposed to one title or one
    /// provider. A batch run aborts on these instead of recording them per title.
    pub fn is_store_failure(&self) -> bool {
        match self {
            SyncError::Sqlite(_) => true,
            SyncError::Db(e) => !matches!(e, OperationError::NotFound { .. }),
            _ => false,
        }
    }
}
