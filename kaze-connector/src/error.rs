use kaze_catalog::Provider;

/// Errors a connector can return. All of them are recoverable by retrying
/// on a later run.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited by {0}")]
    RateLimit(Provider),

    #[error("Not found on provider: {0}")]
    NotFound(String),

    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Failed to parse provider response: {0}")]
    Parse(String),
}

impl ProviderError {
    /// True when the provider said the requested item does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}
