//! Error types for content retrieval

use thiserror::Error;

/// Content API and model errors
#[derive(Error, Debug)]
pub enum ContentError {
    /// Transport failure or non-2xx response
    #[error("Network error: {0}")]
    Network(String),

    /// The API reports that no such asset exists
    #[error("Not found: {0}")]
    NotFound(String),

    /// The response body did not have the expected shape
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// Verse keys are written `chapter:verse`
    #[error("Invalid verse key: {0}")]
    InvalidVerseKey(String),

    #[error(transparent)]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

impl ContentError {
    /// Whether offering "Retry" makes sense. `NotFound` means unavailable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ContentError::Network(_))
    }
}

/// Result type for content operations
pub type Result<T> = std::result::Result<T, ContentError>;
