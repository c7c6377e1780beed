//! Error types for ghostline

use thiserror::Error;

/// Result type for ghostline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for ghostline
#[derive(Debug, Error)]
pub enum Error {
    /// The identity generator rejected the request or failed outright
    #[error("Identity generation failed: {message}")]
    IdentityGeneration { message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an identity generation error
    pub fn identity(message: impl Into<String>) -> Self {
        Self::IdentityGeneration {
            message: message.into(),
        }
    }

    /// Check if this error came from the identity generator
    pub fn is_identity_failure(&self) -> bool {
        matches!(self, Error::IdentityGeneration { .. })
    }
}
