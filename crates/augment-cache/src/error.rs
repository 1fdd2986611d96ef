//! Error types for the augmentation layer.

use generation_client::GenerationError;

#[derive(Debug, thiserror::Error)]
pub enum AugmentError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generation failed: {0}")]
    Generation(String),

    /// A stored row could not be decoded back into content.
    #[error("Stored content corrupt: {0}")]
    Corrupt(String),

    /// The generation task went away without publishing an outcome.
    #[error("Generation task interrupted")]
    Interrupted,
}

impl From<GenerationError> for AugmentError {
    fn from(err: GenerationError) -> Self {
        AugmentError::Generation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AugmentError>;
