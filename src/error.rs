//! Error types for the belief tracking engine

use thiserror::Error;

/// Result type alias for belief engine operations
pub type Result<T> = std::result::Result<T, BeliefError>;

#[derive(Error, Debug)]
pub enum BeliefError {

    // =============================
    // Core Engine Errors
    // =============================

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Belief not found: {0}")]
    NotFound(String),

    #[error("Invalid causal link: {0}")]
    InvalidLink(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signal extraction error: {0}")]
    Extraction(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
