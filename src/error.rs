//! Error types for TAP Core

use thiserror::Error;

/// Result type alias for TAP Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for TAP Core
#[derive(Error, Debug)]
pub enum Error {
    /// Key generation error
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Key loading error (malformed PEM, or key does not match the algorithm)
    #[error("Key load failed: {0}")]
    KeyLoad(String),

    /// Signature error
    #[error("Signature operation failed: {0}")]
    Signature(String),

    /// Verification error
    #[error("Signature verification failed: {0}")]
    Verification(String),

    /// Key format error
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Invalid key type
    #[error("Invalid key type: {0}")]
    InvalidKeyType(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// PEM error
    #[error("PEM format error: {0}")]
    Pem(#[from] pem::PemError),

    /// HTTP signature error
    #[error("HTTP signature error: {0}")]
    HttpSignature(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unsupported operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}
