//! Error types for governance-verification

use thiserror::Error;

/// Verification/derivation errors
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("attestation chain broken at entry {index}")]
    AttestationChainBroken { index: usize },
}

/// Result type alias for governance-verification
pub type Result<T> = std::result::Result<T, VerificationError>;
