//! Error types for governance-audit

use thiserror::Error;

/// Audit log errors
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit chain broken at entry {index}")]
    ChainBroken { index: usize },

    #[error("canonical serialization failed: {0}")]
    Canonicalization(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for governance-audit
pub type Result<T> = std::result::Result<T, AuditError>;
