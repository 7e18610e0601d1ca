//! Error types for governance-core.

use thiserror::Error;

/// Input-shape and internal errors the kernel can raise.
/// Boundary-clamp warnings and BLOCK/DENY/ESCALATE outcomes are not errors —
/// they are reflected in the returned metrics and decision, respectively.
#[derive(Error, Debug)]
pub enum GovernanceError {
    #[error("state vector has {actual} dimensions, expected {expected}")]
    WrongDimension { expected: usize, actual: usize },

    #[error("state vector contains a non-finite value at index {index}")]
    NonFinite { index: usize },

    #[error("corrupt key material: {0}")]
    CorruptKey(String),

    #[error("memory event domain {domain} out of range 0..21")]
    InvalidDomain { domain: u32 },

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error(transparent)]
    Verification(#[from] governance_verification::VerificationError),

    #[error(transparent)]
    Audit(#[from] governance_audit::AuditError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for governance-core.
pub type Result<T> = std::result::Result<T, GovernanceError>;
