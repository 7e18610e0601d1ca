//! Append-only, SHA-256 hash-chained audit log for the governance kernel
//! plus a shareable handle for concurrent access.

pub mod error;
pub mod log;
pub mod service;

pub use error::{AuditError, Result};
pub use log::{AuditEvent, AuditLayer, AuditLog, GENESIS_HASH};
pub use service::{AuditLogHandle, AuditSnapshot};
