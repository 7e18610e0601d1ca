//! Thread-safe handle around [`AuditLog`] for sharing across async tasks.
//!
//! The kernel's own concurrency model requires the audit log be
//! guarded by a single exclusive writer shared across otherwise-parallel
//! per-agent calls; this is that guard, plus the read-side views the
//! inspection HTTP service in `bin/server.rs` exposes.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::Result;
use crate::log::{AuditEvent, AuditLayer, AuditLog};

/// Cloneable handle onto a shared [`AuditLog`].
#[derive(Clone)]
pub struct AuditLogHandle {
    inner: Arc<Mutex<AuditLog>>,
}

impl AuditLogHandle {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AuditLog::new(max_entries))),
        }
    }

    /// Append an event and return its `self_hash`.
    pub fn append(
        &self,
        layer: AuditLayer,
        kind: impl Into<String>,
        state_delta: f64,
        boundary_distance: f64,
        metadata_blob: serde_json::Value,
    ) -> Result<String> {
        let mut log = self.inner.lock().expect("audit log mutex poisoned");
        let event = log.append(layer, kind, state_delta, boundary_distance, metadata_blob)?;
        Ok(event.self_hash.clone())
    }

    pub fn last_hash(&self) -> String {
        self.inner.lock().expect("audit log mutex poisoned").last_hash()
    }

    pub fn verify(&self) -> Result<bool> {
        self.inner.lock().expect("audit log mutex poisoned").verify_chain()
    }

    pub fn snapshot(&self) -> AuditSnapshot {
        let log = self.inner.lock().expect("audit log mutex poisoned");
        AuditSnapshot {
            len: log.len(),
            last_hash: log.last_hash(),
            entries: log.entries().cloned().collect(),
        }
    }
}

/// A point-in-time, serializable view of the log for external inspection.
#[derive(Debug, Clone, Serialize)]
pub struct AuditSnapshot {
    pub len: usize,
    pub last_hash: String,
    pub entries: Vec<AuditEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_shares_state_across_clones() {
        let handle = AuditLogHandle::new(10);
        let other = handle.clone();

        handle
            .append(AuditLayer::Gate, "decision", 0.0, 0.0, serde_json::json!({}))
            .unwrap();

        assert_eq!(other.snapshot().len, 1);
        assert!(other.verify().unwrap());
    }
}
