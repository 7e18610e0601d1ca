//! Append-only, SHA-256 hash-chained audit log.
//!
//! `self_hash_i = SHA256(prev_hash_{i-1} || canonical_serialize(event_i))`
//! where the canonical form covers only `{prev_hash, timestamp, layer, kind,
//! state_delta, boundary_distance}` — `metadata_blob` is excluded from the
//! digest so free-form, human-facing detail never perturbs the chain.
//! Wall-clock timestamps are recorded but, per the same reasoning, are not
//! trustworthy tamper evidence on their own; the chain is what's load-bearing.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use governance_verification::canonical_bytes;

use crate::error::{AuditError, Result};

/// Hex-encoded SHA-256 of 32 zero bytes; the `prev_hash` of the very first
/// entry ever appended, before any trimming has occurred.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Which kernel subsystem produced an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLayer {
    Gate,
    Detection,
    Immune,
    Flux,
    Keychain,
    Lattice,
    Torus,
    Quorum,
}

/// The subset of an [`AuditEvent`] that is hashed into the chain.
#[derive(Serialize)]
struct HashedFields<'a> {
    prev_hash: &'a str,
    timestamp: DateTime<Utc>,
    layer: AuditLayer,
    kind: &'a str,
    state_delta: f64,
    boundary_distance: f64,
}

/// One append-only audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub layer: AuditLayer,
    pub kind: String,
    pub state_delta: f64,
    pub boundary_distance: f64,
    pub metadata_blob: serde_json::Value,
    pub prev_hash: String,
    pub self_hash: String,
}

impl AuditEvent {
    fn compute_hash(fields: &HashedFields<'_>) -> Result<String> {
        let canonical = canonical_bytes(fields)
            .map_err(|e| AuditError::Canonicalization(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(fields.prev_hash.as_bytes());
        hasher.update(&canonical);
        Ok(hex::encode(hasher.finalize()))
    }

    fn recompute(&self) -> Result<String> {
        Self::compute_hash(&HashedFields {
            prev_hash: &self.prev_hash,
            timestamp: self.timestamp,
            layer: self.layer,
            kind: &self.kind,
            state_delta: self.state_delta,
            boundary_distance: self.boundary_distance,
        })
    }
}

/// Append-only event list with overflow trimming (oldest entry and its hash
/// are dropped together once `max_entries` is exceeded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    entries: VecDeque<AuditEvent>,
    max_entries: usize,
}

impl AuditLog {
    /// Create an empty log that retains at most `max_entries` events.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Hash anchoring the chain right now: the last entry's `self_hash`, or
    /// [`GENESIS_HASH`] if the log is empty.
    pub fn last_hash(&self) -> String {
        self.entries
            .back()
            .map(|e| e.self_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string())
    }

    /// Append a new event, chaining it off [`last_hash`](Self::last_hash),
    /// then trim if the log has grown past capacity.
    pub fn append(
        &mut self,
        layer: AuditLayer,
        kind: impl Into<String>,
        state_delta: f64,
        boundary_distance: f64,
        metadata_blob: serde_json::Value,
    ) -> Result<&AuditEvent> {
        let prev_hash = self.last_hash();
        let timestamp = Utc::now();
        let kind = kind.into();

        let self_hash = AuditEvent::compute_hash(&HashedFields {
            prev_hash: &prev_hash,
            timestamp,
            layer,
            kind: &kind,
            state_delta,
            boundary_distance,
        })?;

        self.entries.push_back(AuditEvent {
            timestamp,
            layer,
            kind,
            state_delta,
            boundary_distance,
            metadata_blob,
            prev_hash,
            self_hash,
        });

        if self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }

        Ok(self.entries.back().expect("just pushed"))
    }

    /// Recompute the chain bottom-up and compare against stored hashes.
    /// A log that has been trimmed is verified only from its current front —
    /// entries that fell off overflow are gone along with their hashes.
    pub fn verify_chain(&self) -> Result<bool> {
        let mut prev = match self.entries.front() {
            Some(first) => first.prev_hash.clone(),
            None => return Ok(true),
        };

        for (index, event) in self.entries.iter().enumerate() {
            if event.prev_hash != prev {
                return Err(AuditError::ChainBroken { index });
            }
            if event.recompute()? != event.self_hash {
                return Err(AuditError::ChainBroken { index });
            }
            prev = event.self_hash.clone();
        }

        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &AuditEvent> {
        self.entries.iter()
    }
}
