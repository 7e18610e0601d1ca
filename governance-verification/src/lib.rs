//! Deterministic key derivation, canonical serialization and attestation
//! chains for the governance kernel.
//!
//! This crate carries no kernel logic of its own — it is the cryptographic
//! substrate `governance-core` and `governance-audit` build on: the
//! Hamiltonian key chain's HMAC/HKDF derivation, canonical
//! byte encoding for hashing (needed so a `HashMap` or struct field reorder
//! never changes a digest), and the attestation chain used to anchor audit
//! snapshots and gate decisions.

pub mod attestation;
pub mod deterministic;
pub mod error;
pub mod keys;

pub use attestation::{Attestation, AttestationChain, ChainEntry, SignerRole};
pub use deterministic::{canonical_bytes, fingerprint};
pub use error::{Result, VerificationError};
pub use keys::{derive_seed_key, hmac_step, to_hex, HKDF_INFO, HKDF_SALT};
