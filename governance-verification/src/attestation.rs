//! Attestation chain linking signed statements about kernel decisions and
//! audit anchors into a tamper-evident sequence.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::deterministic::fingerprint;
use crate::error::{Result, VerificationError};

type HmacSha256 = Hmac<Sha256>;

/// Attestation - Signed statement about an artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attestation {
    /// Signer identity (DID, key fingerprint, etc.)
    #[serde(rename = "signer_id")]
    pub signer_id: String,
    
    /// Cryptographic signature (base64)
    pub signature: String,
    
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    
    /// Signer role
    pub role: SignerRole,
    
    /// Optional statement/claim
    pub statement: Option<String>,
}

/// Signer role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerRole {
    /// System identity
    System,
    /// Human approver
    Approver,
    /// External auditor
    Auditor,
    /// Operator
    Operator,
}

/// Attestation chain - Linked sequence of attestations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationChain {
    /// Chain entries
    pub entries: Vec<ChainEntry>,
    
    /// Root attestation
    pub root: Attestation,
}

/// Chain entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEntry {
    /// Attestation
    pub attestation: Attestation,
    
    /// Previous entry hash (links to previous)
    #[serde(rename = "previous_hash")]
    pub previous_hash: String,
    
    /// Entry hash
    pub hash: String,
}

impl Attestation {
    /// Produce a system attestation over `statement`, signing with an HMAC
    /// keyed on the kernel's current Hamiltonian chain key. This
    /// is the attestation used to anchor audit log snapshots and gate
    /// decisions, not an external PKI signature.
    pub fn system_attest(signer_id: &str, statement: &str, key: &[u8; 32]) -> Result<Self> {
        let timestamp = Utc::now();
        let mut mac = HmacSha256::new_from_slice(key)
            .map_err(|e| VerificationError::KeyDerivation(e.to_string()))?;
        mac.update(signer_id.as_bytes());
        mac.update(timestamp.to_rfc3339().as_bytes());
        mac.update(statement.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(Self {
            signer_id: signer_id.to_string(),
            signature,
            timestamp,
            role: SignerRole::System,
            statement: Some(statement.to_string()),
        })
    }
}

impl AttestationChain {
    /// Create a new chain with root attestation
    pub fn new(root: Attestation) -> Self {
        Self {
            entries: vec![],
            root,
        }
    }

    /// Append an attestation to the chain
    pub fn append(&mut self, attestation: Attestation) -> Result<()> {
        let previous_hash = if let Some(last) = self.entries.last() {
            last.hash.clone()
        } else {
            fingerprint(&self.root)?
        };

        let entry_hash = fingerprint(&attestation)?;

        self.entries.push(ChainEntry {
            attestation,
            previous_hash,
            hash: entry_hash,
        });
        Ok(())
    }

    /// Verify chain integrity
    pub fn verify_integrity(&self) -> Result<bool> {
        let mut prev_hash = fingerprint(&self.root)?;

        for (index, entry) in self.entries.iter().enumerate() {
            if entry.previous_hash != prev_hash {
                return Err(VerificationError::AttestationChainBroken { index });
            }

            let computed_hash = fingerprint(&entry.attestation)?;
            if entry.hash != computed_hash {
                return Err(VerificationError::AttestationChainBroken { index });
            }

            prev_hash = entry.hash.clone();
        }

        Ok(true)
    }
}
