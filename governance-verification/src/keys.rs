//! Deterministic key derivation for the Hamiltonian key chain.
//!
//! Given a 32-byte master secret (either a raw master key or a post-quantum
//! KEM shared secret — the core only ever consumes the 32 bytes), an intent
//! fingerprint and an epoch counter, derives the seed key `K0` that anchors
//! the 16-step Hamiltonian path key schedule.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Result, VerificationError};

type HmacSha256 = Hmac<Sha256>;

/// Fixed HKDF salt, ASCII "PHDM-K0-v1".
pub const HKDF_SALT: &[u8] = b"PHDM-K0-v1";
/// Fixed HKDF info, ASCII "phdm-hamiltonian-seed".
pub const HKDF_INFO: &[u8] = b"phdm-hamiltonian-seed";

/// Derive the seed key `K0` from a 32-byte shared secret, an intent
/// fingerprint string and an epoch.
///
/// ```text
/// ikm = HMAC-SHA256(key = ss, message = intent_fp || epoch_u64_be)
/// K0  = HKDF-SHA256(ikm, salt = "PHDM-K0-v1", info = "phdm-hamiltonian-seed", len = 32)
/// ```
pub fn derive_seed_key(
    shared_secret: &[u8; 32],
    intent_fingerprint: &str,
    epoch: u64,
) -> Result<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(shared_secret)
        .map_err(|e| VerificationError::KeyDerivation(e.to_string()))?;
    mac.update(intent_fingerprint.as_bytes());
    mac.update(&epoch.to_be_bytes());
    let ikm = mac.finalize().into_bytes();

    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), &ikm);
    let mut okm = [0u8; 32];
    hk.expand(HKDF_INFO, &mut okm)
        .map_err(|e| VerificationError::KeyDerivation(e.to_string()))?;
    Ok(okm)
}

/// Advance the Hamiltonian key chain one step: `K_{i+1} = HMAC-SHA256(K_i, message)`.
pub fn hmac_step(key: &[u8; 32], message: &str) -> Result<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| VerificationError::KeyDerivation(e.to_string()))?;
    mac.update(message.as_bytes());
    let out = mac.finalize().into_bytes();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    Ok(arr)
}

/// Hex-encode a key for diagnostics / CLI display. Never used for hashing
/// or comparison (those stay on raw bytes).
pub fn to_hex(key: &[u8; 32]) -> String {
    hex::encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_seed_key_is_deterministic() {
        let ss = [0u8; 32];
        let k1 = derive_seed_key(&ss, "intent-a", 7).unwrap();
        let k2 = derive_seed_key(&ss, "intent-a", 7).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn derive_seed_key_is_sensitive_to_inputs() {
        let ss = [0u8; 32];
        let k1 = derive_seed_key(&ss, "intent-a", 7).unwrap();
        let k2 = derive_seed_key(&ss, "intent-b", 7).unwrap();
        let k3 = derive_seed_key(&ss, "intent-a", 8).unwrap();
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn hmac_step_chains_deterministically() {
        let k0 = [1u8; 32];
        let k1a = hmac_step(&k0, "Tetrahedron").unwrap();
        let k1b = hmac_step(&k0, "Tetrahedron").unwrap();
        assert_eq!(k1a, k1b);

        let k1c = hmac_step(&k0, "Cube").unwrap();
        assert_ne!(k1a, k1c);
    }

    #[test]
    fn sixteen_step_reduction_is_reproducible() {
        let names = [
            "Tetrahedron", "Cube", "Octahedron", "Dodecahedron", "Icosahedron",
            "Truncated Icosahedron", "Rhombicuboctahedron", "Snub Dodecahedron",
            "Small Stellated Dodecahedron", "Great Stellated Dodecahedron",
            "Szilassi", "Csaszar", "Pentagonal Bipyramid", "Triangular Cupola",
            "Rhombic Dodecahedron", "Bilinski Dodecahedron",
        ];

        let ss = [9u8; 32];
        let k0 = derive_seed_key(&ss, "fp", 1).unwrap();

        let mut a = k0;
        for name in names.iter() {
            a = hmac_step(&a, name).unwrap();
        }
        let mut b = k0;
        for name in names.iter() {
            b = hmac_step(&b, name).unwrap();
        }
        assert_eq!(a, b);
    }
}
