//! Master secrets, server salts, and the per-generation key material.

use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use sealdex_core::{SealdexError, SealdexResult};

use crate::KEY_SIZE;

/// PBKDF2 iteration count; fixed, since changing it would invalidate every
/// stored index.
pub const PBKDF2_ROUNDS: u32 = 4096;

const PATHNAME_KEY_DOMAIN: &[u8] = b"sealdex-docid";

/// A per-generation master secret. Zeroized on drop.
///
/// Never leaves the client trust domain; everything else in the key
/// hierarchy is derived from it.
#[derive(Clone)]
pub struct MasterSecret {
    bytes: Vec<u8>,
}

impl MasterSecret {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Draws a fresh secret of `len` bytes from the OS RNG.
    pub fn generate(len: usize) -> SealdexResult<Self> {
        let mut bytes = vec![0u8; len];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| SealdexError::Rng(e.to_string()))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for MasterSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A 256-bit PRF key derived from the master secret and one salt.
/// Zeroized on drop.
#[derive(Clone)]
pub struct PrfKey {
    bytes: [u8; KEY_SIZE],
}

impl PrfKey {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for PrfKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for PrfKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrfKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generates `num_keys` salts of `len_salt` bytes each from the OS RNG.
///
/// Salts are public server state; a length below 8 is legal but not
/// recommended.
pub fn generate_salts(num_keys: usize, len_salt: usize) -> SealdexResult<Vec<Vec<u8>>> {
    let mut salts = Vec::with_capacity(num_keys);
    for _ in 0..num_keys {
        let mut salt = vec![0u8; len_salt];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| SealdexError::Rng(e.to_string()))?;
        salts.push(salt);
    }
    Ok(salts)
}

/// Derives one PRF key per salt via PBKDF2-HMAC-SHA256.
///
/// Deterministic: the same (master, salts) always yield the same vector.
pub fn derive_key_vector(master: &MasterSecret, salts: &[Vec<u8>]) -> Vec<PrfKey> {
    salts
        .iter()
        .map(|salt| {
            let mut bytes = [0u8; KEY_SIZE];
            pbkdf2_hmac::<Sha256>(master.as_bytes(), salt, PBKDF2_ROUNDS, &mut bytes);
            PrfKey { bytes }
        })
        .collect()
}

/// Derives the pathname-cipher key from the master secret via HKDF-SHA256.
pub fn derive_pathname_key(master: &MasterSecret) -> [u8; KEY_SIZE] {
    let hkdf = Hkdf::<Sha256>::new(None, master.as_bytes());
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(PATHNAME_KEY_DOMAIN, &mut okm)
        .expect("a 32-byte OKM is within the HKDF-SHA256 limit");
    okm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_salts() {
        let salts = generate_salts(10, 8).unwrap();
        assert_eq!(salts.len(), 10);
        for salt in &salts {
            assert_eq!(salt.len(), 8);
            assert_ne!(salt, &vec![0u8; 8], "salt not drawn from the RNG");
        }
    }

    #[test]
    fn test_derive_key_vector_deterministic() {
        let master = MasterSecret::from_bytes(b"test".to_vec());
        let salts = generate_salts(100, 8).unwrap();

        let keys1 = derive_key_vector(&master, &salts);
        let keys2 = derive_key_vector(&master, &salts);

        assert_eq!(keys1.len(), salts.len());
        for (k1, k2) in keys1.iter().zip(&keys2) {
            assert_eq!(k1.as_bytes(), k2.as_bytes(), "KDF must be deterministic");
        }
    }

    #[test]
    fn test_derive_key_vector_distinct_per_salt() {
        let master = MasterSecret::from_bytes(b"test".to_vec());
        let salts = generate_salts(2, 8).unwrap();
        let keys = derive_key_vector(&master, &salts);
        assert_ne!(keys[0].as_bytes(), keys[1].as_bytes());
    }

    #[test]
    fn test_derive_key_vector_distinct_per_master() {
        let salts = generate_salts(1, 8).unwrap();
        let keys1 = derive_key_vector(&MasterSecret::from_bytes(b"one".to_vec()), &salts);
        let keys2 = derive_key_vector(&MasterSecret::from_bytes(b"two".to_vec()), &salts);
        assert_ne!(keys1[0].as_bytes(), keys2[0].as_bytes());
    }

    #[test]
    fn test_pathname_key_distinct_from_prf_keys() {
        let master = MasterSecret::from_bytes(vec![42u8; 64]);
        let salts = generate_salts(1, 8).unwrap();
        let prf = derive_key_vector(&master, &salts);
        let pathname_key = derive_pathname_key(&master);
        assert_ne!(&pathname_key, prf[0].as_bytes());
        // Deterministic
        assert_eq!(pathname_key, derive_pathname_key(&master));
    }

    #[test]
    fn test_master_secret_generate() {
        let a = MasterSecret::generate(64).unwrap();
        let b = MasterSecret::generate(64).unwrap();
        assert_eq!(a.len(), 64);
        assert_ne!(a.as_bytes(), b.as_bytes(), "random secrets must differ");
    }
}
