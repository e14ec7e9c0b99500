//! AES-256-GCM seal/open for credential blobs at rest.
//!
//! Every call to [`seal`] generates a fresh random 96-bit nonce via the
//! system CSPRNG and prepends it to the ciphertext. Nonce reuse would be
//! catastrophic for GCM security.

use std::{fs, path::Path};

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use crate::{errors::Error, Result};

pub const KEY_LEN: usize = 32;

/// Encrypt plaintext. Output layout: `nonce (12 bytes) || ciphertext || tag`.
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| Error::Crypto("failed to create AES-256-GCM key".to_string()))?;
    let sealing = LessSafeKey::new(unbound);

    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| Error::Crypto("failed to generate random nonce".to_string()))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    sealing
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| Error::Crypto("AES-256-GCM encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(out)
}

/// Decrypt a blob produced by [`seal`].
pub fn open(key: &[u8; KEY_LEN], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return Err(Error::Crypto("sealed blob too short".to_string()));
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);

    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| Error::Crypto("failed to create AES-256-GCM key".to_string()))?;
    let opening = LessSafeKey::new(unbound);

    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| Error::Crypto("invalid nonce".to_string()))?;

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| {
            Error::Crypto("decryption failed: wrong key or corrupted data".to_string())
        })?;

    Ok(plaintext.to_vec())
}

/// Load the store key from `path`, generating and persisting a fresh one on
/// first use.
pub fn load_or_generate_key(path: &Path) -> Result<[u8; KEY_LEN]> {
    if path.exists() {
        let raw = fs::read(path)?;
        let key: [u8; KEY_LEN] = raw.as_slice().try_into().map_err(|_| {
            Error::Crypto(format!(
                "key file {} has wrong length (expected {KEY_LEN} bytes)",
                path.display()
            ))
        })?;
        return Ok(key);
    }

    let rng = SystemRandom::new();
    let mut key = [0u8; KEY_LEN];
    rng.fill(&mut key)
        .map_err(|_| Error::Crypto("failed to generate store key".to_string()))?;
    fs::write(path, key)?;
    Ok(key)
}
