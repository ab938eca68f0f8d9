//! Repository credential encryption
//!
//! AES-256-GCM with a random 96-bit nonce prepended to the ciphertext; the
//! result is base64 encoded for storage in a TEXT column.

use crate::error::{ClusteredError, Result};
use aes_gcm::Aes256Gcm;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aead::generic_array::GenericArray;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Fresh key material for a new encryptor
pub fn generate_key() -> Vec<u8> {
    let mut key = vec![0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key)
        .map_err(|_| ClusteredError::Crypto(format!("key must be {} bytes, got {}", KEY_LEN, key.len())))
}

pub fn encrypt(key: &[u8], plaintext: &str) -> Result<String> {
    let cipher = cipher(key)?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|e| ClusteredError::Crypto(format!("AES-256-GCM encryption failed: {e}")))?;

    let mut sealed = nonce.to_vec();
    sealed.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(sealed))
}

pub fn decrypt(key: &[u8], encoded: &str) -> Result<String> {
    let cipher = cipher(key)?;
    let data = STANDARD
        .decode(encoded)
        .map_err(|e| ClusteredError::Crypto(format!("invalid base64: {e}")))?;

    if data.len() < NONCE_LEN {
        return Err(ClusteredError::Crypto("ciphertext too short".into()));
    }
    let (nonce, ciphertext) = data.split_at(NONCE_LEN);

    let plaintext = cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|e| ClusteredError::Crypto(format!("AES-256-GCM decryption failed: {e}")))?;
    String::from_utf8(plaintext).map_err(|e| ClusteredError::Crypto(e.to_string()))
}
