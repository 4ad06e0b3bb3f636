//! Password-protected channel message encryption.
//!
//! Channel keys are shared by every member who knows the channel name and
//! password, so messages cannot use a per-session monotonic nonce counter
//! the way [`mesh_crypto::aead::AeadSession`] does for point-to-point
//! traffic: every sender would start counting from zero against the same
//! key. Each message instead carries its own random nonce.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand_core::{OsRng, RngCore};

use mesh_crypto::keyfile::derive_channel_key;
use mesh_crypto::CryptoError;

const NONCE_SIZE: usize = 12;

/// Derive the symmetric key for `channel_name`/`password`.
///
/// # Errors
///
/// Propagates `CryptoError::KeyDerivation` from the underlying Argon2id call.
pub fn channel_key(channel_name: &str, password: &str) -> Result<[u8; 32], CryptoError> {
    derive_channel_key(channel_name, password)
}

/// Encrypt `plaintext` under a channel key, returning `nonce || ciphertext || tag`.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if the cipher rejects the key or
/// sealing fails.
pub fn seal(key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| CryptoError::InvalidKeyLength { expected: 32, actual: key.len() })?;
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::EncryptionFailed)?;
    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt bytes produced by [`seal`].
///
/// # Errors
///
/// Returns `CryptoError::DecryptionFailed` if the buffer is too short to
/// contain a nonce and tag, the key is wrong, or the ciphertext was
/// tampered with.
pub fn open(key: &[u8; 32], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| CryptoError::InvalidKeyLength { expected: 32, actual: key.len() })?;
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::DecryptionFailed)
}
