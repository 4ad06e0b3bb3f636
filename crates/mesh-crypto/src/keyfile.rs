//! Identity keyfile encryption and channel key derivation.
//!
//! Two distinct uses of Argon2id/AEAD live here:
//!
//! - [`IdentityKeyfile`] persists a node's long-term Ed25519 signing key and
//!   X25519 static key encrypted under a device-scoped key (not a user
//!   passphrase — the device key is provisioned by the host application, e.g.
//!   from an OS keychain, and handed to us as opaque bytes).
//! - [`derive_channel_key`] turns a channel name and a human passphrase into
//!   a symmetric key for channel message encryption; unlike the keyfile this
//!   is deliberately low-entropy-tolerant, which is why it goes through
//!   Argon2id rather than being used directly.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

const FORMAT_VERSION: u8 = 1;
const NONCE_SIZE: usize = 24;

/// Raw identity key material: an Ed25519 signing seed followed by an X25519
/// static private scalar, 64 bytes total.
pub const IDENTITY_KEY_MATERIAL_SIZE: usize = 64;

/// Argon2id parameters for channel key derivation.
///
/// Memory and iteration floors follow the same OWASP-class guidance as the
/// rest of the crate; parallelism is pinned to 1 so the same passphrase
/// produces the same key on every device regardless of core count.
const CHANNEL_KDF_MEMORY_KIB: u32 = 65536;
const CHANNEL_KDF_ITERATIONS: u32 = 3;
const CHANNEL_KDF_PARALLELISM: u32 = 1;

/// Derive a 32-byte channel encryption key from a channel name and passphrase.
///
/// The channel name itself is the Argon2 salt, unmodified, so that any
/// spec-conformant peer who knows the channel name and password derives the
/// identical key.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if Argon2 parameter construction or
/// hashing fails, including when `channel_name` is shorter than Argon2's
/// minimum salt length.
pub fn derive_channel_key(channel_name: &str, password: &str) -> Result<[u8; 32], CryptoError> {
    let salt = channel_name.as_bytes();
    let params = Params::new(
        CHANNEL_KDF_MEMORY_KIB,
        CHANNEL_KDF_ITERATIONS,
        CHANNEL_KDF_PARALLELISM,
        Some(32),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

/// Decrypted identity key material, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DecryptedIdentityKeys {
    material: [u8; IDENTITY_KEY_MATERIAL_SIZE],
}

impl DecryptedIdentityKeys {
    /// Build from a signing seed and a static X25519 private scalar.
    #[must_use]
    pub fn new(signing_seed: [u8; 32], x25519_secret: [u8; 32]) -> Self {
        let mut material = [0u8; IDENTITY_KEY_MATERIAL_SIZE];
        material[..32].copy_from_slice(&signing_seed);
        material[32..].copy_from_slice(&x25519_secret);
        Self { material }
    }

    /// The Ed25519 signing seed (first 32 bytes).
    #[must_use]
    pub fn signing_seed(&self) -> [u8; 32] {
        self.material[..32].try_into().unwrap()
    }

    /// The X25519 static private scalar (last 32 bytes).
    #[must_use]
    pub fn x25519_secret(&self) -> [u8; 32] {
        self.material[32..].try_into().unwrap()
    }
}

/// A node identity's private key material, encrypted at rest under a
/// device-scoped key supplied by the caller.
///
/// Holding onto both private keys for the process lifetime (and across
/// restarts, via this keyfile) is what lets a node re-announce the same
/// Fingerprint after a restart instead of minting a new identity every time.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentityKeyfile {
    version: u8,
    nonce: [u8; NONCE_SIZE],
    ciphertext: Vec<u8>,
}

impl IdentityKeyfile {
    /// Encrypt identity key material under a 32-byte device-scoped key.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RandomFailed` if nonce generation fails, or
    /// `CryptoError::EncryptionFailed` on an underlying cipher error.
    pub fn encrypt(
        keys: &DecryptedIdentityKeys,
        device_key: &[u8; 32],
    ) -> Result<Self, CryptoError> {
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce).map_err(|_| CryptoError::RandomFailed)?;

        let cipher = XChaCha20Poly1305::new_from_slice(device_key)
            .map_err(|_| CryptoError::InvalidKeyLength { expected: 32, actual: device_key.len() })?;
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), keys.material.as_slice())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(Self { version: FORMAT_VERSION, nonce, ciphertext })
    }

    /// Decrypt identity key material using the device-scoped key.
    ///
    /// A corrupt keyfile, a version mismatch, or a wrong device key all fail
    /// closed with `CryptoError::DecryptionFailed` — the caller is expected
    /// to fall back to generating a fresh identity rather than panicking.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::DecryptionFailed` on any failure to recover a
    /// validly-sized plaintext.
    pub fn decrypt(&self, device_key: &[u8; 32]) -> Result<DecryptedIdentityKeys, CryptoError> {
        if self.version != FORMAT_VERSION {
            return Err(CryptoError::DecryptionFailed);
        }
        let cipher = XChaCha20Poly1305::new_from_slice(device_key)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        let plaintext = cipher
            .decrypt(XNonce::from_slice(&self.nonce), self.ciphertext.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed)?;

        if plaintext.len() != IDENTITY_KEY_MATERIAL_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }
        let mut material = [0u8; IDENTITY_KEY_MATERIAL_SIZE];
        material.copy_from_slice(&plaintext);
        Ok(DecryptedIdentityKeys { material })
    }

    /// Serialize to bytes for storage on disk.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + NONCE_SIZE + self.ciphertext.len());
        bytes.push(self.version);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Parse from bytes previously produced by [`Self::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::DecryptionFailed` if the input is too short to
    /// contain a version byte and a nonce.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < 1 + NONCE_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }
        let version = bytes[0];
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[1..1 + NONCE_SIZE]);
        let ciphertext = bytes[1 + NONCE_SIZE..].to_vec();
        Ok(Self { version, nonce, ciphertext })
    }
}
