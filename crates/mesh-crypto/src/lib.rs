//! # mesh-crypto
//!
//! Cryptographic primitives for the mesh transport core.
//!
//! This crate provides:
//! - `Noise_XX` handshake for mutual authentication (identity-bound via
//!   Ed25519 signatures carried in the handshake payload)
//! - AES-256-GCM transport record encryption with explicit monotonic nonces
//! - BLAKE3 hashing and key derivation
//! - Ed25519 signatures and Fingerprint derivation
//! - Argon2id channel key derivation and identity keyfile encryption at rest
//! - Secure random number generation
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm | Security Level |
//! |----------|-----------|----------------|
//! | Key Exchange | X25519 | 128-bit |
//! | Transport AEAD | AES-256-GCM | 256-bit key |
//! | Hash | BLAKE3 | 128-bit collision |
//! | KDF | HKDF-BLAKE3 | 128-bit |
//! | Signatures | Ed25519 | 128-bit |
//! | Channel/Keyfile Encryption | Argon2id + XChaCha20-Poly1305 | 256-bit |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod aead;
pub mod constant_time;
pub mod error;
pub mod hash;
pub mod keyfile;
pub mod noise;
pub mod random;
pub mod signatures;
pub mod x25519;

pub use error::CryptoError;

/// X25519 public key size
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// X25519 secret key size
pub const X25519_SECRET_KEY_SIZE: usize = 32;

/// AES-256-GCM key size
pub const AES256GCM_KEY_SIZE: usize = 32;

/// AES-256-GCM nonce size
pub const AES256GCM_NONCE_SIZE: usize = 12;

/// BLAKE3 output size
pub const BLAKE3_OUTPUT_SIZE: usize = 32;

/// Ed25519 public key size
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 secret key size
pub const ED25519_SECRET_KEY_SIZE: usize = 32;

/// Ed25519 signature size
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Session keys derived from handshake
#[derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct SessionKeys {
    /// Key for sending data
    pub send_key: [u8; 32],
    /// Key for receiving data
    pub recv_key: [u8; 32],
    /// Chain key for future rekeys off the same handshake transcript
    pub chain_key: [u8; 32],
}

impl SessionKeys {
    /// Derive a stable 8-byte session identifier from the chain key.
    #[must_use]
    pub fn derive_connection_id(&self) -> [u8; 8] {
        let hash = blake3::hash(&self.chain_key);
        let mut cid = [0u8; 8];
        cid.copy_from_slice(&hash.as_bytes()[..8]);
        cid
    }
}
