//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors.
///
/// Maps onto the wire-level error taxonomy: `HandshakeFailed` closes a
/// session, `DecryptionFailed` poisons it, `ReplayDetected` is a silent
/// drop, and `RekeyRequired` is a signal rather than a user-visible failure.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD encryption failed
    #[error("encryption failed")]
    EncryptionFailed,

    /// AEAD decryption failed (authentication failure)
    #[error("decryption failed: authentication failure")]
    DecryptionFailed,

    /// Invalid key length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Invalid nonce length
    #[error("invalid nonce length")]
    InvalidNonceLength,

    /// Noise handshake error
    #[error("handshake error: {0}")]
    HandshakeFailed(String),

    /// Random number generation failed
    #[error("random number generation failed")]
    RandomFailed,

    /// A received nonce was not greater than the session's high-water mark.
    #[error("replay detected: nonce not strictly increasing")]
    ReplayDetected,

    /// The send or receive nonce counter is approaching exhaustion; the
    /// session must be rekeyed via a fresh handshake before it can be used
    /// again.
    #[error("nonce counter exhausted, rekey required")]
    RekeyRequired,

    /// Key derivation (Argon2id) failed, e.g. invalid parameters.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Signature verification failed or the signature bytes were malformed.
    #[error("invalid signature")]
    InvalidSignature,

    /// The given bytes do not represent a valid Ed25519 public key point.
    #[error("invalid public key")]
    InvalidPublicKey,
}
