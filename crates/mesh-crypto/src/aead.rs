//! Transport AEAD session: AES-256-GCM with explicit monotonic nonces.
//!
//! The Noise handshake (see [`crate::noise`]) only negotiates keys; record
//! encryption after the handshake is this module's job, separately from
//! snow's own transport mode. Keeping the two separate lets the session
//! enforce the mesh transport's own nonce-monotonicity and rekey-threshold
//! invariants directly, rather than trusting a library's internal counter.

use crate::error::CryptoError;
use crate::SessionKeys;
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};

/// Nonce size for AES-256-GCM, in bytes.
pub const NONCE_SIZE: usize = 12;

/// AEAD authentication tag size, in bytes.
pub const TAG_SIZE: usize = 16;

/// Nonce counter value at which a session must rekey rather than continue.
///
/// The GCM nonce space is 2^96 but a 64-bit counter is plenty; the spec's
/// safety margin is the first 2^32 messages, well short of birthday bound
/// concerns for a single key.
const REKEY_THRESHOLD: u64 = 1 << 32;

/// One direction's AEAD cipher.
struct Direction {
    cipher: Aes256Gcm,
}

impl Direction {
    fn new(key: &[u8; 32]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher: Aes256Gcm::new_from_slice(key)
                .map_err(|_| CryptoError::InvalidKeyLength { expected: 32, actual: key.len() })?,
        })
    }
}

fn encode_nonce(counter: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[4..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

fn decode_counter(nonce: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&nonce[4..NONCE_SIZE]);
    u64::from_be_bytes(buf)
}

/// An established, bidirectional AEAD session produced by a completed
/// handshake. Implements `seal`/`open` from the crypto core's exposed
/// operations: nonces are a monotonic counter per direction, and a
/// received nonce at or below the high-water mark is rejected as a replay.
pub struct AeadSession {
    send: Direction,
    send_counter: u64,
    recv: Direction,
    recv_high_water: Option<u64>,
    rekey_required: bool,
}

impl AeadSession {
    /// Build a session from handshake-derived keys.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyLength` if either key is not 32 bytes
    /// (unreachable in practice since `SessionKeys` fields are fixed-size).
    pub fn new(keys: &SessionKeys) -> Result<Self, CryptoError> {
        Ok(Self {
            send: Direction::new(&keys.send_key)?,
            send_counter: 0,
            recv: Direction::new(&keys.recv_key)?,
            recv_high_water: None,
            rekey_required: false,
        })
    }

    /// Whether this session has crossed the rekey threshold and must not be
    /// used for further `seal` calls until a fresh handshake replaces it.
    #[must_use]
    pub fn rekey_required(&self) -> bool {
        self.rekey_required
    }

    /// Encrypt and authenticate `plaintext`, returning `nonce || ciphertext || tag`.
    ///
    /// `aad` is authenticated but not encrypted (e.g. the frame header).
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RekeyRequired` if the send counter has reached
    /// the rekey threshold; the caller must complete a new handshake before
    /// sealing again. Returns `CryptoError::EncryptionFailed` on an
    /// underlying cipher failure (should not happen with valid keys).
    pub fn seal(&mut self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if self.rekey_required {
            return Err(CryptoError::RekeyRequired);
        }

        let nonce_bytes = encode_nonce(self.send_counter);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .send
            .cipher
            .encrypt(nonce, Payload { msg: plaintext, aad })
            .map_err(|_| CryptoError::EncryptionFailed)?;

        self.send_counter += 1;
        if self.send_counter >= REKEY_THRESHOLD {
            self.rekey_required = true;
        }

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Verify and decrypt a `nonce || ciphertext || tag` blob produced by the
    /// peer's `seal`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidNonceLength` if the input is shorter
    /// than a nonce. Returns `CryptoError::ReplayDetected` if the embedded
    /// nonce counter is not strictly greater than the session's high-water
    /// mark. Returns `CryptoError::DecryptionFailed` on authentication
    /// failure (poisons the session per the propagation policy — the caller
    /// is expected to tear down the session on this error).
    pub fn open(&mut self, sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < NONCE_SIZE {
            return Err(CryptoError::InvalidNonceLength);
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let counter = decode_counter(nonce_bytes);

        if let Some(high_water) = self.recv_high_water {
            if counter <= high_water {
                return Err(CryptoError::ReplayDetected);
            }
        }

        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .recv
            .cipher
            .decrypt(nonce, Payload { msg: ciphertext, aad })
            .map_err(|_| CryptoError::DecryptionFailed)?;

        self.recv_high_water = Some(counter);
        if counter >= REKEY_THRESHOLD {
            self.rekey_required = true;
        }
        Ok(plaintext)
    }
}
