//! Noise\_XX handshake protocol for mutual authentication with identity hiding.
//!
//! Implements the Noise\_XX pattern using the snow library:
//! - Pattern: `XX` (mutual authentication, identity hiding)
//! - DH: `25519` (Curve25519)
//! - Cipher: `ChaChaPoly` (handshake-only; transport records use the separate
//!   [`crate::aead`] module, not snow's transport mode)
//! - Hash: `BLAKE2s` (for snow compatibility; BLAKE3 for application KDF)
//!
//! ## Message Flow
//!
//! ```text
//! Message 1: Initiator → Responder: e
//! Message 2: Responder → Initiator: e, ee, s, es
//! Message 3: Initiator → Responder: s, se
//! ```
//!
//! After message 3, both parties have:
//! - Authenticated each other's static keys
//! - Established shared symmetric keys for encryption
//! - Perfect forward secrecy (ephemeral keys forgotten)
//!
//! The handshake is deliberately a pure state machine: `write_message`/
//! `read_message` take `&mut self` and never spawn tasks or block, so it can
//! be driven one step at a time from inside a serialized per-peer actor.

use crate::{CryptoError, SessionKeys};
use snow::{Builder, HandshakeState};
use zeroize::Zeroize;

/// Noise protocol pattern used by the mesh transport.
const NOISE_PATTERN: &str = "Noise_XX_25519_ChaChaPoly_BLAKE2s";

/// Maximum handshake message size.
/// Message 1: 32 (e) + 0 payload + 0 tag = 32 bytes
/// Message 2: 32 (e) + 32 (s) + 16 (tag) + 16 (tag) = 96 bytes
/// Message 3: 32 (s) + 16 (tag) + 16 (tag) = 64 bytes
/// Add buffer for optional payloads
const MAX_HANDSHAKE_MSG_SIZE: usize = 256;

/// Role in the Noise handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Initiates the handshake (sends message 1)
    Initiator,
    /// Responds to handshake (receives message 1)
    Responder,
}

/// State of the handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Initial state, ready to start
    Initial,
    /// After message 1 (initiator sent, responder received)
    Message1Complete,
    /// After message 2 (responder sent, initiator received)
    Message2Complete,
    /// Handshake complete, transport keys available
    Complete,
}

/// Error types for Noise operations.
#[derive(Debug, Clone)]
pub enum NoiseError {
    /// Invalid handshake state for this operation
    InvalidState,
    /// Handshake message was invalid
    InvalidMessage,
    /// Decryption failed (bad MAC or corrupted data)
    DecryptionFailed,
    /// Key derivation failed
    KeyDerivationFailed,
    /// Snow library error
    SnowError(String),
}

impl std::fmt::Display for NoiseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoiseError::InvalidState => write!(f, "Invalid handshake state"),
            NoiseError::InvalidMessage => write!(f, "Invalid handshake message"),
            NoiseError::DecryptionFailed => write!(f, "Decryption failed"),
            NoiseError::KeyDerivationFailed => write!(f, "Key derivation failed"),
            NoiseError::SnowError(e) => write!(f, "Snow error: {e}"),
        }
    }
}

impl std::error::Error for NoiseError {}

impl From<snow::Error> for NoiseError {
    fn from(e: snow::Error) -> Self {
        NoiseError::SnowError(e.to_string())
    }
}

impl From<NoiseError> for CryptoError {
    fn from(e: NoiseError) -> Self {
        CryptoError::HandshakeFailed(e.to_string())
    }
}

/// Static keypair for Noise handshakes.
///
/// This is the long-term identity key used across multiple sessions.
pub struct NoiseKeypair {
    private: Vec<u8>,
    public: [u8; 32],
}

impl NoiseKeypair {
    /// Generate a new random keypair.
    ///
    /// # Errors
    ///
    /// Returns `NoiseError::SnowError` if:
    /// - The Noise pattern string fails to parse (should not happen with valid constant)
    /// - Keypair generation fails due to RNG issues
    pub fn generate() -> Result<Self, NoiseError> {
        let builder = Builder::new(
            NOISE_PATTERN
                .parse()
                .map_err(|e| NoiseError::SnowError(format!("Pattern parse error: {e:?}")))?,
        );

        let keypair = builder
            .generate_keypair()
            .map_err(|e| NoiseError::SnowError(format!("Keypair generation error: {e:?}")))?;

        let mut public = [0u8; 32];
        public.copy_from_slice(&keypair.public);

        Ok(Self {
            private: keypair.private,
            public,
        })
    }

    /// Create from existing key bytes.
    ///
    /// # Errors
    ///
    /// This function is infallible for valid 32-byte input but returns `Result`
    /// for API consistency with `generate()`.
    pub fn from_bytes(private: [u8; 32]) -> Result<Self, NoiseError> {
        // Derive public key from private using X25519
        use crate::x25519::PrivateKey;

        let x25519_private = PrivateKey::from_bytes(private);
        let public = x25519_private.public_key().to_bytes();

        Ok(Self {
            private: private.to_vec(),
            public,
        })
    }

    /// Get the public key bytes.
    #[must_use]
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public
    }

    /// Get the private key bytes.
    ///
    /// # Security
    ///
    /// Handle with extreme care - this is the long-term identity key.
    #[must_use]
    pub fn private_key(&self) -> &[u8] {
        &self.private
    }
}

impl Drop for NoiseKeypair {
    fn drop(&mut self) {
        self.private.zeroize();
    }
}

impl Clone for NoiseKeypair {
    fn clone(&self) -> Self {
        Self {
            private: self.private.clone(),
            public: self.public,
        }
    }
}

/// `Noise_XX` handshake session.
///
/// Manages the 3-message handshake pattern for mutual authentication. This
/// is the concrete state machine behind `CryptoCore::initiate`/`step`: callers
/// drive it with `write_message`/`read_message` and never need to block or
/// spawn a task to make progress.
pub struct NoiseHandshake {
    state: HandshakeState,
    role: Role,
    phase: HandshakePhase,
}

impl NoiseHandshake {
    /// Create a new handshake as the initiator.
    ///
    /// The initiator sends the first message and must know their own static key.
    ///
    /// # Errors
    ///
    /// Returns `NoiseError::SnowError` if:
    /// - The Noise pattern string fails to parse
    /// - The local private key is invalid
    /// - Handshake state initialization fails
    pub fn new_initiator(local_keypair: &NoiseKeypair) -> Result<Self, NoiseError> {
        let builder = Builder::new(
            NOISE_PATTERN
                .parse()
                .map_err(|e| NoiseError::SnowError(format!("Pattern parse error: {e:?}")))?,
        );

        let state = builder
            .local_private_key(&local_keypair.private)
            .map_err(|e| NoiseError::SnowError(format!("Key error: {e:?}")))?
            .build_initiator()
            .map_err(|e| NoiseError::SnowError(format!("Build error: {e:?}")))?;

        Ok(Self {
            state,
            role: Role::Initiator,
            phase: HandshakePhase::Initial,
        })
    }

    /// Create a new handshake as the responder.
    ///
    /// The responder waits for the first message and must know their own static key.
    ///
    /// # Errors
    ///
    /// Returns `NoiseError::SnowError` if:
    /// - The Noise pattern string fails to parse
    /// - The local private key is invalid
    /// - Handshake state initialization fails
    pub fn new_responder(local_keypair: &NoiseKeypair) -> Result<Self, NoiseError> {
        let builder = Builder::new(
            NOISE_PATTERN
                .parse()
                .map_err(|e| NoiseError::SnowError(format!("Pattern parse error: {e:?}")))?,
        );

        let state = builder
            .local_private_key(&local_keypair.private)
            .map_err(|e| NoiseError::SnowError(format!("Key error: {e:?}")))?
            .build_responder()
            .map_err(|e| NoiseError::SnowError(format!("Build error: {e:?}")))?;

        Ok(Self {
            state,
            role: Role::Responder,
            phase: HandshakePhase::Initial,
        })
    }

    /// Get the current handshake phase.
    #[must_use]
    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    /// Get the role of this handshake.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Check if the handshake is complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == HandshakePhase::Complete
    }

    /// Write the next handshake message.
    ///
    /// Returns the message bytes to send to the peer.
    /// Optionally includes a payload (typically empty during handshake).
    ///
    /// # Errors
    ///
    /// Returns `NoiseError::InvalidState` if called in the wrong phase for the current role.
    /// Returns `NoiseError::SnowError` if the underlying snow library fails.
    pub fn write_message(&mut self, payload: &[u8]) -> Result<Vec<u8>, NoiseError> {
        match (self.role, self.phase) {
            (Role::Initiator, HandshakePhase::Initial | HandshakePhase::Message2Complete)
            | (Role::Responder, HandshakePhase::Message1Complete) => {}
            _ => return Err(NoiseError::InvalidState),
        }

        let mut message = vec![0u8; MAX_HANDSHAKE_MSG_SIZE];
        let len = self.state.write_message(payload, &mut message)?;
        message.truncate(len);

        self.phase = match self.phase {
            HandshakePhase::Initial => HandshakePhase::Message1Complete,
            HandshakePhase::Message1Complete => HandshakePhase::Message2Complete,
            HandshakePhase::Message2Complete | HandshakePhase::Complete => HandshakePhase::Complete,
        };

        Ok(message)
    }

    /// Read a handshake message from the peer.
    ///
    /// Returns any payload included in the message.
    ///
    /// # Errors
    ///
    /// Returns `NoiseError::InvalidState` if called in the wrong phase for the current role.
    /// Returns `NoiseError::SnowError` if decryption or verification fails.
    pub fn read_message(&mut self, message: &[u8]) -> Result<Vec<u8>, NoiseError> {
        match (self.role, self.phase) {
            (Role::Responder, HandshakePhase::Initial | HandshakePhase::Message2Complete)
            | (Role::Initiator, HandshakePhase::Message1Complete) => {}
            _ => return Err(NoiseError::InvalidState),
        }

        let mut payload = vec![0u8; MAX_HANDSHAKE_MSG_SIZE];
        let len = self.state.read_message(message, &mut payload)?;
        payload.truncate(len);

        self.phase = match self.phase {
            HandshakePhase::Initial => HandshakePhase::Message1Complete,
            HandshakePhase::Message1Complete => HandshakePhase::Message2Complete,
            HandshakePhase::Message2Complete | HandshakePhase::Complete => HandshakePhase::Complete,
        };

        Ok(payload)
    }

    /// Get the remote peer's static public key (available after message 2/3).
    #[must_use]
    pub fn get_remote_static(&self) -> Option<[u8; 32]> {
        self.state.get_remote_static().map(|key| {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(key);
            arr
        })
    }

    /// Complete the handshake and extract transport session keys.
    ///
    /// This extracts symmetric send/recv keys for the [`crate::aead`] session,
    /// rather than handing the caller snow's own transport mode: the mesh
    /// transport AEAD (AES-256-GCM, explicit monotonic counters) is a
    /// separate concern from the Noise handshake cipher.
    ///
    /// # Errors
    ///
    /// Returns `NoiseError::InvalidState` if the handshake is not yet complete.
    pub fn into_session_keys(self) -> Result<SessionKeys, NoiseError> {
        if self.phase != HandshakePhase::Complete {
            return Err(NoiseError::InvalidState);
        }

        // Get the handshake hash (h) for key derivation
        let h = self.state.get_handshake_hash();

        // Use BLAKE3 to derive separate keys from the handshake hash.
        // Both parties derive the SAME two directional keys, then assign based on role.
        let mut key_i_to_r = [0u8; 32];
        let mut key_r_to_i = [0u8; 32];
        let mut chain_key = [0u8; 32];

        derive_key(h, b"mesh_i_to_r", &mut key_i_to_r);
        derive_key(h, b"mesh_r_to_i", &mut key_r_to_i);
        derive_key(h, b"mesh_chain", &mut chain_key);

        let (send_key, recv_key) = match self.role {
            Role::Initiator => (key_i_to_r, key_r_to_i),
            Role::Responder => (key_r_to_i, key_i_to_r),
        };

        Ok(SessionKeys {
            send_key,
            recv_key,
            chain_key,
        })
    }
}

/// Derive a key using BLAKE3 keyed mode.
fn derive_key(ikm: &[u8], context: &[u8], output: &mut [u8; 32]) {
    use crate::hash::hkdf;
    hkdf(context, ikm, b"mesh-transport", output);
}
