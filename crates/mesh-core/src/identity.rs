//! Local node identity: long-term signing/DH keys plus the at-rest keyfile.

use mesh_crypto::keyfile::{DecryptedIdentityKeys, IdentityKeyfile};
use mesh_crypto::signatures::{SigningKey, VerifyingKey};
use mesh_crypto::x25519::{PrivateKey as X25519PrivateKey, PublicKey as X25519PublicKey};
use mesh_crypto::CryptoError;
use rand_core::OsRng;

use crate::frame::ID_SIZE;

/// Ephemeral identifier a peer advertises on the mesh. Derived fresh each
/// session, unlike the long-term [`Fingerprint`].
pub type PeerId = [u8; ID_SIZE];

/// Stable, long-term identity derived from a peer's static Ed25519 key.
pub type Fingerprint = [u8; 32];

/// The node's long-term cryptographic identity: an Ed25519 signing keypair
/// (identity, ANNOUNCE signatures) and an X25519 keypair (Noise static key).
pub struct Identity {
    signing_key: SigningKey,
    x25519_key: X25519PrivateKey,
    peer_id: PeerId,
}

impl Identity {
    /// Generate a fresh identity with a random peer id.
    #[must_use]
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let x25519_key = X25519PrivateKey::generate(&mut OsRng);
        let peer_id = random_peer_id();
        Self { signing_key, x25519_key, peer_id }
    }

    /// Restore an identity from decrypted keyfile material.
    pub fn from_decrypted(keys: &DecryptedIdentityKeys) -> Self {
        let signing_key = SigningKey::from_bytes(&keys.signing_seed());
        let x25519_key = X25519PrivateKey::from_bytes(keys.x25519_secret());
        let peer_id = random_peer_id();
        Self { signing_key, x25519_key, peer_id }
    }

    /// Encrypt this identity's long-term secrets for storage at rest.
    ///
    /// # Errors
    ///
    /// Propagates any failure from the underlying AEAD.
    pub fn to_keyfile(&self, device_key: &[u8; 32]) -> Result<IdentityKeyfile, CryptoError> {
        let decrypted = DecryptedIdentityKeys::new(self.signing_key.to_bytes(), self.x25519_key.to_bytes());
        IdentityKeyfile::encrypt(&decrypted, device_key)
    }

    /// This node's current ephemeral peer id.
    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Roll to a new ephemeral peer id, e.g. after rejoining the mesh.
    pub fn rotate_peer_id(&mut self) {
        self.peer_id = random_peer_id();
    }

    /// Long-term Ed25519 verifying key, used to compute this node's
    /// [`Fingerprint`] and to verify its own ANNOUNCE signatures.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Stable fingerprint derived from the Ed25519 identity key.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.verifying_key().fingerprint()
    }

    /// Sign a message with the long-term identity key (used for ANNOUNCE).
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        *self.signing_key.sign(message).as_bytes()
    }

    /// Static X25519 public key advertised for Noise handshakes.
    #[must_use]
    pub fn x25519_public_key(&self) -> X25519PublicKey {
        self.x25519_key.public_key()
    }

    /// Static X25519 private key, needed to drive a Noise handshake.
    #[must_use]
    pub fn x25519_private_key(&self) -> &X25519PrivateKey {
        &self.x25519_key
    }
}

fn random_peer_id() -> PeerId {
    use rand::RngCore;
    let mut id = [0u8; ID_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut id);
    id
}
