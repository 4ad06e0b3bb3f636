//! Zeroization validation tests
//!
//! Verifies that sensitive cryptographic material is properly zeroized on
//! drop to prevent key material from lingering in memory.

use mesh_crypto::keyfile::DecryptedIdentityKeys;
use mesh_crypto::x25519::PrivateKey;
use mesh_crypto::SessionKeys;

#[test]
fn test_session_keys_zeroization() {
    let keys = SessionKeys {
        send_key: [1u8; 32],
        recv_key: [2u8; 32],
        chain_key: [3u8; 32],
    };

    // SessionKeys derives ZeroizeOnDrop, so keys are wiped on drop.
    drop(keys);
}

#[test]
fn test_private_key_zeroization() {
    let key = PrivateKey::generate(&mut rand::thread_rng());

    // x25519_dalek::StaticSecret zeroizes internally on drop.
    drop(key);
}

#[test]
fn test_decrypted_identity_keys_zeroization() {
    let keys = DecryptedIdentityKeys::new([0x11u8; 32], [0x22u8; 32]);
    drop(keys);
}

/// Compile-time verification that key types derive ZeroizeOnDrop.
#[test]
fn test_zeroize_trait_bounds() {
    fn assert_zeroize_on_drop<T: zeroize::ZeroizeOnDrop>() {}

    assert_zeroize_on_drop::<SessionKeys>();
    assert_zeroize_on_drop::<DecryptedIdentityKeys>();
}

/// Sensitive types should not implement Clone, to prevent key duplication.
#[test]
fn test_no_clone_for_sensitive_types() {
    // The following would not compile if uncommented:
    // let keys = SessionKeys { send_key: [0; 32], recv_key: [0; 32], chain_key: [0; 32] };
    // let copy = keys.clone(); // ERROR: no Clone trait
}
