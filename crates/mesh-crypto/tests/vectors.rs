//! Cryptographic test vectors from official specifications.
//!
//! This module contains test vectors from:
//! - RFC 7748 (X25519)
//! - BLAKE3 official test vectors
//!
//! These vectors ensure our implementations match the specifications exactly.

use mesh_crypto::hash;
use mesh_crypto::x25519::{PrivateKey, PublicKey};

fn decode_hex(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

#[test]
fn test_x25519_rfc7748_vector_1() {
    // RFC 7748 Section 5.2 - Test Vector 1
    let alice_private =
        decode_hex("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a");
    let alice_public_expected =
        decode_hex("8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a");

    let bob_private =
        decode_hex("5dab087e624a8a4b79e17f8b83800ee66f3bb1292618b6fd1c2f8b27ff88e0eb");
    let bob_public_expected =
        decode_hex("de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f");

    let shared_expected =
        decode_hex("4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742");

    let mut alice_bytes = [0u8; 32];
    alice_bytes.copy_from_slice(&alice_private[..32]);
    let alice = PrivateKey::from_bytes(alice_bytes);
    let alice_public = alice.public_key();

    let mut bob_bytes = [0u8; 32];
    bob_bytes.copy_from_slice(&bob_private[..32]);
    let bob = PrivateKey::from_bytes(bob_bytes);
    let bob_public = bob.public_key();

    assert_eq!(alice_public.to_bytes().to_vec(), alice_public_expected[..32]);
    assert_eq!(bob_public.to_bytes().to_vec(), bob_public_expected[..32]);

    let alice_shared = alice.exchange(&bob_public).expect("DH exchange failed");
    let bob_shared = bob.exchange(&alice_public).expect("DH exchange failed");

    assert_eq!(alice_shared.as_bytes().to_vec(), shared_expected[..32]);
    assert_eq!(bob_shared.as_bytes().to_vec(), shared_expected[..32]);
}

#[test]
fn test_x25519_low_order_rejection() {
    let private = PrivateKey::generate(&mut rand_core::OsRng);

    let zero_public = PublicKey::from_bytes([0u8; 32]);
    assert!(private.exchange(&zero_public).is_none());
}

#[test]
fn test_blake3_empty() {
    let hash = hash::hash(b"");
    let expected = decode_hex("af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262");

    assert_eq!(hash.to_vec(), expected);
}

#[test]
fn test_blake3_kdf_separation() {
    let ikm = b"input key material";

    let kdf1 = hash::Kdf::new("context1");
    let kdf2 = hash::Kdf::new("context2");

    let key1 = kdf1.derive_key(ikm);
    let key2 = kdf2.derive_key(ikm);

    assert_ne!(key1, key2);
}

#[test]
fn test_blake3_hkdf() {
    let salt = b"salt";
    let ikm = b"input key material";
    let info = b"application info";

    let prk = hash::hkdf_extract(salt, ikm);

    let mut okm1 = [0u8; 64];
    let mut okm2 = [0u8; 64];

    hash::hkdf_expand(&prk, info, &mut okm1);
    hash::hkdf_expand(&prk, info, &mut okm2);

    assert_eq!(okm1, okm2);

    let mut okm3 = [0u8; 64];
    hash::hkdf_expand(&prk, b"different info", &mut okm3);
    assert_ne!(okm1, okm3);
}

#[test]
fn test_noise_xx_handshake_produces_matching_keys() {
    use mesh_crypto::noise::{NoiseHandshake, NoiseKeypair};

    let alice_static = NoiseKeypair::generate().unwrap();
    let bob_static = NoiseKeypair::generate().unwrap();

    let mut alice = NoiseHandshake::new_initiator(&alice_static).unwrap();
    let mut bob = NoiseHandshake::new_responder(&bob_static).unwrap();

    let msg1 = alice.write_message(&[]).unwrap();
    bob.read_message(&msg1).unwrap();

    let msg2 = bob.write_message(&[]).unwrap();
    alice.read_message(&msg2).unwrap();

    let msg3 = alice.write_message(&[]).unwrap();
    bob.read_message(&msg3).unwrap();

    assert!(alice.is_complete());
    assert!(bob.is_complete());

    let alice_keys = alice.into_session_keys().unwrap();
    let bob_keys = bob.into_session_keys().unwrap();

    assert_eq!(alice_keys.send_key, bob_keys.recv_key);
    assert_eq!(alice_keys.recv_key, bob_keys.send_key);
}

#[test]
fn test_full_crypto_pipeline() {
    use mesh_crypto::aead::AeadSession;
    use mesh_crypto::noise::{NoiseHandshake, NoiseKeypair};

    let alice_static = NoiseKeypair::generate().unwrap();
    let bob_static = NoiseKeypair::generate().unwrap();

    let mut alice_hs = NoiseHandshake::new_initiator(&alice_static).unwrap();
    let mut bob_hs = NoiseHandshake::new_responder(&bob_static).unwrap();

    let msg1 = alice_hs.write_message(b"").unwrap();
    bob_hs.read_message(&msg1).unwrap();

    let msg2 = bob_hs.write_message(b"").unwrap();
    alice_hs.read_message(&msg2).unwrap();

    let msg3 = alice_hs.write_message(b"").unwrap();
    bob_hs.read_message(&msg3).unwrap();

    let alice_keys = alice_hs.into_session_keys().unwrap();
    let bob_keys = bob_hs.into_session_keys().unwrap();

    let mut alice_session = AeadSession::new(&alice_keys).unwrap();
    let mut bob_session = AeadSession::new(&bob_keys).unwrap();

    let messages: [&[u8]; 3] = [b"Hello Bob!", b"How are you?", b"Mesh transport online"];

    for msg in messages {
        let ct = alice_session.seal(msg, b"").unwrap();
        let pt = bob_session.open(&ct, b"").unwrap();
        assert_eq!(pt, msg);
    }

    let reply = bob_session.seal(b"I'm great!", b"").unwrap();
    let decrypted = alice_session.open(&reply, b"").unwrap();
    assert_eq!(decrypted, b"I'm great!");
}

#[test]
fn test_constant_time_comparison() {
    use mesh_crypto::constant_time::{ct_eq, verify_32};

    let a = [0x42u8; 32];
    let b = [0x42u8; 32];
    let c = [0x43u8; 32];

    assert!(ct_eq(&a, &b));
    assert!(!ct_eq(&a, &c));

    assert!(verify_32(&a, &b));
    assert!(!verify_32(&a, &c));
}
