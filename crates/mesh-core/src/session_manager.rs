//! Per-peer Noise_XX handshake orchestration and established-session storage.
//!
//! Unlike a socket-oriented session manager, handshake progress here is
//! driven entirely by frames arriving through a [`crate::peer_actor::PeerActor`]
//! — there is no I/O loop to await. Each step is a pure, synchronous
//! transition: feed it a message, get back either a reply to send or a
//! completed session.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use mesh_crypto::aead::AeadSession;
use mesh_crypto::noise::{NoiseHandshake, NoiseKeypair};
use mesh_crypto::CryptoError;

use crate::identity::PeerId;

/// A session is rekeyed if it has been established this long, regardless of
/// traffic volume.
pub const SESSION_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

/// A handshake that has not completed within this long of starting is
/// abandoned.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

enum SessionState {
    /// We sent message 1 and are waiting for message 2.
    AwaitingResponse(NoiseHandshake, Instant),
    /// We sent message 2 and are waiting for message 3.
    AwaitingFinal(NoiseHandshake, Instant),
    /// Handshake complete; ready for transport traffic.
    Established(EstablishedSession),
}

struct EstablishedSession {
    aead: AeadSession,
    remote_static: [u8; 32],
    established_at: Instant,
}

/// Outcome of feeding a handshake message to the [`SessionManager`].
pub enum HandshakeStep {
    /// A reply must be sent back to the peer.
    Reply(Vec<u8>),
    /// The session is now established; no reply needed.
    Established,
    /// The session is established and also produced a reply to relay.
    EstablishedWithReply(Vec<u8>),
}

/// Errors from handshake or transport operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionManagerError {
    /// No session (established or in-progress) exists for this peer.
    #[error("no session for peer")]
    NoSession,
    /// The handshake failed to progress.
    #[error("handshake error: {0}")]
    Handshake(String),
    /// A crypto operation on an established session failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Tracks in-progress handshakes and established AEAD sessions, keyed by the
/// remote peer's ephemeral [`PeerId`].
pub struct SessionManager {
    local_keypair: NoiseKeypair,
    sessions: DashMap<PeerId, Mutex<SessionState>>,
    pending: DashMap<PeerId, Vec<u8>>,
}

impl SessionManager {
    /// Create a session manager bound to this node's static Noise keypair.
    #[must_use]
    pub fn new(local_keypair: NoiseKeypair) -> Self {
        Self { local_keypair, sessions: DashMap::new(), pending: DashMap::new() }
    }

    /// Queue plaintext to send to `peer_id` once its handshake completes,
    /// replacing any message already queued for that peer.
    pub fn queue_pending(&self, peer_id: PeerId, plaintext: Vec<u8>) {
        self.pending.insert(peer_id, plaintext);
    }

    /// Remove and return `peer_id`'s queued plaintext, if any.
    pub fn take_pending(&self, peer_id: &PeerId) -> Option<Vec<u8>> {
        self.pending.remove(peer_id).map(|(_, plaintext)| plaintext)
    }

    /// Begin a handshake as the initiator, returning message 1 to send.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying Noise state machine fails to build.
    pub fn initiate(&self, peer_id: PeerId) -> Result<Vec<u8>, SessionManagerError> {
        let mut handshake = NoiseHandshake::new_initiator(&self.local_keypair)
            .map_err(|e| SessionManagerError::Handshake(e.to_string()))?;
        let msg1 = handshake
            .write_message(&[])
            .map_err(|e| SessionManagerError::Handshake(e.to_string()))?;
        self.sessions.insert(peer_id, Mutex::new(SessionState::AwaitingResponse(handshake, Instant::now())));
        Ok(msg1)
    }

    /// Feed an incoming NOISE_HANDSHAKE message from `peer_id`.
    ///
    /// # Errors
    ///
    /// Returns `SessionManagerError::Handshake` if the message does not
    /// parse for the current state.
    pub fn handle_message(&self, peer_id: PeerId, message: &[u8]) -> Result<HandshakeStep, SessionManagerError> {
        if let Some(entry) = self.sessions.get(&peer_id) {
            let mut state = entry.lock().unwrap();
            return self.advance(&mut state, message);
        }

        // No entry: this is message 1 from a new peer, acting as responder.
        let mut handshake = NoiseHandshake::new_responder(&self.local_keypair)
            .map_err(|e| SessionManagerError::Handshake(e.to_string()))?;
        handshake
            .read_message(message)
            .map_err(|e| SessionManagerError::Handshake(e.to_string()))?;
        let msg2 = handshake
            .write_message(&[])
            .map_err(|e| SessionManagerError::Handshake(e.to_string()))?;
        self.sessions.insert(peer_id, Mutex::new(SessionState::AwaitingFinal(handshake, Instant::now())));
        Ok(HandshakeStep::Reply(msg2))
    }

    fn advance(&self, state: &mut SessionState, message: &[u8]) -> Result<HandshakeStep, SessionManagerError> {
        match std::mem::replace(state, SessionState::AwaitingResponse(dummy_handshake(), Instant::now())) {
            SessionState::AwaitingResponse(mut handshake, _started) => {
                handshake
                    .read_message(message)
                    .map_err(|e| SessionManagerError::Handshake(e.to_string()))?;
                let remote_static = handshake.get_remote_static();
                let msg3 = handshake
                    .write_message(&[])
                    .map_err(|e| SessionManagerError::Handshake(e.to_string()))?;
                let keys = handshake
                    .into_session_keys()
                    .map_err(|e| SessionManagerError::Handshake(e.to_string()))?;
                let aead = AeadSession::new(&keys)?;
                *state = SessionState::Established(EstablishedSession {
                    aead,
                    remote_static: remote_static.unwrap_or([0u8; 32]),
                    established_at: Instant::now(),
                });
                Ok(HandshakeStep::EstablishedWithReply(msg3))
            }
            SessionState::AwaitingFinal(mut handshake, _started) => {
                handshake
                    .read_message(message)
                    .map_err(|e| SessionManagerError::Handshake(e.to_string()))?;
                let remote_static = handshake.get_remote_static();
                let keys = handshake
                    .into_session_keys()
                    .map_err(|e| SessionManagerError::Handshake(e.to_string()))?;
                let aead = AeadSession::new(&keys)?;
                *state = SessionState::Established(EstablishedSession {
                    aead,
                    remote_static: remote_static.unwrap_or([0u8; 32]),
                    established_at: Instant::now(),
                });
                Ok(HandshakeStep::Established)
            }
            established @ SessionState::Established(_) => {
                *state = established;
                Err(SessionManagerError::Handshake("received handshake message for established session".into()))
            }
        }
    }

    /// Encrypt `plaintext` for `peer_id`'s established session.
    ///
    /// # Errors
    ///
    /// Returns `SessionManagerError::NoSession` if no established session
    /// exists, or a crypto error from the AEAD layer.
    pub fn seal(&self, peer_id: &PeerId, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, SessionManagerError> {
        let entry = self.sessions.get(peer_id).ok_or(SessionManagerError::NoSession)?;
        let mut state = entry.lock().unwrap();
        match &mut *state {
            SessionState::Established(session) => Ok(session.aead.seal(plaintext, aad)?),
            _ => Err(SessionManagerError::NoSession),
        }
    }

    /// Decrypt `sealed` bytes from `peer_id`'s established session.
    ///
    /// # Errors
    ///
    /// Returns `SessionManagerError::NoSession` if no established session
    /// exists, or a crypto error from the AEAD layer.
    pub fn open(&self, peer_id: &PeerId, sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, SessionManagerError> {
        let entry = self.sessions.get(peer_id).ok_or(SessionManagerError::NoSession)?;
        let mut state = entry.lock().unwrap();
        match &mut *state {
            SessionState::Established(session) => Ok(session.aead.open(sealed, aad)?),
            _ => Err(SessionManagerError::NoSession),
        }
    }

    /// Whether a fully established session exists for `peer_id`.
    #[must_use]
    pub fn is_established(&self, peer_id: &PeerId) -> bool {
        self.sessions
            .get(peer_id)
            .map(|entry| matches!(&*entry.lock().unwrap(), SessionState::Established(_)))
            .unwrap_or(false)
    }

    /// The peer's long-term static key, if its session has completed at
    /// least message 2/3 of the handshake.
    #[must_use]
    pub fn remote_static(&self, peer_id: &PeerId) -> Option<[u8; 32]> {
        self.sessions.get(peer_id).and_then(|entry| match &*entry.lock().unwrap() {
            SessionState::Established(session) => Some(session.remote_static),
            _ => None,
        })
    }

    /// Whether this peer's session should be rekeyed: either the AEAD
    /// counters are exhausted or it has simply aged out.
    #[must_use]
    pub fn needs_rekey(&self, peer_id: &PeerId) -> bool {
        self.sessions
            .get(peer_id)
            .map(|entry| match &*entry.lock().unwrap() {
                SessionState::Established(session) => {
                    session.aead.rekey_required() || session.established_at.elapsed() > SESSION_MAX_AGE
                }
                _ => false,
            })
            .unwrap_or(false)
    }

    /// Drop `peer_id`'s session entirely, e.g. before a fresh handshake.
    pub fn remove(&self, peer_id: &PeerId) {
        self.sessions.remove(peer_id);
    }

    /// Remove and return peers whose handshake has been in progress longer
    /// than [`HANDSHAKE_TIMEOUT`] without completing.
    pub fn sweep_timed_out(&self) -> Vec<PeerId> {
        let mut timed_out = Vec::new();
        self.sessions.retain(|peer_id, state| {
            let state = state.lock().unwrap();
            let expired = match &*state {
                SessionState::AwaitingResponse(_, started) | SessionState::AwaitingFinal(_, started) => {
                    started.elapsed() > HANDSHAKE_TIMEOUT
                }
                SessionState::Established(_) => false,
            };
            if expired {
                timed_out.push(*peer_id);
            }
            !expired
        });
        timed_out
    }

    /// Number of tracked sessions (handshaking or established).
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

fn dummy_handshake() -> NoiseHandshake {
    let keypair = NoiseKeypair::generate().expect("static keypair generation cannot fail");
    NoiseHandshake::new_initiator(&keypair).expect("initiator construction cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_manager() -> SessionManager {
        SessionManager::new(NoiseKeypair::generate().unwrap())
    }

    #[test]
    fn full_handshake_establishes_both_sides() {
        let alice = new_manager();
        let bob = new_manager();
        let alice_id: PeerId = [1u8; 8];
        let bob_id: PeerId = [2u8; 8];

        let msg1 = alice.initiate(bob_id).unwrap();
        let step = bob.handle_message(alice_id, &msg1).unwrap();
        let msg2 = match step {
            HandshakeStep::Reply(bytes) => bytes,
            _ => panic!("expected reply"),
        };

        let step = alice.handle_message(bob_id, &msg2).unwrap();
        let msg3 = match step {
            HandshakeStep::EstablishedWithReply(bytes) => bytes,
            _ => panic!("expected established with reply"),
        };
        assert!(alice.is_established(&bob_id));

        let step = bob.handle_message(alice_id, &msg3).unwrap();
        assert!(matches!(step, HandshakeStep::Established));
        assert!(bob.is_established(&alice_id));
    }

    #[test]
    fn established_sessions_exchange_encrypted_data() {
        let alice = new_manager();
        let bob = new_manager();
        let alice_id: PeerId = [1u8; 8];
        let bob_id: PeerId = [2u8; 8];

        let msg1 = alice.initiate(bob_id).unwrap();
        let msg2 = match bob.handle_message(alice_id, &msg1).unwrap() {
            HandshakeStep::Reply(bytes) => bytes,
            _ => unreachable!(),
        };
        let msg3 = match alice.handle_message(bob_id, &msg2).unwrap() {
            HandshakeStep::EstablishedWithReply(bytes) => bytes,
            _ => unreachable!(),
        };
        bob.handle_message(alice_id, &msg3).unwrap();

        let ciphertext = alice.seal(&bob_id, b"mesh payload", b"aad").unwrap();
        let plaintext = bob.open(&alice_id, &ciphertext, b"aad").unwrap();
        assert_eq!(plaintext, b"mesh payload");
    }

    #[test]
    fn seal_without_session_fails() {
        let manager = new_manager();
        let peer_id: PeerId = [9u8; 8];
        assert!(matches!(manager.seal(&peer_id, b"x", b""), Err(SessionManagerError::NoSession)));
    }

    #[test]
    fn pending_send_is_queued_once_and_cleared_on_take() {
        let manager = new_manager();
        let peer_id: PeerId = [5u8; 8];
        assert!(manager.take_pending(&peer_id).is_none());

        manager.queue_pending(peer_id, b"first".to_vec());
        manager.queue_pending(peer_id, b"second".to_vec());
        assert_eq!(manager.take_pending(&peer_id), Some(b"second".to_vec()));
        assert!(manager.take_pending(&peer_id).is_none());
    }

    #[test]
    fn stale_handshake_is_swept() {
        let alice = new_manager();
        let bob_id: PeerId = [2u8; 8];
        alice.initiate(bob_id).unwrap();
        assert_eq!(alice.session_count(), 1);

        if let Some(entry) = alice.sessions.get(&bob_id) {
            if let SessionState::AwaitingResponse(_, started) = &mut *entry.lock().unwrap() {
                *started = Instant::now() - HANDSHAKE_TIMEOUT - Duration::from_secs(1);
            }
        }

        let timed_out = alice.sweep_timed_out();
        assert_eq!(timed_out, vec![bob_id]);
        assert_eq!(alice.session_count(), 0);
    }
}
