//! Node-facing facade: wires the link layer, crypto sessions, routing, and
//! anti-abuse gate into a single mesh chat node.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use mesh_crypto::noise::NoiseKeypair;
use mesh_crypto::signatures::VerifyingKey;
use mesh_crypto::x25519::PublicKey as X25519PublicKey;
use tokio::sync::broadcast;

use crate::abuse::{AntiAbuseGate, Verdict};
use crate::channel;
use crate::config::MeshConfig;
use crate::device::DeviceFingerprint;
use crate::error::MeshError;
use crate::frame::{Frame, FrameType};
use crate::fragment::{fragment_frame, Lz4Compressor, Reassembler};
use crate::identity::{Fingerprint, Identity, PeerId};
use crate::link::{LinkId, LinkLayer};
use crate::peer_actor::PeerActor;
use crate::peer_table::PeerTable;
use crate::router::{RouteAction, Router};
use crate::session_manager::{HandshakeStep, SessionManager};
use crate::store_and_forward::StoreAndForward;

/// Events observers can subscribe to via [`MeshService::observe`].
#[derive(Debug, Clone)]
pub enum MeshEvent {
    /// A peer announced itself and its identity was verified.
    PeerJoined {
        /// The peer's ephemeral id.
        peer_id: PeerId,
        /// Their long-term identity fingerprint.
        fingerprint: Fingerprint,
        /// Their claimed nickname, if any.
        nickname: Option<String>,
    },
    /// A peer sent an explicit LEAVE.
    PeerLeft {
        /// The peer's ephemeral id.
        peer_id: PeerId,
    },
    /// A plaintext or decrypted message addressed to, or broadcast toward,
    /// this node.
    MessageReceived {
        /// Sender's ephemeral id.
        from: PeerId,
        /// Decoded UTF-8 content, lossily if the payload was not valid UTF-8.
        content: String,
    },
    /// A sender has been muted by the anti-abuse gate.
    SenderMuted {
        /// The muted sender's device fingerprint.
        device_fingerprint: DeviceFingerprint,
        /// How long the mute lasts.
        remaining: Duration,
    },
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

struct Shared<L: LinkLayer> {
    identity: Mutex<Identity>,
    device_fingerprint: DeviceFingerprint,
    nickname: Mutex<Option<String>>,
    link: Arc<L>,
    peers: PeerTable,
    sessions: SessionManager,
    router: Router,
    abuse: AntiAbuseGate,
    store: StoreAndForward,
    actors: DashMap<PeerId, PeerActor>,
    link_by_peer: DashMap<PeerId, LinkId>,
    reassembler: Mutex<Reassembler>,
    events: broadcast::Sender<MeshEvent>,
    running: AtomicBool,
}

/// A running (or not-yet-started) mesh chat node.
#[derive(Clone)]
pub struct MeshService<L: LinkLayer + 'static> {
    shared: Arc<Shared<L>>,
}

impl<L: LinkLayer + 'static> MeshService<L> {
    /// Build a service around an identity, configuration, and link layer.
    ///
    /// `device_fingerprint` is this host's hardware-anchored fingerprint
    /// (see [`crate::device::device_fingerprint`]), self-reported in every
    /// ANNOUNCE so remote peers can key anti-abuse state on it.
    ///
    /// Does not start processing until [`Self::start`] is called.
    #[must_use]
    pub fn new(
        identity: Identity,
        noise_keypair: NoiseKeypair,
        device_fingerprint: DeviceFingerprint,
        config: MeshConfig,
        link: Arc<L>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let shared = Arc::new(Shared {
            identity: Mutex::new(identity),
            device_fingerprint,
            nickname: Mutex::new(None),
            link,
            peers: PeerTable::new(),
            sessions: SessionManager::new(noise_keypair),
            router: Router::new(),
            abuse: AntiAbuseGate::open(config.abuse),
            store: StoreAndForward::new(),
            actors: DashMap::new(),
            link_by_peer: DashMap::new(),
            reassembler: Mutex::new(Reassembler::new()),
            events,
            running: AtomicBool::new(false),
        });
        Self { shared }
    }

    /// This node's current ephemeral peer id.
    #[must_use]
    pub fn my_peer_id(&self) -> PeerId {
        self.shared.identity.lock().unwrap().peer_id()
    }

    /// Subscribe to mesh events (messages, joins, leaves, mutes).
    #[must_use]
    pub fn observe(&self) -> broadcast::Receiver<MeshEvent> {
        self.shared.events.subscribe()
    }

    /// Set the nickname advertised in future ANNOUNCE frames.
    pub fn set_nickname(&self, nickname: impl Into<String>) {
        *self.shared.nickname.lock().unwrap() = Some(nickname.into());
    }

    /// Number of incomplete fragment reassembly groups currently held in
    /// memory, for diagnostics and tests of the housekeeping sweep.
    #[must_use]
    pub fn pending_fragment_groups(&self) -> usize {
        self.shared.reassembler.lock().unwrap().group_count()
    }

    /// Begin scanning/advertising and wire up inbound frame dispatch.
    ///
    /// # Errors
    ///
    /// Returns an error if the link layer fails to start.
    pub fn start(&self) -> Result<(), crate::link::LinkError> {
        self.shared.running.store(true, Ordering::Relaxed);

        let shared = self.shared.clone();
        self.shared.link.on_frame(Box::new(move |(link_id, rssi, bytes)| {
            let Ok(frame) = Frame::decode(&bytes) else {
                tracing::debug!("dropping undecodable frame from link {link_id}");
                return;
            };
            let sender_id = frame.sender_id;
            shared.peers.observe(sender_id, link_id, rssi);
            shared.link_by_peer.insert(sender_id, link_id);

            let actor_shared = shared.clone();
            let actor = shared.actors.entry(sender_id).or_insert_with(|| {
                PeerActor::spawn(sender_id, move |raw| {
                    let shared = actor_shared.clone();
                    async move { process_frame(&shared, &raw).await }
                })
            });
            actor.enqueue(bytes);
        }));

        self.shared.link.scan_and_advertise()?;
        spawn_housekeeping(self.shared.clone());
        Ok(())
    }

    /// Stop accepting new frames. In-flight frame processing finishes.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Relaxed);
        for actor in self.shared.actors.iter() {
            actor.stop();
        }
    }

    /// Broadcast a signed ANNOUNCE carrying this node's identity keys and
    /// nickname.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery to any connected neighbor fails; other
    /// neighbors are still attempted.
    pub fn send_broadcast_announce(&self) -> Result<(), MeshError> {
        let identity = self.shared.identity.lock().unwrap();
        let nickname = self.shared.nickname.lock().unwrap().clone().unwrap_or_default();

        let mut payload = Vec::new();
        payload.extend_from_slice(&identity.verifying_key().to_bytes());
        payload.extend_from_slice(identity.x25519_public_key().as_bytes());
        payload.extend_from_slice(&self.shared.device_fingerprint);
        payload.extend_from_slice(nickname.as_bytes());

        let signature = identity.sign(&payload);
        let mut frame = Frame::new(FrameType::Announce, identity.peer_id(), None, now_ms(), payload);
        frame.signature = Some(signature);
        drop(identity);

        self.flood(frame)
    }

    /// Send a public (unencrypted, broadcast) chat message.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery to any connected neighbor fails.
    pub fn send_public(&self, content: &str) -> Result<(), MeshError> {
        let peer_id = self.my_peer_id();
        let frame = Frame::new(FrameType::Message, peer_id, None, now_ms(), content.as_bytes().to_vec());
        self.flood(frame)
    }

    /// Send an end-to-end encrypted private message to `recipient`.
    ///
    /// If no session is established yet, a handshake is initiated and the
    /// message is queued to flush the moment that session reaches
    /// `Established`. If the handshake does not complete within
    /// [`crate::session_manager::HANDSHAKE_TIMEOUT`], the queued message
    /// falls through to store-and-forward instead (see
    /// [`spawn_housekeeping`]).
    ///
    /// # Errors
    ///
    /// Returns an error if delivery to any connected neighbor fails, or
    /// [`MeshError::NoSession`] if no session exists yet and a handshake
    /// could not even be initiated.
    pub fn send_private(&self, recipient: PeerId, content: &str) -> Result<(), MeshError> {
        let peer_id = self.my_peer_id();

        if self.shared.sessions.is_established(&recipient) {
            let aad = aad_for(&peer_id, &recipient);
            if let Ok(ciphertext) = self.shared.sessions.seal(&recipient, content.as_bytes(), &aad) {
                let frame =
                    Frame::new(FrameType::NoiseEncrypted, peer_id, Some(recipient), now_ms(), ciphertext);
                return self.flood(frame);
            }
        }

        let handshake_msg = self.shared.sessions.initiate(recipient).map_err(|_| MeshError::NoSession)?;
        self.shared.sessions.queue_pending(recipient, content.as_bytes().to_vec());
        let frame = Frame::new(FrameType::NoiseHandshake, peer_id, Some(recipient), now_ms(), handshake_msg);
        self.flood(frame)
    }

    /// Broadcast a message encrypted under a password-derived channel key.
    ///
    /// # Errors
    ///
    /// Returns an error if key derivation, encryption, or delivery fails.
    pub fn send_channel_encrypted(
        &self,
        channel_name: &str,
        password: &str,
        content: &str,
    ) -> Result<(), MeshError> {
        let peer_id = self.my_peer_id();
        let key = match channel::channel_key(channel_name, password) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!("channel key derivation failed: {e}");
                return Ok(());
            }
        };
        let sealed = match channel::seal(&key, content.as_bytes(), channel_name.as_bytes()) {
            Ok(sealed) => sealed,
            Err(e) => {
                tracing::warn!("channel encryption failed: {e}");
                return Ok(());
            }
        };
        let frame = Frame::new(FrameType::Message, peer_id, None, now_ms(), sealed);
        self.flood(frame)
    }

    fn flood(&self, frame: Frame) -> Result<(), MeshError> {
        flood_frame(&self.shared, frame)
    }
}

fn flood_frame<L: LinkLayer + 'static>(shared: &Arc<Shared<L>>, mut frame: Frame) -> Result<(), MeshError> {
    let compressor = Lz4Compressor;
    let (payload, is_compressed) = crate::fragment::maybe_compress(&frame.payload, &compressor);
    frame.payload = payload;
    frame.is_compressed = is_compressed;

    let fragments = fragment_frame(&frame);
    let neighbors = shared.link.connected_neighbors();
    let mut last_err = None;
    for fragment in &fragments {
        let bytes = fragment.encode();
        for &neighbor in &neighbors {
            if let Err(e) = shared.link.send(neighbor, &bytes) {
                last_err = Some(e);
            }
        }
    }
    last_err.map_or(Ok(()), |e| Err(MeshError::Link(e.to_string())))
}

fn aad_for(sender: &PeerId, recipient: &PeerId) -> Vec<u8> {
    let mut aad = Vec::with_capacity(16);
    aad.extend_from_slice(sender);
    aad.extend_from_slice(recipient);
    aad
}

async fn process_frame<L: LinkLayer + 'static>(shared: &Arc<Shared<L>>, raw: &[u8]) {
    let Ok(frame) = Frame::decode(raw) else {
        return;
    };

    match frame.frame_type {
        FrameType::Announce => handle_announce(shared, &frame),
        FrameType::Leave => {
            shared.peers.remove(&frame.sender_id);
            let _ = shared.events.send(MeshEvent::PeerLeft { peer_id: frame.sender_id });
        }
        FrameType::Fragment => handle_fragment(shared, &frame),
        FrameType::Message | FrameType::NoiseEncrypted | FrameType::NoiseHandshake => {
            handle_routable(shared, frame)
        }
    }
}

fn handle_handshake<L: LinkLayer + 'static>(shared: &Arc<Shared<L>>, frame: &Frame) {
    let Ok(step) = shared.sessions.handle_message(frame.sender_id, &frame.payload) else {
        return;
    };
    let established = matches!(step, HandshakeStep::Established | HandshakeStep::EstablishedWithReply(_));
    let reply = match step {
        HandshakeStep::Reply(bytes) | HandshakeStep::EstablishedWithReply(bytes) => Some(bytes),
        HandshakeStep::Established => None,
    };
    if let Some(reply) = reply {
        let my_peer_id = shared.identity.lock().unwrap().peer_id();
        let reply_frame =
            Frame::new(FrameType::NoiseHandshake, my_peer_id, Some(frame.sender_id), now_ms(), reply);
        if let Some(link_id) = shared.link_by_peer.get(&frame.sender_id) {
            let _ = shared.link.send(*link_id, &reply_frame.encode());
        }
    }

    if established {
        flush_pending_send(shared, frame.sender_id);
    }
}

/// Send a message queued by [`MeshService::send_private`] now that its
/// session with `peer_id` has reached `Established`.
fn flush_pending_send<L: LinkLayer + 'static>(shared: &Arc<Shared<L>>, peer_id: PeerId) {
    let Some(plaintext) = shared.sessions.take_pending(&peer_id) else {
        return;
    };
    let my_peer_id = shared.identity.lock().unwrap().peer_id();
    let aad = aad_for(&my_peer_id, &peer_id);
    let Ok(ciphertext) = shared.sessions.seal(&peer_id, &plaintext, &aad) else {
        return;
    };
    let frame = Frame::new(FrameType::NoiseEncrypted, my_peer_id, Some(peer_id), now_ms(), ciphertext);
    let _ = flood_frame(shared, frame);
}

fn handle_announce<L: LinkLayer + 'static>(shared: &Arc<Shared<L>>, frame: &Frame) {
    if frame.payload.len() < 96 {
        return;
    }
    let mut verifying_bytes = [0u8; 32];
    verifying_bytes.copy_from_slice(&frame.payload[..32]);
    let Ok(verifying_key) = VerifyingKey::from_bytes(&verifying_bytes) else {
        return;
    };
    let Some(signature) = frame.signature else {
        return;
    };
    let sig = mesh_crypto::signatures::Signature::from_bytes(signature);
    if verifying_key.verify(&frame.payload, &sig).is_err() {
        return;
    }

    let mut x25519_bytes = [0u8; 32];
    x25519_bytes.copy_from_slice(&frame.payload[32..64]);
    let _remote_x25519 = X25519PublicKey::from_bytes(x25519_bytes);

    let mut device_fingerprint: DeviceFingerprint = [0u8; 32];
    device_fingerprint.copy_from_slice(&frame.payload[64..96]);

    let nickname = String::from_utf8_lossy(&frame.payload[96..]).to_string();
    let nickname = if nickname.is_empty() { None } else { Some(nickname) };
    let fingerprint = verifying_key.fingerprint();

    shared.peers.set_identity(frame.sender_id, fingerprint, device_fingerprint, nickname.clone());
    let _ = shared.events.send(MeshEvent::PeerJoined { peer_id: frame.sender_id, fingerprint, nickname });

    drain_store_for_peer(shared, frame.sender_id, &fingerprint);
}

/// Replay any frames queued in store-and-forward for `fingerprint` now that
/// `peer_id` has been observed directly.
fn drain_store_for_peer<L: LinkLayer + 'static>(shared: &Arc<Shared<L>>, peer_id: PeerId, fingerprint: &Fingerprint) {
    for queued in shared.store.drain(fingerprint) {
        if let Some(link_id) = shared.link_by_peer.get(&peer_id) {
            let _ = shared.link.send(*link_id, &queued.encode());
        }
    }
}

fn handle_fragment<L: LinkLayer + 'static>(shared: &Arc<Shared<L>>, frame: &Frame) {
    let Ok(descriptor) = crate::fragment::FragmentDescriptor::decode(&frame.payload) else {
        return;
    };
    let reassembled = {
        let mut reassembler = shared.reassembler.lock().unwrap();
        reassembler.insert(frame.sender_id, descriptor)
    };
    if let Some(bytes) = reassembled {
        if let Ok(inner) = Frame::decode(&bytes) {
            handle_routable(shared, inner);
        }
    }
}

fn handle_routable<L: LinkLayer + 'static>(shared: &Arc<Shared<L>>, frame: Frame) {
    let my_peer_id = shared.identity.lock().unwrap().peer_id();
    let peers = &shared.peers;
    let action = shared.router.route(frame, &my_peer_id, |candidate| {
        peers.get(candidate).is_some()
    });

    match action {
        RouteAction::Drop => {}
        RouteAction::DeliverLocal(frame) => {
            deliver_local(shared, &frame);
        }
        RouteAction::DeliverAndRelay(frame) => {
            if deliver_local(shared, &frame) {
                relay(shared, &frame);
            }
        }
        RouteAction::RelayOnly(frame) => relay(shared, &frame),
    }
}

/// Process a frame addressed to (or broadcast toward) this node.
///
/// Returns whether the caller should still relay the frame onward. A muted
/// sender's frame is dropped here before it ever reaches the relay decision,
/// so the mute is silent at the wire level: the frame is not forwarded and
/// no rejection is announced to the network.
fn deliver_local<L: LinkLayer + 'static>(shared: &Arc<Shared<L>>, frame: &Frame) -> bool {
    if frame.frame_type == FrameType::NoiseHandshake {
        handle_handshake(shared, frame);
        return true;
    }

    let content = match frame.frame_type {
        FrameType::NoiseEncrypted => {
            let my_peer_id = shared.identity.lock().unwrap().peer_id();
            let aad = aad_for(&frame.sender_id, &my_peer_id);
            match shared.sessions.open(&frame.sender_id, &frame.payload, &aad) {
                Ok(plaintext) => String::from_utf8_lossy(&plaintext).to_string(),
                Err(_) => return true,
            }
        }
        _ => String::from_utf8_lossy(&frame.payload).to_string(),
    };

    if let Some(record) = shared.peers.get(&frame.sender_id) {
        if let Some(device_fingerprint) = record.device_fingerprint {
            match shared.abuse.evaluate(device_fingerprint, &content) {
                Verdict::Allow => {}
                Verdict::Warn(_) => {}
                Verdict::Muted { remaining, .. } => {
                    let _ = shared.events.send(MeshEvent::SenderMuted { device_fingerprint, remaining });
                    return false;
                }
            }
        }
    }

    let _ = shared.events.send(MeshEvent::MessageReceived { from: frame.sender_id, content });
    true
}

fn relay<L: LinkLayer + 'static>(shared: &Arc<Shared<L>>, frame: &Frame) {
    let bytes = frame.encode();
    let exclude = shared.link_by_peer.get(&frame.sender_id).map(|entry| *entry);
    for neighbor in shared.link.connected_neighbors() {
        if Some(neighbor) == exclude {
            continue;
        }
        let _ = shared.link.send(neighbor, &bytes);
    }
}

fn spawn_housekeeping<L: LinkLayer + 'static>(shared: Arc<Shared<L>>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        while shared.running.load(Ordering::Relaxed) {
            interval.tick().await;
            shared.peers.sweep_stale();
            let timed_out = shared.sessions.sweep_timed_out();
            for peer_id in timed_out {
                move_timed_out_send_to_store(&shared, peer_id);
            }
            shared.store.sweep_expired();
            shared.reassembler.lock().unwrap().sweep_expired();
        }
    });
}

/// A handshake that did not complete within
/// [`crate::session_manager::HANDSHAKE_TIMEOUT`] fails; any message queued
/// for that recipient via [`MeshService::send_private`] falls through to
/// store-and-forward instead of being silently dropped.
fn move_timed_out_send_to_store<L: LinkLayer + 'static>(shared: &Arc<Shared<L>>, peer_id: PeerId) {
    let Some(plaintext) = shared.sessions.take_pending(&peer_id) else {
        return;
    };
    let Some(record) = shared.peers.get(&peer_id) else {
        return;
    };
    let Some(fingerprint) = record.fingerprint else {
        return;
    };
    let my_peer_id = shared.identity.lock().unwrap().peer_id();
    let frame = Frame::new(FrameType::Message, my_peer_id, Some(peer_id), now_ms(), plaintext);
    shared.store.enqueue(fingerprint, frame);
}
