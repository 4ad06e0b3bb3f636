//! Concurrent table of known peers, keyed by ephemeral [`PeerId`].

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::device::DeviceFingerprint;
use crate::identity::{Fingerprint, PeerId};

/// A peer is considered stale and evicted after this long without activity.
pub const PEER_STALE_AFTER: Duration = Duration::from_secs(90);

/// What is known about a peer reachable on the mesh.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    /// Long-term identity fingerprint, once learned from a signed ANNOUNCE.
    pub fingerprint: Option<Fingerprint>,
    /// Hardware-anchored device fingerprint, self-reported in the same
    /// ANNOUNCE. Used to key anti-abuse state so a mute survives the sender
    /// regenerating their [`Fingerprint`].
    pub device_fingerprint: Option<DeviceFingerprint>,
    /// Display nickname, if announced.
    pub nickname: Option<String>,
    /// Last observed signal strength from the link layer.
    pub rssi: Option<i8>,
    /// Last time a frame was seen from this peer.
    pub last_seen: Instant,
    /// Link-layer identifier this peer was last seen on.
    pub link_id: u64,
}

impl PeerRecord {
    fn new(link_id: u64, rssi: Option<i8>) -> Self {
        Self {
            fingerprint: None,
            device_fingerprint: None,
            nickname: None,
            rssi,
            last_seen: Instant::now(),
            link_id,
        }
    }
}

/// Lock-free concurrent map from ephemeral peer id to what is known about
/// that peer, with periodic staleness sweeping.
#[derive(Default)]
pub struct PeerTable {
    peers: DashMap<PeerId, PeerRecord>,
}

impl PeerTable {
    /// Create an empty peer table.
    #[must_use]
    pub fn new() -> Self {
        Self { peers: DashMap::new() }
    }

    /// Record activity from `peer_id`, inserting a fresh record if unseen.
    pub fn observe(&self, peer_id: PeerId, link_id: u64, rssi: Option<i8>) {
        self.peers
            .entry(peer_id)
            .and_modify(|record| {
                record.last_seen = Instant::now();
                record.link_id = link_id;
                if rssi.is_some() {
                    record.rssi = rssi;
                }
            })
            .or_insert_with(|| PeerRecord::new(link_id, rssi));
    }

    /// Attach identity details learned from a verified ANNOUNCE.
    pub fn set_identity(
        &self,
        peer_id: PeerId,
        fingerprint: Fingerprint,
        device_fingerprint: DeviceFingerprint,
        nickname: Option<String>,
    ) {
        if let Some(mut record) = self.peers.get_mut(&peer_id) {
            record.fingerprint = Some(fingerprint);
            record.device_fingerprint = Some(device_fingerprint);
            record.nickname = nickname;
        }
    }

    /// Fetch a snapshot of a peer's record.
    #[must_use]
    pub fn get(&self, peer_id: &PeerId) -> Option<PeerRecord> {
        self.peers.get(peer_id).map(|entry| entry.clone())
    }

    /// Remove a peer, e.g. on an explicit LEAVE.
    pub fn remove(&self, peer_id: &PeerId) {
        self.peers.remove(peer_id);
    }

    /// Number of peers currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the table has no peers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Drop peers not seen within [`PEER_STALE_AFTER`], returning their ids.
    pub fn sweep_stale(&self) -> Vec<PeerId> {
        let mut evicted = Vec::new();
        self.peers.retain(|peer_id, record| {
            let stale = record.last_seen.elapsed() > PEER_STALE_AFTER;
            if stale {
                evicted.push(*peer_id);
            }
            !stale
        });
        evicted
    }

    /// All currently known peer ids.
    #[must_use]
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.iter().map(|entry| *entry.key()).collect()
    }
}
