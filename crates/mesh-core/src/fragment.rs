//! Fragmentation and reassembly of oversized frames, plus optional payload
//! compression.
//!
//! Frames whose serialized form exceeds [`FRAGMENT_THRESHOLD`] bytes are
//! split into a sequence of FRAGMENT frames before being handed to the link
//! layer. Each chunk carries at most [`FRAGMENT_CHUNK_SIZE`] bytes of the
//! original serialized frame.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::RngCore;

use crate::error::DecodeError;
use crate::frame::{Frame, FrameType, ID_SIZE};

/// Serialized frames larger than this are fragmented.
pub const FRAGMENT_THRESHOLD: usize = 150;

/// Maximum payload bytes carried by a single fragment chunk.
pub const FRAGMENT_CHUNK_SIZE: usize = 140;

/// Maximum number of in-flight reassembly groups tracked per sender.
pub const MAX_GROUPS_PER_PEER: usize = 64;

/// A reassembly group is discarded if it has not completed within this long
/// of receiving its first chunk.
pub const FRAGMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum payload size eligible for compression.
pub const COMPRESSION_MIN_SIZE: usize = 100;

/// The payload of a FRAGMENT frame: one chunk of a larger serialized frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDescriptor {
    /// Groups chunks belonging to the same original frame.
    pub fragment_id: [u8; 8],
    /// Zero-based position of this chunk.
    pub index: u16,
    /// Total number of chunks in the group.
    pub total: u16,
    /// This chunk's bytes.
    pub chunk: Vec<u8>,
}

impl FragmentDescriptor {
    /// Encode as `fragment_id(8) ‖ index(2 BE) ‖ total(2 BE) ‖ chunk`.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12 + self.chunk.len());
        buf.extend_from_slice(&self.fragment_id);
        buf.extend_from_slice(&self.index.to_be_bytes());
        buf.extend_from_slice(&self.total.to_be_bytes());
        buf.extend_from_slice(&self.chunk);
        buf
    }

    /// Decode a fragment descriptor from a FRAGMENT frame's payload.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Truncated` if `data` is shorter than the fixed
    /// 12-byte descriptor header.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < 12 {
            return Err(DecodeError::Truncated);
        }
        let fragment_id: [u8; 8] = data[0..8].try_into().unwrap();
        let index = u16::from_be_bytes([data[8], data[9]]);
        let total = u16::from_be_bytes([data[10], data[11]]);
        let chunk = data[12..].to_vec();
        Ok(Self { fragment_id, index, total, chunk })
    }
}

/// Split a frame into one or more wire frames, fragmenting if its
/// serialized form exceeds [`FRAGMENT_THRESHOLD`].
///
/// Fragment ids are generated from the OS CSPRNG; the header fields of each
/// fragment frame (sender, ttl, timestamp) mirror the original frame so a
/// relay can apply TTL and dedup logic without reassembling.
#[must_use]
pub fn fragment_frame(frame: &Frame) -> Vec<Frame> {
    let serialized = frame.encode();
    if serialized.len() <= FRAGMENT_THRESHOLD {
        return vec![frame.clone()];
    }

    let mut fragment_id = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut fragment_id);

    let chunks: Vec<&[u8]> = serialized.chunks(FRAGMENT_CHUNK_SIZE).collect();
    let total = chunks.len() as u16;

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            let descriptor = FragmentDescriptor {
                fragment_id,
                index: index as u16,
                total,
                chunk: chunk.to_vec(),
            };
            Frame {
                version: frame.version,
                frame_type: FrameType::Fragment,
                ttl: frame.ttl,
                timestamp: frame.timestamp,
                sender_id: frame.sender_id,
                recipient_id: frame.recipient_id,
                payload: descriptor.encode(),
                signature: None,
                is_compressed: false,
            }
        })
        .collect()
}

struct FragmentGroup {
    total: u16,
    chunks: HashMap<u16, Vec<u8>>,
    first_seen: Instant,
}

/// Reassembles FRAGMENT frames back into their original serialized form.
///
/// Tracks at most [`MAX_GROUPS_PER_PEER`] concurrent groups per sender;
/// groups older than [`FRAGMENT_TIMEOUT`] are dropped silently on sweep.
/// A duplicate chunk index within a group is last-write-wins.
#[derive(Default)]
pub struct Reassembler {
    groups: HashMap<[u8; ID_SIZE], HashMap<[u8; 8], FragmentGroup>>,
}

impl Reassembler {
    /// Create an empty reassembler.
    #[must_use]
    pub fn new() -> Self {
        Self { groups: HashMap::new() }
    }

    /// Feed one fragment chunk from `sender_id`. Returns the reconstructed
    /// serialized frame once every chunk in the group has arrived.
    pub fn insert(&mut self, sender_id: [u8; ID_SIZE], descriptor: FragmentDescriptor) -> Option<Vec<u8>> {
        let peer_groups = self.groups.entry(sender_id).or_default();

        if !peer_groups.contains_key(&descriptor.fragment_id) && peer_groups.len() >= MAX_GROUPS_PER_PEER {
            let oldest = peer_groups
                .iter()
                .min_by_key(|(_, g)| g.first_seen)
                .map(|(id, _)| *id);
            if let Some(oldest_id) = oldest {
                peer_groups.remove(&oldest_id);
            }
        }

        let total = descriptor.total;
        let group = peer_groups.entry(descriptor.fragment_id).or_insert_with(|| FragmentGroup {
            total,
            chunks: HashMap::new(),
            first_seen: Instant::now(),
        });
        group.chunks.insert(descriptor.index, descriptor.chunk);

        if group.chunks.len() as u16 >= group.total {
            let group = peer_groups.remove(&descriptor.fragment_id).unwrap();
            let mut reassembled = Vec::new();
            for index in 0..group.total {
                match group.chunks.get(&index) {
                    Some(chunk) => reassembled.extend_from_slice(chunk),
                    None => return None,
                }
            }
            return Some(reassembled);
        }

        None
    }

    /// Drop groups that have not completed within [`FRAGMENT_TIMEOUT`] of
    /// their first chunk.
    pub fn sweep_expired(&mut self) {
        let now = Instant::now();
        for peer_groups in self.groups.values_mut() {
            peer_groups.retain(|_, group| now.duration_since(group.first_seen) < FRAGMENT_TIMEOUT);
        }
        self.groups.retain(|_, groups| !groups.is_empty());
    }

    /// Total number of incomplete reassembly groups across all senders.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.values().map(HashMap::len).sum()
    }
}

/// Compresses and decompresses frame payloads.
///
/// Implementations are expected to be stateless and cheap to construct;
/// `FrameCodec` holds one behind a trait object so the compression scheme
/// can be swapped without touching frame encode/decode logic.
pub trait Compressor: Send + Sync {
    /// Compress `data`, returning the compressed bytes.
    fn compress(&self, data: &[u8]) -> Vec<u8>;

    /// Decompress previously-compressed bytes.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Truncated` if `data` is not a valid compressed
    /// stream produced by the matching `compress`.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, DecodeError>;
}

/// LZ4 block compression with a prepended size, via `lz4_flex`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn compress(&self, data: &[u8]) -> Vec<u8> {
        lz4_flex::compress_prepend_size(data)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, DecodeError> {
        lz4_flex::decompress_size_prepended(data).map_err(|_| DecodeError::Truncated)
    }
}

/// Compress `payload` if it is at least [`COMPRESSION_MIN_SIZE`] bytes and
/// compression actually shrinks it. Returns `(bytes, is_compressed)`; the
/// `is_compressed` flag is authoritative on the wire, callers must not infer
/// compression from size alone.
#[must_use]
pub fn maybe_compress(payload: &[u8], compressor: &dyn Compressor) -> (Vec<u8>, bool) {
    if payload.len() < COMPRESSION_MIN_SIZE {
        return (payload.to_vec(), false);
    }
    let compressed = compressor.compress(payload);
    if compressed.len() < payload.len() {
        (compressed, true)
    } else {
        (payload.to_vec(), false)
    }
}
