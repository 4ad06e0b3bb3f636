//! Frame encoding and decoding for the mesh wire protocol.
//!
//! All multi-byte fields are big-endian (network byte order). Wire
//! compatibility with the reference implementation is load-bearing: field
//! order and widths here must not change without a version bump.

use crate::error::DecodeError;

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Size of an Ed25519 signature, as carried on ANNOUNCE frames.
pub const SIGNATURE_SIZE: usize = 64;

/// Size of a `PeerId`/sender/recipient identifier, in bytes.
pub const ID_SIZE: usize = 8;

/// Wire frame types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Signed broadcast of a peer's static keys, nickname, and capabilities.
    Announce = 0x01,
    /// Peer is leaving the mesh.
    Leave = 0x02,
    /// Public or private chat message.
    Message = 0x03,
    /// A piece of a larger frame; see [`crate::fragment`].
    Fragment = 0x04,
    /// Opaque Noise handshake blob.
    NoiseHandshake = 0x05,
    /// AEAD ciphertext over a nested MESSAGE frame.
    NoiseEncrypted = 0x06,
}

impl TryFrom<u8> for FrameType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Announce),
            0x02 => Ok(Self::Leave),
            0x03 => Ok(Self::Message),
            0x04 => Ok(Self::Fragment),
            0x05 => Ok(Self::NoiseHandshake),
            0x06 => Ok(Self::NoiseEncrypted),
            other => Err(DecodeError::InvalidFrameType(other)),
        }
    }
}

/// Frame header flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// `recipient_id` is present.
    pub const HAS_RECIPIENT: u8 = 0b0000_0001;
    /// `signature` is present.
    pub const HAS_SIGNATURE: u8 = 0b0000_0010;
    /// Payload is LZ4-compressed.
    pub const IS_COMPRESSED: u8 = 0b0000_0100;
    /// Payload is a fragment descriptor, not a full frame payload.
    pub const IS_FRAGMENT: u8 = 0b0000_1000;

    const KNOWN: u8 = Self::HAS_RECIPIENT | Self::HAS_SIGNATURE | Self::IS_COMPRESSED | Self::IS_FRAGMENT;

    fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        if byte & !Self::KNOWN != 0 {
            return Err(DecodeError::InvalidFlags);
        }
        Ok(Self(byte))
    }

    fn set(&mut self, bit: u8, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    /// Whether `recipient_id` is present.
    #[must_use]
    pub fn has_recipient(&self) -> bool {
        self.0 & Self::HAS_RECIPIENT != 0
    }

    /// Whether `signature` is present.
    #[must_use]
    pub fn has_signature(&self) -> bool {
        self.0 & Self::HAS_SIGNATURE != 0
    }

    /// Whether the payload is LZ4-compressed.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.0 & Self::IS_COMPRESSED != 0
    }

    /// Whether the payload is a fragment descriptor.
    #[must_use]
    pub fn is_fragment(&self) -> bool {
        self.0 & Self::IS_FRAGMENT != 0
    }

    #[must_use]
    fn as_u8(&self) -> u8 {
        self.0
    }
}

/// The all-zero recipient id, meaning "broadcast".
pub const BROADCAST_ID: [u8; ID_SIZE] = [0u8; ID_SIZE];

/// Initial TTL applied to freshly originated frames.
pub const INITIAL_TTL: u8 = 7;

/// A decoded or to-be-encoded mesh wire frame (§3 "Frame").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Wire protocol version this frame was built with.
    pub version: u8,
    /// Frame type.
    pub frame_type: FrameType,
    /// Hops remaining; decremented on each relay, dropped at 0.
    pub ttl: u8,
    /// Sender's monotonic clock, milliseconds.
    pub timestamp: u64,
    /// Ephemeral id of the originating peer.
    pub sender_id: [u8; ID_SIZE],
    /// Destination, or `None` for broadcast.
    pub recipient_id: Option<[u8; ID_SIZE]>,
    /// Frame body. Semantics depend on `frame_type`.
    pub payload: Vec<u8>,
    /// Present on ANNOUNCE frames.
    pub signature: Option<[u8; SIGNATURE_SIZE]>,
    /// Whether `payload` is LZ4-compressed on the wire.
    pub is_compressed: bool,
}

impl Frame {
    /// Build a new frame with the default initial TTL and no signature.
    #[must_use]
    pub fn new(
        frame_type: FrameType,
        sender_id: [u8; ID_SIZE],
        recipient_id: Option<[u8; ID_SIZE]>,
        timestamp: u64,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            frame_type,
            ttl: INITIAL_TTL,
            timestamp,
            sender_id,
            recipient_id,
            payload,
            signature: None,
            is_compressed: false,
        }
    }

    /// Encode this frame to its wire representation.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut flags = FrameFlags::default();
        flags.set(FrameFlags::HAS_RECIPIENT, self.recipient_id.is_some());
        flags.set(FrameFlags::HAS_SIGNATURE, self.signature.is_some());
        flags.set(FrameFlags::IS_COMPRESSED, self.is_compressed);
        flags.set(FrameFlags::IS_FRAGMENT, self.frame_type == FrameType::Fragment);

        let mut buf = Vec::with_capacity(13 + ID_SIZE * 2 + self.payload.len() + SIGNATURE_SIZE);
        buf.push(self.version);
        buf.push(self.frame_type as u8);
        buf.push(self.ttl);
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.push(flags.as_u8());
        buf.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.sender_id);
        if let Some(recipient) = self.recipient_id {
            buf.extend_from_slice(&recipient);
        }
        buf.extend_from_slice(&self.payload);
        if let Some(sig) = self.signature {
            buf.extend_from_slice(&sig);
        }
        buf
    }

    /// Decode a frame from its wire representation.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Truncated` if the buffer is shorter than the
    /// header plus declared payload (and optional recipient/signature).
    /// Returns `DecodeError::VersionMismatch` if the version byte does not
    /// match [`PROTOCOL_VERSION`]. Returns `DecodeError::InvalidFlags` if
    /// unknown flag bits are set, or `DecodeError::InvalidFrameType` for an
    /// unrecognized type byte.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        const FIXED_HEADER: usize = 1 + 1 + 1 + 8 + 1 + 2 + ID_SIZE;
        if data.len() < FIXED_HEADER {
            return Err(DecodeError::Truncated);
        }

        let version = data[0];
        if version != PROTOCOL_VERSION {
            return Err(DecodeError::VersionMismatch);
        }
        let frame_type = FrameType::try_from(data[1])?;
        let ttl = data[2];
        let timestamp = u64::from_be_bytes(data[3..11].try_into().unwrap());
        let flags = FrameFlags::from_byte(data[11])?;
        let payload_len = u16::from_be_bytes([data[12], data[13]]) as usize;

        let mut offset = 14;
        let sender_id: [u8; ID_SIZE] = data
            .get(offset..offset + ID_SIZE)
            .ok_or(DecodeError::Truncated)?
            .try_into()
            .unwrap();
        offset += ID_SIZE;

        let recipient_id = if flags.has_recipient() {
            let r: [u8; ID_SIZE] = data
                .get(offset..offset + ID_SIZE)
                .ok_or(DecodeError::Truncated)?
                .try_into()
                .unwrap();
            offset += ID_SIZE;
            Some(r)
        } else {
            None
        };

        let payload = data
            .get(offset..offset + payload_len)
            .ok_or(DecodeError::Truncated)?
            .to_vec();
        offset += payload_len;

        let signature = if flags.has_signature() {
            let sig: [u8; SIGNATURE_SIZE] = data
                .get(offset..offset + SIGNATURE_SIZE)
                .ok_or(DecodeError::Truncated)?
                .try_into()
                .unwrap();
            Some(sig)
        } else {
            None
        };

        Ok(Self {
            version,
            frame_type,
            ttl,
            timestamp,
            sender_id,
            recipient_id,
            payload,
            signature,
            is_compressed: flags.is_compressed(),
        })
    }

    /// The dedup key per §4.5: `BLAKE3(type ‖ sender_id ‖ timestamp ‖ first 32 bytes of payload)`.
    #[must_use]
    pub fn dedup_key(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[self.frame_type as u8]);
        hasher.update(&self.sender_id);
        hasher.update(&self.timestamp.to_be_bytes());
        let prefix_len = self.payload.len().min(32);
        hasher.update(&self.payload[..prefix_len]);
        *hasher.finalize().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame::new(FrameType::Message, [1u8; ID_SIZE], None, 1_000, b"hello mesh".to_vec())
    }

    #[test]
    fn roundtrip_basic() {
        let frame = sample_frame();
        let bytes = frame.encode();
        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn roundtrip_with_recipient_and_signature() {
        let mut frame = sample_frame();
        frame.recipient_id = Some([2u8; ID_SIZE]);
        frame.signature = Some([0x42u8; SIGNATURE_SIZE]);
        frame.frame_type = FrameType::Announce;

        let bytes = frame.encode();
        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn truncated_header_rejected() {
        assert!(matches!(Frame::decode(&[0u8; 5]), Err(DecodeError::Truncated)));
    }

    #[test]
    fn truncated_payload_rejected() {
        let frame = sample_frame();
        let mut bytes = frame.encode();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(Frame::decode(&bytes), Err(DecodeError::Truncated)));
    }

    #[test]
    fn version_mismatch_rejected() {
        let frame = sample_frame();
        let mut bytes = frame.encode();
        bytes[0] = 99;
        assert!(matches!(Frame::decode(&bytes), Err(DecodeError::VersionMismatch)));
    }

    #[test]
    fn invalid_flags_rejected() {
        let frame = sample_frame();
        let mut bytes = frame.encode();
        bytes[11] = 0xFF;
        assert!(matches!(Frame::decode(&bytes), Err(DecodeError::InvalidFlags)));
    }

    #[test]
    fn invalid_frame_type_rejected() {
        let frame = sample_frame();
        let mut bytes = frame.encode();
        bytes[1] = 0x00;
        assert!(matches!(Frame::decode(&bytes), Err(DecodeError::InvalidFrameType(0))));
    }

    #[test]
    fn dedup_key_depends_on_type_sender_timestamp_and_payload_prefix() {
        let a = sample_frame();
        let mut b = sample_frame();
        b.sender_id = [9u8; ID_SIZE];
        assert_ne!(a.dedup_key(), b.dedup_key());

        let c = sample_frame();
        assert_eq!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn dedup_key_ignores_payload_past_32_bytes() {
        let mut a = sample_frame();
        let mut b = sample_frame();
        a.payload = vec![1u8; 100];
        b.payload = vec![1u8; 32];
        b.payload.extend(vec![2u8; 68]);
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
                let _ = Frame::decode(&data);
            }

            #[test]
            fn prop_roundtrip_preserves_payload(
                payload in prop::collection::vec(any::<u8>(), 0..1024),
                timestamp in any::<u64>(),
                sender in any::<[u8; 8]>(),
            ) {
                let frame = Frame::new(FrameType::Message, sender, None, timestamp, payload.clone());
                let bytes = frame.encode();
                let decoded = Frame::decode(&bytes).unwrap();
                prop_assert_eq!(decoded.payload, payload);
                prop_assert_eq!(decoded.timestamp, timestamp);
                prop_assert_eq!(decoded.sender_id, sender);
            }
        }
    }
}
