//! Error types for the mesh transport core.

use thiserror::Error;

/// Top-level error type returned by mesh-core operations.
#[derive(Debug, Error)]
pub enum MeshError {
    /// A frame could not be parsed off the wire.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Handshake, AEAD, or other cryptographic failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] mesh_crypto::CryptoError),

    /// No established session exists for the target peer.
    #[error("no session for peer")]
    NoSession,

    /// Sender was blocked by the anti-abuse gate.
    #[error("blocked by abuse gate: {reason} (retry in {remaining_ms}ms)")]
    AbuseBlocked {
        /// Human-readable reason for the block.
        reason: String,
        /// Milliseconds remaining before the sender may retry.
        remaining_ms: u64,
    },

    /// A bounded queue or table overflowed its capacity.
    #[error("overflow: {0}")]
    Overflow(String),

    /// The underlying link layer reported a failure.
    #[error("link error: {0}")]
    Link(String),
}

/// A convenience alias for results returned by mesh-core operations.
pub type Result<T> = std::result::Result<T, MeshError>;

/// Frame decode failures. These are always non-fatal: the caller discards
/// the offending bytes and logs, never propagates to the sender.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer ended before the declared header or payload was fully read.
    #[error("truncated frame")]
    Truncated,

    /// The version byte did not match the supported protocol version.
    #[error("unsupported protocol version")]
    VersionMismatch,

    /// Unknown bits were set in the flags byte.
    #[error("invalid flags")]
    InvalidFlags,

    /// The type byte did not match a known frame type.
    #[error("invalid frame type: 0x{0:02X}")]
    InvalidFrameType(u8),
}
