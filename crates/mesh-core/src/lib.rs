//! # mesh-core
//!
//! Transport core for a decentralized, peer-to-peer BLE mesh chat network.
//!
//! This crate provides:
//! - **Wire protocol**: frame encoding/decoding, fragmentation/reassembly,
//!   optional LZ4 compression
//! - **Crypto session layer**: Noise_XX handshake orchestration and
//!   established AEAD sessions, built on [`mesh_crypto`]
//! - **Routing**: dedup, TTL-bounded flood relay, and smart targeting for
//!   private messages
//! - **Per-peer actors**: serialized, backpressured frame processing
//! - **Anti-abuse gate**: rate limiting, trust scoring, content heuristics,
//!   and device-bound muting
//! - **Store-and-forward**: bounded mailboxes for temporarily unreachable
//!   peers
//!
//! ## Quick Start
//!
//! The [`MeshService`] facade is the primary entry point:
//!
//! ```no_run
//! use mesh_core::{Identity, MeshConfig, MeshService};
//! use mesh_core::device::{device_fingerprint, DeviceIdentifiers};
//! use mesh_core::link::MockLink;
//! use mesh_crypto::noise::NoiseKeypair;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let identity = Identity::generate();
//!     let noise_keypair = NoiseKeypair::generate()?;
//!     let device_fp = device_fingerprint(&DeviceIdentifiers::default());
//!     let link = Arc::new(MockLink::new());
//!     let service =
//!         MeshService::new(identity, noise_keypair, device_fp, MeshConfig::default(), link);
//!
//!     service.set_nickname("alice");
//!     service.start()?;
//!     service.send_broadcast_announce()?;
//!     service.send_public("hello mesh")?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   MeshService (Orchestration)                    │
//! ├─────────────────┬──────────────────┬──────────────┬─────────────┤
//! │  SessionManager  │      Router      │ AntiAbuseGate │ StoreAndForward │
//! │  (Noise + AEAD)  │ (dedup, TTL,     │ (rate limit,  │ (mailboxes) │
//! │                  │  smart targeting)│  trust, mute) │             │
//! ├─────────────────┴──────────────────┴──────────────┴─────────────┤
//! │                       PeerActor (per peer)                       │
//! ├────────────────────────────────────────────────────────────────-┤
//! │                    Frame (wire codec, fragments)                 │
//! ├────────────────────────────────────────────────────────────────-┤
//! │                   LinkLayer (BLE GATT or mock)                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`frame`]: wire frame encoding/decoding
//! - [`fragment`]: fragmentation, reassembly, compression
//! - [`identity`]: long-term node identity and keyfile persistence
//! - [`device`]: local device fingerprinting, used to anchor abuse state
//! - [`session_manager`]: Noise handshake orchestration and AEAD sessions
//! - [`channel`]: password-protected channel message encryption
//! - [`peer_table`]: concurrent table of known peers
//! - [`dedup`]: seen-frame cache
//! - [`router`]: delivery/relay decisions
//! - [`peer_actor`]: per-peer serialized frame processing
//! - [`abuse`]: rate limiting, trust scoring, content heuristics, muting
//! - [`mute_store`]: replicated on-disk persistence for mute records
//! - [`store_and_forward`]: mailboxes for unreachable peers
//! - [`link`]: link layer abstraction
//! - [`config`]: node configuration
//! - [`service`]: [`MeshService`] facade
//! - [`error`]: error types and result handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod abuse;
pub mod channel;
pub mod config;
pub mod dedup;
pub mod device;
pub mod error;
pub mod frame;
pub mod fragment;
pub mod identity;
pub mod link;
pub mod mute_store;
pub mod peer_actor;
pub mod peer_table;
pub mod router;
pub mod service;
pub mod session_manager;
pub mod store_and_forward;

pub use config::MeshConfig;
pub use error::{DecodeError, MeshError};
pub use frame::{Frame, FrameFlags, FrameType};
pub use identity::{Fingerprint, Identity, PeerId};
pub use service::{MeshEvent, MeshService};
