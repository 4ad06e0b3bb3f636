//! Decides what happens to a frame once it has been decoded: deliver
//! locally, relay onward, both, or drop.

use crate::dedup::DedupSet;
use crate::frame::{Frame, FrameType, BROADCAST_ID};
use crate::identity::PeerId;

/// What the caller should do with a frame after routing.
#[derive(Debug, PartialEq)]
pub enum RouteAction {
    /// Already seen, or TTL exhausted before arrival: drop silently.
    Drop,
    /// Hand the frame to local delivery only (it is addressed to us, or a
    /// type that is never relayed).
    DeliverLocal(Frame),
    /// Relay the frame onward without local delivery (addressed to a known
    /// direct peer other than us; we must not decrypt it).
    RelayOnly(Frame),
    /// Deliver locally and also relay onward (broadcast traffic).
    DeliverAndRelay(Frame),
}

/// Stateless routing decisions plus the shared dedup cache they consult.
pub struct Router {
    dedup: DedupSet,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a router with an empty dedup cache.
    #[must_use]
    pub fn new() -> Self {
        Self { dedup: DedupSet::new() }
    }

    /// Route `frame`, received on behalf of `local_peer_id`, deciding
    /// delivery and relay.
    ///
    /// `is_known_direct_peer` reports whether a recipient id names a peer we
    /// have a direct link to (other than ourselves) — used for smart
    /// targeting: when a private MESSAGE is addressed to a peer we can reach
    /// directly, we relay it without decrypting, even if we are also a
    /// leaf on the path.
    pub fn route(
        &self,
        frame: Frame,
        local_peer_id: &PeerId,
        is_known_direct_peer: impl Fn(&PeerId) -> bool,
    ) -> RouteAction {
        if !self.dedup.insert(frame.dedup_key()) {
            return RouteAction::Drop;
        }

        let addressed_to_us = frame.recipient_id.as_ref() == Some(local_peer_id);
        let is_broadcast = frame.recipient_id.is_none() || frame.recipient_id == Some(BROADCAST_ID);

        if matches!(frame.frame_type, FrameType::Announce | FrameType::Leave) {
            return if frame.ttl == 0 {
                RouteAction::DeliverLocal(frame)
            } else {
                RouteAction::DeliverAndRelay(decrement_ttl(frame))
            };
        }

        if addressed_to_us {
            return RouteAction::DeliverLocal(frame);
        }

        if !is_broadcast {
            if let Some(recipient) = &frame.recipient_id {
                if is_known_direct_peer(recipient) {
                    return if frame.ttl == 0 { RouteAction::Drop } else { RouteAction::RelayOnly(decrement_ttl(frame)) };
                }
            }
        }

        if frame.ttl == 0 {
            return RouteAction::Drop;
        }

        if is_broadcast {
            RouteAction::DeliverAndRelay(decrement_ttl(frame))
        } else {
            RouteAction::RelayOnly(decrement_ttl(frame))
        }
    }
}

fn decrement_ttl(mut frame: Frame) -> Frame {
    frame.ttl = frame.ttl.saturating_sub(1);
    frame
}
