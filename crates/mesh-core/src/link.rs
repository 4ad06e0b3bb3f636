//! Abstraction over the underlying broadcast medium (BLE GATT in production,
//! an in-process mock for tests).

use std::sync::{Arc, Mutex};

/// Maximum payload a single link-layer write may carry (BLE ATT MTU minus
/// headroom for notification framing).
pub const MAX_LINK_WRITE: usize = 244;

/// Identifies a locally connected neighbor. Stable only for the lifetime of
/// the connection, not across reconnects.
pub type LinkId = u64;

/// A frame arriving from the link layer: which neighbor it came from, the
/// observed signal strength, and the raw bytes.
pub type IncomingFrame = (LinkId, Option<i8>, Vec<u8>);

/// Error from a link-layer operation.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The requested neighbor is no longer connected.
    #[error("neighbor {0} not connected")]
    NotConnected(LinkId),
    /// The payload exceeds [`MAX_LINK_WRITE`].
    #[error("payload of {0} bytes exceeds link write limit")]
    PayloadTooLarge(usize),
}

/// Transport-agnostic link layer: scanning/advertising, neighbor tracking,
/// and raw byte delivery.
pub trait LinkLayer: Send + Sync {
    /// Begin scanning for and advertising to nearby nodes.
    ///
    /// # Errors
    ///
    /// Returns a `LinkError` if the underlying radio cannot be started.
    fn scan_and_advertise(&self) -> Result<(), LinkError>;

    /// Currently connected neighbors.
    fn connected_neighbors(&self) -> Vec<LinkId>;

    /// Send raw bytes to a specific connected neighbor.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::NotConnected` if the neighbor has disconnected, or
    /// `LinkError::PayloadTooLarge` if `bytes` exceeds [`MAX_LINK_WRITE`].
    fn send(&self, link_id: LinkId, bytes: &[u8]) -> Result<(), LinkError>;

    /// Register a callback invoked for every inbound frame.
    fn on_frame(&self, callback: Box<dyn Fn(IncomingFrame) + Send + Sync>);
}

/// In-process `LinkLayer` used by tests to simulate a small mesh without a
/// real radio.
#[derive(Clone, Default)]
pub struct MockLink {
    neighbors: Arc<Mutex<Vec<LinkId>>>,
    sent: Arc<Mutex<Vec<(LinkId, Vec<u8>)>>>,
    callback: Arc<Mutex<Option<Box<dyn Fn(IncomingFrame) + Send + Sync>>>>,
}

impl MockLink {
    /// Create a mock link with no connected neighbors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a neighbor connecting.
    pub fn connect(&self, link_id: LinkId) {
        self.neighbors.lock().unwrap().push(link_id);
    }

    /// Simulate a neighbor disconnecting.
    pub fn disconnect(&self, link_id: LinkId) {
        self.neighbors.lock().unwrap().retain(|id| *id != link_id);
    }

    /// Simulate a frame arriving from `link_id`.
    pub fn deliver(&self, link_id: LinkId, rssi: Option<i8>, bytes: Vec<u8>) {
        if let Some(callback) = self.callback.lock().unwrap().as_ref() {
            callback((link_id, rssi, bytes));
        }
    }

    /// Bytes sent out through this link so far, for assertions in tests.
    #[must_use]
    pub fn sent(&self) -> Vec<(LinkId, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }

    /// Drain and return everything sent since the last call, for test
    /// harnesses that pump bytes between several mock links.
    pub fn take_sent(&self) -> Vec<(LinkId, Vec<u8>)> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl LinkLayer for MockLink {
    fn scan_and_advertise(&self) -> Result<(), LinkError> {
        Ok(())
    }

    fn connected_neighbors(&self) -> Vec<LinkId> {
        self.neighbors.lock().unwrap().clone()
    }

    fn send(&self, link_id: LinkId, bytes: &[u8]) -> Result<(), LinkError> {
        if bytes.len() > MAX_LINK_WRITE {
            return Err(LinkError::PayloadTooLarge(bytes.len()));
        }
        if !self.neighbors.lock().unwrap().contains(&link_id) {
            return Err(LinkError::NotConnected(link_id));
        }
        self.sent.lock().unwrap().push((link_id, bytes.to_vec()));
        Ok(())
    }

    fn on_frame(&self, callback: Box<dyn Fn(IncomingFrame) + Send + Sync>) {
        *self.callback.lock().unwrap() = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_to_unconnected_neighbor_fails() {
        let link = MockLink::new();
        assert!(matches!(link.send(1, b"hi"), Err(LinkError::NotConnected(1))));
    }

    #[test]
    fn send_oversized_payload_fails() {
        let link = MockLink::new();
        link.connect(1);
        let payload = vec![0u8; MAX_LINK_WRITE + 1];
        assert!(matches!(link.send(1, &payload), Err(LinkError::PayloadTooLarge(_))));
    }

    #[test]
    fn deliver_invokes_registered_callback() {
        let link = MockLink::new();
        let received = Arc::new(Mutex::new(None));
        let received_clone = received.clone();
        link.on_frame(Box::new(move |frame| {
            *received_clone.lock().unwrap() = Some(frame);
        }));
        link.deliver(7, Some(-50), vec![1, 2, 3]);
        let frame = received.lock().unwrap().clone().unwrap();
        assert_eq!(frame, (7, Some(-50), vec![1, 2, 3]));
    }
}
