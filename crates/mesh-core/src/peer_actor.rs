//! Per-peer serialized frame processing.
//!
//! Frames from the same peer must be handled strictly in arrival order (a
//! handshake message must land before the encrypted traffic that follows
//! it), but different peers must never block one another. Each peer gets its
//! own actor: a bounded queue drained by a single background task.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::identity::PeerId;

/// Queue depth at which older, unprocessed frames are dropped to bound
/// memory under a flood.
pub const MAX_QUEUE: usize = 1024;

struct Queue {
    items: VecDeque<Vec<u8>>,
}

/// A single peer's serialized inbound frame queue and processing task.
pub struct PeerActor {
    peer_id: PeerId,
    queue: Arc<Mutex<Queue>>,
    notify: Arc<Notify>,
    stopped: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl PeerActor {
    /// Spawn an actor for `peer_id` that hands each queued frame to
    /// `handler` in order, one at a time.
    pub fn spawn<H, Fut>(peer_id: PeerId, handler: H) -> Self
    where
        H: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let queue = Arc::new(Mutex::new(Queue { items: VecDeque::new() }));
        let notify = Arc::new(Notify::new());
        let stopped = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicU64::new(0));

        let task_queue = queue.clone();
        let task_notify = notify.clone();
        let task_stopped = stopped.clone();
        tokio::spawn(async move {
            loop {
                if task_stopped.load(Ordering::Relaxed) {
                    return;
                }
                let next = task_queue.lock().unwrap().items.pop_front();
                match next {
                    Some(bytes) => handler(bytes).await,
                    None => task_notify.notified().await,
                }
            }
        });

        Self { peer_id, queue, notify, stopped, dropped }
    }

    /// Queue raw frame bytes for processing, dropping the oldest pending
    /// frame if the queue is already at [`MAX_QUEUE`].
    pub fn enqueue(&self, bytes: Vec<u8>) {
        let mut queue = self.queue.lock().unwrap();
        if queue.items.len() >= MAX_QUEUE {
            queue.items.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queue.items.push_back(bytes);
        drop(queue);
        self.notify.notify_one();
    }

    /// The peer this actor serves.
    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Number of frames dropped so far due to queue overflow.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of frames currently queued, awaiting processing.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap().items.len()
    }

    /// Stop the background processing task after its current item finishes.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn frames_are_processed_in_order() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let actor = PeerActor::spawn([1u8; 8], move |bytes| {
            let received = received_clone.clone();
            async move {
                received.lock().unwrap().push(bytes);
            }
        });

        actor.enqueue(vec![1]);
        actor.enqueue(vec![2]);
        actor.enqueue(vec![3]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*received.lock().unwrap(), vec![vec![1], vec![2], vec![3]]);
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts_it() {
        let actor = PeerActor::spawn([2u8; 8], |_bytes| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        for i in 0..(MAX_QUEUE + 10) {
            actor.enqueue(vec![i as u8]);
        }

        assert!(actor.dropped_count() >= 9);
        assert!(actor.queue_len() <= MAX_QUEUE);
    }
}
