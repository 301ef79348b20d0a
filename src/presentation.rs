//! Push channel between a session and whatever renders its state.
//!
//! Only the newest state matters to a view, so this is a `watch` channel: a slow reader skips
//! intermediate snapshots, and a reader attaching late receives the current state as soon as it
//! signals that it is ready.

use crate::serialize::SerializedSnapshot;
use tokio::sync::watch;

#[derive(Debug)]
pub struct SnapshotPublisher {
    sender: watch::Sender<SerializedSnapshot>,
}

impl SnapshotPublisher {
    /// Creates a publisher whose current state is empty.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(SerializedSnapshot::default());
        Self { sender }
    }

    /// Replaces the current state. Works with or without attached readers.
    pub fn publish(&self, snapshot: SerializedSnapshot) {
        self.sender.send_replace(snapshot);
    }

    pub fn current(&self) -> SerializedSnapshot {
        self.sender.borrow().clone()
    }

    pub fn attach(&self) -> PresentationHandle {
        PresentationHandle {
            receiver: self.sender.subscribe(),
            ready: false,
        }
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// The reading end, held by a view.
#[derive(Debug)]
pub struct PresentationHandle {
    receiver: watch::Receiver<SerializedSnapshot>,
    ready: bool,
}

impl PresentationHandle {
    /// Signals that the view can render and returns the current state.
    pub fn ready(&mut self) -> SerializedSnapshot {
        self.ready = true;
        self.receiver.borrow_and_update().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Waits for the next state.
    ///
    /// The first call on a handle that is not ready yet performs the handshake and returns the
    /// current state right away. Returns `None` once the publisher is gone.
    pub async fn next_update(&mut self) -> Option<SerializedSnapshot> {
        if !self.ready {
            return Some(self.ready());
        }
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}
