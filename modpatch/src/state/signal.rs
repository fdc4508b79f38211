//! Pending-write signal and write outcome events.
//!
//! Background state writes are fire-and-forget from the caller's point of
//! view. [`WriteTracker`] makes them observable: a `watch` channel flips to
//! `true` when the first write is scheduled and back to `false` when the
//! pending count returns to zero, and every finished write is broadcast as a
//! [`StateWriteEvent`].
//!
//! A shutdown guard subscribes to the signal and refuses to exit while it
//! reads `true`; tests await [`WriteTracker::wait_idle`] instead of racing
//! the writer.

use std::path::PathBuf;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

/// Capacity of the write event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Outcome of one background state write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateWriteEvent {
    /// The state document was written.
    Written { path: PathBuf },
    /// A newer save for the same document superseded this write.
    Superseded { path: PathBuf },
    /// The write failed after all retries.
    Failed { path: PathBuf, error: String },
}

/// Counts pending background writes.
#[derive(Debug)]
pub struct WriteTracker {
    pending: Mutex<usize>,
    signal: watch::Sender<bool>,
    events: broadcast::Sender<StateWriteEvent>,
}

impl Default for WriteTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteTracker {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pending: Mutex::new(0),
            signal,
            events,
        }
    }

    /// Register a write about to be scheduled.
    pub fn begin(&self) {
        let mut pending = self.pending.lock();
        *pending += 1;
        if *pending == 1 {
            self.signal.send_replace(true);
        }
    }

    /// Register a finished write and publish its outcome.
    pub fn finish(&self, event: StateWriteEvent) {
        {
            let mut pending = self.pending.lock();
            *pending = pending.saturating_sub(1);
            if *pending == 0 {
                self.signal.send_replace(false);
            }
        }
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Number of writes scheduled but not finished.
    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }

    /// Whether any write is pending.
    pub fn is_writing(&self) -> bool {
        *self.signal.borrow()
    }

    /// Receiver for the "any writes pending" signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.signal.subscribe()
    }

    /// Receiver for write outcomes.
    pub fn subscribe_events(&self) -> broadcast::Receiver<StateWriteEvent> {
        self.events.subscribe()
    }

    /// Wait until no write is pending.
    pub async fn wait_idle(&self) {
        let mut rx = self.signal.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|writing| !*writing).await;
    }
}
