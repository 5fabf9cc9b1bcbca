//! Lifecycle event tags and the observer fan-out they are delivered through.
//!
//! Observers are notified by tag only; anything beyond "this event occurred"
//! is obtained by re-querying the session. Events fire exclusively from the
//! snapshot-diff step in [`crate::services::dispatch`] (plus the local
//! time-warning watcher), never from the direct-call path, so a notification
//! racing ahead of the replicated state that caused it cannot double-fire.

use std::sync::Arc;

use tokio::sync::broadcast;

/// Payload-free tag describing something that happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session entered the countdown phase.
    CountdownBegun,
    /// The session entered the active phase.
    Started,
    /// The session entered the ended phase.
    Ended,
    /// Remaining active time dropped below the configured threshold.
    TimeWarning,
    /// A participant joined the session.
    ParticipantJoined,
    /// A participant left the session.
    ParticipantLeft,
}

/// Callback sink for [`SessionEvent`]s.
pub trait SessionObserver: Send + Sync {
    /// Deliver one event tag to the observer.
    fn notify(&self, event: SessionEvent);
}

impl<F> SessionObserver for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn notify(&self, event: SessionEvent) {
        self(event)
    }
}

/// Ordered list of registered observers.
///
/// Delivery order across observers for the same event is insertion order;
/// a vacated slot is skipped silently.
#[derive(Default)]
pub struct ObserverRegistry {
    slots: Vec<Option<Arc<dyn SessionObserver>>>,
}

impl ObserverRegistry {
    /// Register an observer, returning its slot index for later removal.
    pub fn register(&mut self, observer: Arc<dyn SessionObserver>) -> usize {
        self.slots.push(Some(observer));
        self.slots.len() - 1
    }

    /// Vacate a slot. Out-of-range or already-vacated slots are ignored.
    pub fn unregister(&mut self, slot: usize) {
        if let Some(entry) = self.slots.get_mut(slot) {
            entry.take();
        }
    }

    /// Deliver an event to every occupied slot in insertion order.
    pub fn notify_all(&self, event: SessionEvent) {
        for observer in self.slots.iter().flatten() {
            observer.notify(event);
        }
    }
}

/// Broadcast hub mirroring every observer notification onto a channel, for
/// consumers that prefer a stream over a callback.
pub struct EventHub {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventHub {
    /// Construct a new hub backed by a broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }
}
