use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::mpsc;

/// Lifecycle status of a capability session.
///
/// Serialized as `{"status": "downloading", "progress": 40}` so UI layers can
/// render it directly.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SessionStatus {
    /// No session exists.
    Idle,
    /// Availability is being queried.
    Checking,
    /// The model is being downloaded; `progress` is a percentage in 0..=100.
    Downloading { progress: u8 },
    /// A session is live and ready for operations.
    Ready,
    /// The last lifecycle step failed.
    Error { error: String },
}

impl SessionStatus {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Short label used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Downloading { .. } => "downloading",
            Self::Ready => "ready",
            Self::Error { .. } => "error",
        }
    }
}

type Listener = Arc<dyn Fn(&SessionStatus) + Send + Sync>;
type ListenerMap = DashMap<u64, Listener>;

/// Publish/subscribe registry for status transitions.
///
/// There is no replay: a listener only sees transitions emitted after it was
/// added. Listeners run synchronously on the emitting task.
#[derive(Clone, Default)]
pub struct StatusBroadcaster {
    listeners: Arc<ListenerMap>,
    next_id: Arc<AtomicU64>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns the handle that removes it.
    #[must_use = "dropping the subscription leaves the listener registered with no way to remove it"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionStatus) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, Arc::new(listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Registers a listener that forwards every status into a channel.
    ///
    /// The listener is removed automatically once the receiver is dropped and
    /// the next status is emitted.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<SessionStatus>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listeners = Arc::downgrade(&self.listeners);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(move |status: &SessionStatus| {
            if tx.send(status.clone()).is_err()
                && let Some(map) = listeners.upgrade()
            {
                map.remove(&id);
            }
        });
        self.listeners.insert(id, listener);
        let subscription = Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        };
        (subscription, rx)
    }

    /// Delivers a status to every registered listener.
    pub fn emit(&self, status: &SessionStatus) {
        // Snapshot first so a listener may unsubscribe itself without
        // deadlocking on the map shard.
        let snapshot: Vec<Listener> = self
            .listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for listener in snapshot {
            listener(status);
        }
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

/// Handle returned by [`StatusBroadcaster::subscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerMap>,
}

impl Subscription {
    /// Removes the listener. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(map) = self.listeners.upgrade() {
            map.remove(&self.id);
        }
    }
}
