//! Change notifications emitted by a catalog.
//!
//! Observers either register a callback, which runs synchronously on the
//! thread that performed the mutation, or take a channel receiver and drain
//! it from their own thread. The display side uses the channel so that
//! changes made by background tasks are handled on its single thread.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam::channel::{unbounded, Receiver, Sender};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    /// The photo set or the indices changed
    Changed,

    /// Attributes of one photo changed
    PhotoChanged(PathBuf),
}

pub type Listener = Arc<dyn Fn(&CatalogEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscribers {
    listeners: Vec<(SubscriptionId, Listener)>,
    channels: Vec<Sender<CatalogEvent>>,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Subscribers>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked for every event
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CatalogEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().listeners.push((id, Arc::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.listeners.len();
        subscribers.listeners.retain(|(existing, _)| *existing != id);
        subscribers.listeners.len() != before
    }

    /// Queue every future event on a channel. Dropping the receiver ends the
    /// subscription.
    pub fn subscribe_channel(&self) -> Receiver<CatalogEvent> {
        let (tx, rx) = unbounded();
        self.lock().channels.push(tx);
        rx
    }

    /// Deliver `event` to all subscribers.
    ///
    /// Callbacks run without the subscriber list locked, so they may
    /// subscribe or unsubscribe.
    pub fn emit(&self, event: CatalogEvent) {
        let listeners: Vec<Listener> = {
            let mut subscribers = self.lock();
            subscribers
                .channels
                .retain(|tx| tx.send(event.clone()).is_ok());
            subscribers
                .listeners
                .iter()
                .map(|(_, listener)| listener.clone())
                .collect()
        };

        for listener in listeners {
            listener(&event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        // A panicking listener never runs with the lock held
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
