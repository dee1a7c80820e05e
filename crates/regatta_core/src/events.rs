//! # Event Dispatcher
//!
//! Synchronous publish/subscribe bus used for game events and internally by
//! the registry, the clock and the game loop.
//!
//! ## Delivery Order
//!
//! ```text
//! emit("collision", &payload)
//!   ├─ topic listeners for "collision"   (registration order)
//!   └─ all-events subscribers            (registration order)
//! ```
//!
//! All-events subscribers are keyed by id, so removing one is a single hash
//! lookup. Ids grow with registration order and the snapshot is sorted by id
//! before delivery.
//!
//! Listener collections are snapshotted before delivery and the lock is
//! released, so a listener may subscribe, unsubscribe (itself included) or
//! emit again without deadlocking. Changes made during an emit take effect
//! from the next emit.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Identifier of a registered listener.
///
/// Ids are unique per dispatcher and increase with registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Shared listener callback.
pub type Listener<P> = Arc<dyn Fn(&P) + Send + Sync>;

struct ListenerTable<P> {
    next_id: u64,
    topics: HashMap<String, Vec<(ListenerId, Listener<P>)>>,
    everything: HashMap<ListenerId, Listener<P>>,
}

impl<P> ListenerTable<P> {
    fn allocate_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Publish/subscribe bus keyed by string topics.
pub struct EventDispatcher<P> {
    table: Mutex<ListenerTable<P>>,
}

impl<P> EventDispatcher<P> {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Mutex::new(ListenerTable {
                next_id: 0,
                topics: HashMap::new(),
                everything: HashMap::new(),
            }),
        }
    }

    /// Registers a listener for one topic.
    pub fn on<F>(&self, topic: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let mut table = self.table.lock();
        let id = table.allocate_id();
        table
            .topics
            .entry(topic.into())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Removes a topic listener.
    ///
    /// Returns `false` if the listener was not registered on that topic.
    pub fn off(&self, topic: &str, id: ListenerId) -> bool {
        let mut table = self.table.lock();
        let Some(listeners) = table.topics.get_mut(topic) else {
            return false;
        };

        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = listeners.len() != before;

        if listeners.is_empty() {
            table.topics.remove(topic);
        }
        removed
    }

    /// Registers a subscriber that receives every emitted payload,
    /// regardless of topic.
    pub fn subscribe_all<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let mut table = self.table.lock();
        let id = table.allocate_id();
        table.everything.insert(id, Arc::new(listener));
        id
    }

    /// Removes an all-events subscriber. Unknown ids are ignored.
    pub fn unsubscribe_all(&self, id: ListenerId) -> bool {
        self.table.lock().everything.remove(&id).is_some()
    }

    /// Delivers `payload` to the topic's listeners, then to every
    /// all-events subscriber.
    ///
    /// Returns the number of callbacks invoked. Emitting to a topic nobody
    /// listens to is fine and returns the subscriber count only.
    pub fn emit(&self, topic: &str, payload: &P) -> usize {
        let (topic_listeners, everything) = {
            let table = self.table.lock();
            let topic_listeners: Vec<Listener<P>> = table
                .topics
                .get(topic)
                .map(|listeners| listeners.iter().map(|(_, l)| Arc::clone(l)).collect())
                .unwrap_or_default();
            let mut everything: Vec<(ListenerId, Listener<P>)> = table
                .everything
                .iter()
                .map(|(id, l)| (*id, Arc::clone(l)))
                .collect();
            everything.sort_unstable_by_key(|(id, _)| *id);
            (topic_listeners, everything)
        };

        for listener in &topic_listeners {
            listener(payload);
        }
        for (_, listener) in &everything {
            listener(payload);
        }
        topic_listeners.len() + everything.len()
    }

    /// Drops every listener registered on `topic`, returning how many there were.
    pub fn clear_topic(&self, topic: &str) -> usize {
        self.table.lock().topics.remove(topic).map_or(0, |listeners| listeners.len())
    }

    /// Number of listeners registered on `topic`.
    #[must_use]
    pub fn listener_count(&self, topic: &str) -> usize {
        self.table.lock().topics.get(topic).map_or(0, Vec::len)
    }

    /// Number of all-events subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.table.lock().everything.len()
    }

    /// Returns `true` if nothing at all is registered.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let table = self.table.lock();
        table.topics.is_empty() && table.everything.is_empty()
    }
}

impl<P: 'static> EventDispatcher<P> {
    /// Like [`EventDispatcher::on`], but the listener is removed when the
    /// returned guard is dropped.
    pub fn on_scoped<F>(self: &Arc<Self>, topic: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = self.on(topic.clone(), listener);
        let dispatcher = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(dispatcher) = dispatcher.upgrade() {
                dispatcher.off(&topic, id);
            }
        })
    }

    /// Like [`EventDispatcher::subscribe_all`], but scoped to the returned guard.
    pub fn subscribe_all_scoped<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = self.subscribe_all(listener);
        let dispatcher: Weak<Self> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(dispatcher) = dispatcher.upgrade() {
                dispatcher.unsubscribe_all(id);
            }
        })
    }
}

impl<P> Default for EventDispatcher<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for EventDispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.lock();
        f.debug_struct("EventDispatcher")
            .field("topics", &table.topics.len())
            .field("subscribers", &table.everything.len())
            .finish()
    }
}

/// Guard that removes a listener when dropped.
#[must_use = "dropping a Subscription removes the listener immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wraps a cancellation callback.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Removes the listener now.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keeps the listener registered for the dispatcher's whole lifetime.
    pub fn detach(mut self) {
        self.cancel = None;
    }

    /// Returns `true` while the guard still owns its listener.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
