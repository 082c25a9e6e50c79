//! Typed publish/subscribe bus.
//!
//! One bus instance per event type, so module-level and assessment-level
//! channels cannot collide on a key. Handlers run in subscription order on the
//! publishing thread; a panicking handler is logged and skipped.

use std::collections::HashMap;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A subscriber callback.
pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Token identifying one subscription on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Keyed fan-out of events of type `E`.
pub struct EventBus<K, E> {
    topics: Mutex<HashMap<K, Vec<(SubscriptionId, Handler<E>)>>>,
    next_id: AtomicU64,
}

impl<K, E> EventBus<K, E>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a handler under `key`. Subscribing the same `Arc` twice keeps one
    /// entry and returns the original id.
    pub fn subscribe(&self, key: K, handler: Handler<E>) -> SubscriptionId {
        let mut topics = self.lock();
        let handlers = topics.entry(key).or_default();

        if let Some((id, _)) = handlers.iter().find(|(_, h)| same_handler(h, &handler)) {
            return *id;
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        handlers.push((id, handler));
        id
    }

    /// Remove one subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, key: &K, id: SubscriptionId) -> bool {
        let mut topics = self.lock();
        let Some(handlers) = topics.get_mut(key) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            topics.remove(key);
        }
        removed
    }

    /// Deliver `event` to every handler under `key`. Returns how many ran to completion.
    pub fn publish(&self, key: &K, event: &E) -> usize {
        // Snapshot so handlers may subscribe/unsubscribe without deadlocking.
        let handlers: Vec<Handler<E>> = match self.lock().get(key) {
            Some(handlers) => handlers.iter().map(|(_, h)| h.clone()).collect(),
            None => return 0,
        };

        handlers
            .iter()
            .filter(|handler| deliver_isolated(key, handler, event))
            .count()
    }

    /// Drop every handler under `key`.
    pub fn remove_topic(&self, key: &K) {
        self.lock().remove(key);
    }

    /// Drop every topic whose key fails `keep`.
    pub fn retain_topics(&self, mut keep: impl FnMut(&K) -> bool) {
        self.lock().retain(|k, _| keep(k));
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn subscriber_count(&self, key: &K) -> usize {
        self.lock().get(key).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Vec<(SubscriptionId, Handler<E>)>>> {
        self.topics.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<K, E> Default for EventBus<K, E>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Run one handler, logging instead of unwinding if it panics. Returns `true` if it completed.
pub fn deliver_isolated<K: std::fmt::Debug, E>(key: &K, handler: &Handler<E>, event: &E) -> bool {
    match catch_unwind(AssertUnwindSafe(|| handler(event))) {
        Ok(()) => true,
        Err(_) => {
            tracing::warn!(key = ?key, "Dirty-state subscriber panicked; continuing");
            false
        }
    }
}

fn same_handler<E>(a: &Handler<E>, b: &Handler<E>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
