//! Explicit publish/subscribe bus shared by the market services.
//!
//! Every service that broadcasts state owns an [`EventBus`]. Listeners are
//! plain callbacks; async consumers can ask for a channel instead.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::mpsc;
use tracing::{debug, error};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct BusInner<T> {
    name: &'static str,
    next_id: AtomicU64,
    listeners: RwLock<BTreeMap<u64, Listener<T>>>,
}

impl<T> BusInner<T> {
    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        listeners.remove(&id).is_some()
    }
}

/// Fan-out bus delivering each published event to every current listener.
pub struct EventBus<T> {
    inner: Arc<BusInner<T>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> EventBus<T> {
    /// Create a new bus. The name only shows up in logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(BusInner {
                name,
                next_id: AtomicU64::new(0),
                listeners: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is explicitly unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Arc::new(listener));

        debug!("New subscriber {} on {} bus", id, self.inner.name);

        let weak: Weak<BusInner<T>> = Arc::downgrade(&self.inner);
        Subscription {
            id,
            detach: Box::new(move || match weak.upgrade() {
                Some(inner) => inner.remove(id),
                None => false,
            }),
        }
    }

    /// Register a listener that forwards every event into an unbounded channel.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<T>)
    where
        T: Clone + Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event: &T| {
            // Receiver gone means the consumer shut down; nothing to deliver to.
            let _ = tx.send(event.clone());
        });
        (subscription, rx)
    }

    /// Deliver an event to every listener in subscription order.
    /// Returns the number of listeners that handled it without panicking.
    pub fn publish(&self, event: &T) -> usize {
        // Snapshot the listener list so callbacks may (un)subscribe freely.
        let listeners: Vec<(u64, Listener<T>)> = {
            let guard = self.inner.listeners.read().unwrap_or_else(|e| e.into_inner());
            guard.iter().map(|(id, l)| (*id, l.clone())).collect()
        };

        let mut delivered = 0;
        for (id, listener) in listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| (listener.as_ref())(event))) {
                Ok(()) => delivered += 1,
                Err(_) => error!("Listener {} on {} bus panicked", id, self.inner.name),
            }
        }
        delivered
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

/// Handle returned by [`EventBus::subscribe`].
pub struct Subscription {
    id: u64,
    detach: Box<dyn FnOnce() -> bool + Send + Sync>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Detach the listener. Returns false if the bus was already gone.
    pub fn unsubscribe(self) -> bool {
        (self.detach)()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[test]
    fn test_publish_reaches_all_listeners() {
        let bus: EventBus<u32> = EventBus::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = seen.clone();
        let _sub_a = bus.subscribe(move |v| a.lock().unwrap().push(("a", *v)));
        let b = seen.clone();
        let _sub_b = bus.subscribe(move |v| b.lock().unwrap().push(("b", *v)));

        assert_eq!(bus.publish(&7), 2);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus: EventBus<u32> = EventBus::new("test");
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let sub = bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&1);
        assert!(sub.unsubscribe());
        bus.publish(&2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_after_bus_dropped() {
        let bus: EventBus<u32> = EventBus::new("test");
        let sub = bus.subscribe(|_| {});
        drop(bus);

        assert!(!sub.unsubscribe());
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus: EventBus<u32> = EventBus::new("test");
        let count = Arc::new(AtomicUsize::new(0));

        let _bad = bus.subscribe(|_| panic!("listener failure"));
        let c = count.clone();
        let _good = bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish(&1), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_can_subscribe_during_publish() {
        let bus: EventBus<u32> = EventBus::new("test");
        let inner_bus = bus.clone();
        let _sub = bus.subscribe(move |_| {
            let _ = inner_bus.subscribe(|_| {});
        });

        bus.publish(&1);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_channel() {
        let bus: EventBus<String> = EventBus::new("test");
        let (_sub, mut rx) = bus.subscribe_channel();

        bus.publish(&"hello".to_string());

        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }
}
