use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

pub type SubscriptionId = u64;

type BoxedCallback<E> = Box<dyn Fn(&E) + Send + Sync>;

struct Subscription<E> {
    id: SubscriptionId,
    callback: BoxedCallback<E>,
}

/// Fan-out for view events. Callbacks run synchronously on the publishing
/// task and must not block.
pub struct Bus<E: Clone + Send + 'static> {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<Subscription<E>>>,
    tx: broadcast::Sender<E>,
}

impl<E: Clone + Send + 'static> Bus<E> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            next_id: AtomicU64::new(0),
            subscribers: RwLock::new(Vec::new()),
            tx,
        }
    }

    pub fn publish(&self, event: E) {
        for sub in self.subscribers.read().iter() {
            (sub.callback)(&event);
        }
        // No receivers is fine: nobody is rendering.
        let _ = self.tx.send(event);
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.subscribers.write().push(Subscription {
            id,
            callback: Box::new(callback),
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    pub fn subscribe_channel(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E: Clone + Send + 'static> Default for Bus<E> {
    fn default() -> Self {
        Self::new(1024)
    }
}

pub type SharedBus<E> = Arc<Bus<E>>;
