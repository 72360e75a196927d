use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;

use crate::session::Outbound;

/// Handle returned by [`Watchers::subscribe`]; drops the subscription when
/// passed back to [`Watchers::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherId(u64);

#[derive(Debug)]
struct Subscriber {
    user: String,
    tx: UnboundedSender<Outbound>,
}

/// Sessions observing a match or the lobby. Fan-out works from a snapshot
/// and only enqueues onto session queues; it never blocks and never touches
/// the lock of the resource being observed.
#[derive(Default, Debug)]
pub struct Watchers {
    next: AtomicU64,
    subscribers: DashMap<u64, Subscriber>,
}

impl Watchers {
    pub fn new() -> Watchers {
        Watchers::default()
    }

    pub fn subscribe(&self, user: &str, tx: UnboundedSender<Outbound>) -> WatcherId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(
            id,
            Subscriber {
                user: user.to_string(),
                tx,
            },
        );
        WatcherId(id)
    }

    pub fn unsubscribe(&self, id: WatcherId) {
        self.subscribers.remove(&id.0);
    }

    pub fn snapshot(&self) -> Vec<(String, UnboundedSender<Outbound>)> {
        self.subscribers
            .iter()
            .map(|s| (s.user.clone(), s.tx.clone()))
            .collect()
    }
}
