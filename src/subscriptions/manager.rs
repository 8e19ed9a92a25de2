//! Fan-out of chain events to bounded subscriber channels.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::types::{
    ChainEvent, DropReason, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId,
};

/// Outcome of handing one event to one subscriber.
enum Delivery {
    Sent,
    Filtered,
    /// The buffer is full: the subscriber fell behind.
    Overflowed,
    /// The handle was dropped by the host.
    Gone,
}

struct Subscriber {
    filter: SubscriptionFilter,
    sender: Sender<ChainEvent>,
}

impl Subscriber {
    fn deliver(&self, event: &ChainEvent) -> Delivery {
        if !self.filter.matches(event) {
            return Delivery::Filtered;
        }
        match self.sender.try_send(event.clone()) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Overflowed,
            Err(TrySendError::Disconnected(_)) => Delivery::Gone,
        }
    }

    /// Final notice before the channel is closed. May not fit the buffer.
    fn farewell(self, reason: DropReason) {
        let _ = self.sender.try_send(ChainEvent::Dropped { reason });
    }
}

/// Broadcasts a store's events to every interested subscriber.
///
/// Delivery never blocks the store: a subscriber whose buffer is full is
/// removed and, if room allows, told why.
pub struct SubscriptionManager {
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    next_id: AtomicU64,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.subscribers.write().insert(
            id,
            Subscriber {
                filter: config.filter,
                sender,
            },
        );
        debug!(subscription = id.0, "subscriber added");

        SubscriptionHandle { id, receiver }
    }

    /// Remove a subscriber. Its handle receives a final `Dropped` event.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(subscriber) = self.subscribers.write().remove(&id) {
            subscriber.farewell(DropReason::Unsubscribed);
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Send `event` to every subscriber whose filter accepts it.
    ///
    /// Subscribers that overflowed or whose handle is gone are removed.
    /// Returns how many subscribers received the event.
    pub fn broadcast(&self, event: ChainEvent) -> usize {
        let mut sent = 0;
        let mut overflowed = Vec::new();
        let mut gone = Vec::new();

        for (id, subscriber) in self.subscribers.read().iter() {
            match subscriber.deliver(&event) {
                Delivery::Sent => sent += 1,
                Delivery::Filtered => {}
                Delivery::Overflowed => overflowed.push(*id),
                Delivery::Gone => gone.push(*id),
            }
        }

        if overflowed.is_empty() && gone.is_empty() {
            return sent;
        }

        let mut subscribers = self.subscribers.write();
        for id in overflowed {
            if let Some(subscriber) = subscribers.remove(&id) {
                warn!(subscription = id.0, event = event.kind(), "dropping slow subscriber");
                subscriber.farewell(DropReason::BufferOverflow);
            }
        }
        for id in gone {
            subscribers.remove(&id);
        }

        sent
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
