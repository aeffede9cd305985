use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::CustomerId;
use crate::observability;

const CHANNEL_CAPACITY: usize = 64;

/// One outbound message for a customer. Delivery to the actual chat transport
/// happens outside this crate; the hub only fans out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub customer_id: CustomerId,
    pub text: String,
}

/// Fan-out hub for engine-originated notifications: reminders, birthday
/// greetings, milestone rewards. Sending with no subscribers is a no-op,
/// never an error — the engine must not care whether anyone is listening.
pub struct NotifyHub {
    channels: DashMap<CustomerId, broadcast::Sender<Notification>>,
    firehose: broadcast::Sender<Notification>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        let (firehose, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            channels: DashMap::new(),
            firehose,
        }
    }

    /// Subscribe to one customer's notifications.
    pub fn subscribe(&self, customer_id: CustomerId) -> broadcast::Receiver<Notification> {
        self.channels
            .entry(customer_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Subscribe to every notification regardless of customer.
    pub fn subscribe_all(&self) -> broadcast::Receiver<Notification> {
        self.firehose.subscribe()
    }

    pub fn send(&self, customer_id: CustomerId, text: impl Into<String>) {
        let notification = Notification {
            customer_id,
            text: text.into(),
        };
        if let Some(tx) = self.channels.get(&customer_id) {
            let _ = tx.send(notification.clone());
        }
        let _ = self.firehose.send(notification);
        metrics::counter!(observability::NOTIFICATIONS_SENT).increment(1);
    }

    /// Drop a customer's channel once their chat session ends.
    pub fn remove(&self, customer_id: CustomerId) {
        self.channels.remove(&customer_id);
    }
}
