//! Messages and events delivered by a subscription handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::BrokerError;

/// String key/value attributes attached to a published message.
pub type Attributes = HashMap<String, String>;

/// Receiving half of a subscription's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<SubscriptionEvent>;

/// Sending half of a subscription's event channel.
pub type EventSender = mpsc::UnboundedSender<SubscriptionEvent>;

/// Ack/nack capability for a delivered message, implemented by the broker
/// client that delivered it.
pub trait Acknowledger: Send + Sync {
    /// Mark the message as processed so the broker does not redeliver it.
    fn ack(&self, message_id: &str);

    /// Release the message for redelivery.
    fn nack(&self, message_id: &str);
}

/// A message delivered to a subscription.
#[derive(Clone)]
pub struct InboundMessage {
    /// Broker-assigned message id
    pub id: String,
    /// Raw payload, usually JSON
    pub data: Bytes,
    /// Publisher attributes
    pub attributes: Attributes,
    /// When the broker accepted the message
    pub publish_time: SystemTime,
    /// 1 on first delivery, incremented on every redelivery
    pub delivery_attempt: u32,
    acknowledger: Arc<dyn Acknowledger>,
    settled: Arc<AtomicBool>,
}

impl InboundMessage {
    /// Create a message bound to the acknowledger that settles it.
    pub fn new(
        id: impl Into<String>,
        data: impl Into<Bytes>,
        attributes: Attributes,
        acknowledger: Arc<dyn Acknowledger>,
    ) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
            attributes,
            publish_time: SystemTime::now(),
            delivery_attempt: 1,
            acknowledger,
            settled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the delivery attempt count.
    pub fn with_delivery_attempt(mut self, attempt: u32) -> Self {
        self.delivery_attempt = attempt;
        self
    }

    /// Acknowledge the message. Only the first ack or nack reaches the broker.
    pub fn ack(&self) {
        if !self.settled.swap(true, Ordering::SeqCst) {
            self.acknowledger.ack(&self.id);
        }
    }

    /// Negatively acknowledge the message. Only the first ack or nack reaches
    /// the broker.
    pub fn nack(&self) {
        if !self.settled.swap(true, Ordering::SeqCst) {
            self.acknowledger.nack(&self.id);
        }
    }

    /// Whether the message has been acked or nacked.
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    /// Payload as UTF-8 text, lossy.
    pub fn data_as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("id", &self.id)
            .field("len", &self.data.len())
            .field("attributes", &self.attributes)
            .field("delivery_attempt", &self.delivery_attempt)
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Events emitted by a subscription handle.
///
/// Message and error events may interleave. `Close` is emitted every time the
/// handle closes; the channel itself stays alive across close/open cycles.
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    Message(InboundMessage),
    Error(BrokerError),
    Close,
}
