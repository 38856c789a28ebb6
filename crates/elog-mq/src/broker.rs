//! `Broker` trait: abstraction over the pub/sub substrate.

use async_trait::async_trait;
use elog_core::{
    error::{DecodeError, TopicError},
    event::EventRecord,
};
use futures::Stream;
use std::fmt;
use std::pin::Pin;

/// Deliveries from one topic queue, in broker order.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, TopicError>> + Send>>;

/// A live consumer on one queue.
pub struct Consumption {
    pub consumer_tag: String,
    pub stream: DeliveryStream,
}

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), TopicError>;

    async fn nack(&self, requeue: bool) -> Result<(), TopicError>;
}

/// Abstracts over broker backends.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the registry shares one broker
/// across every topic it binds.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Declare the durable queue `queue` and start consuming it with manual
    /// acknowledgement.
    async fn consume(&self, queue: &str) -> Result<Consumption, TopicError>;

    /// Stop the consumer `consumer_tag` on `queue`. Its stream ends; the queue
    /// itself stays on the broker.
    async fn cancel(&self, queue: &str, consumer_tag: &str) -> Result<(), TopicError>;

    /// Broker endpoint, for logs.
    fn url(&self) -> &str;
}

/// One message received on a topic.
///
/// Un-acknowledged deliveries are redelivered by the broker, so callers
/// should `ack` once the event has been processed.
pub struct Delivery {
    topic: String,
    delivery_tag: u64,
    redelivered: bool,
    body: Vec<u8>,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        topic: impl Into<String>,
        delivery_tag: u64,
        redelivered: bool,
        body: Vec<u8>,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            topic: topic.into(),
            delivery_tag,
            redelivered,
            body,
            acker,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Parse the body as an event record.
    pub fn event(&self) -> Result<EventRecord, DecodeError> {
        EventRecord::from_json(&self.body)
    }

    pub async fn ack(&self) -> Result<(), TopicError> {
        self.acker.ack().await
    }

    pub async fn nack(&self, requeue: bool) -> Result<(), TopicError> {
        self.acker.nack(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("topic", &self.topic)
            .field("delivery_tag", &self.delivery_tag)
            .field("redelivered", &self.redelivered)
            .field("body_len", &self.body.len())
            .finish()
    }
}
