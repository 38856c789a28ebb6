//! # elog-mq
//!
//! Binds topic keys to broker queues and hands each binding back to the
//! caller as a stream of acknowledgeable deliveries.
//!
//! ## Architecture
//! ```text
//! TopicRegistry (one per client, at most one binding per key)
//!       │
//!       ▼
//! Broker::consume(queue)      ← AmqpBroker (lapin) / MemoryBroker
//!       │
//!       ▼
//! DeliveryStream  →  Delivery::event() / ack() / nack()
//! ```

pub mod amqp;
pub mod broker;
pub mod memory;
pub mod registry;

pub use amqp::AmqpBroker;
pub use broker::{Acknowledger, Broker, Consumption, Delivery, DeliveryStream};
pub use memory::MemoryBroker;
pub use registry::TopicRegistry;
