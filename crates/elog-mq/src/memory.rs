//! In-process broker.
//!
//! Durable queues, round-robin delivery and manual ack, all inside one
//! process. Used by the test suites and for running the client without a
//! RabbitMQ endpoint.

use async_trait::async_trait;
use elog_core::error::TopicError;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::broker::{Acknowledger, Broker, Consumption, Delivery};

type Sink = UnboundedSender<Result<Delivery, TopicError>>;

struct Message {
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Default)]
struct Queue {
    ready: VecDeque<Message>,
    consumers: Vec<(String, Sink)>,
    unacked: HashMap<u64, Vec<u8>>,
    next_delivery: u64,
    cursor: usize,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, Queue>,
    failing: HashSet<String>,
    failing_cancel: HashSet<String>,
    consume_calls: usize,
    next_tag: u64,
}

/// Cloneable handle to an in-memory broker. Clones share the same queues.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Enqueue `body` on `queue`, declaring the queue if needed.
    pub fn publish(&self, queue: &str, body: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        let q = state.queues.entry(queue.to_string()).or_default();
        q.ready.push_back(Message {
            body: body.into(),
            redelivered: false,
        });
        dispatch(&self.state, queue, q);
    }

    /// Make every later `consume` on `queue` fail with a broker error.
    pub fn fail_consume(&self, queue: &str) {
        self.lock().failing.insert(queue.to_string());
    }

    /// Make every later `cancel` on `queue` fail with a broker error.
    pub fn fail_cancel(&self, queue: &str) {
        self.lock().failing_cancel.insert(queue.to_string());
    }

    /// Undo `fail_consume` and `fail_cancel` for `queue`.
    pub fn clear_failures(&self, queue: &str) {
        let mut state = self.lock();
        state.failing.remove(queue);
        state.failing_cancel.remove(queue);
    }

    /// Number of `consume` calls received, failed ones included.
    pub fn consume_calls(&self) -> usize {
        self.lock().consume_calls
    }

    pub fn consumer_count(&self, queue: &str) -> usize {
        self.lock()
            .queues
            .get(queue)
            .map_or(0, |q| q.consumers.len())
    }

    /// Messages waiting for a consumer.
    pub fn ready_count(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.ready.len())
    }

    /// Messages delivered but not yet settled.
    pub fn unacked_count(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.unacked.len())
    }

    pub fn has_queue(&self, queue: &str) -> bool {
        self.lock().queues.contains_key(queue)
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hand ready messages to consumers round-robin until one side runs out.
fn dispatch(state: &Arc<Mutex<State>>, name: &str, q: &mut Queue) {
    while !q.consumers.is_empty() {
        let Some(msg) = q.ready.pop_front() else { break };
        let idx = q.cursor % q.consumers.len();
        q.next_delivery += 1;
        let tag = q.next_delivery;

        let acker = MemoryAcker {
            state: Arc::clone(state),
            queue: name.to_string(),
            tag,
        };
        let delivery = Delivery::new(name, tag, msg.redelivered, msg.body.clone(), Box::new(acker));

        if q.consumers[idx].1.unbounded_send(Ok(delivery)).is_err() {
            // Receiver dropped without cancelling; forget the consumer.
            q.consumers.remove(idx);
            q.ready.push_front(msg);
            continue;
        }
        q.unacked.insert(tag, msg.body);
        q.cursor = idx + 1;
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn consume(&self, queue: &str) -> Result<Consumption, TopicError> {
        let mut state = self.lock();
        state.consume_calls += 1;
        if state.failing.contains(queue) {
            return Err(TopicError::Broker {
                topic: queue.to_string(),
                reason: "consume refused".into(),
            });
        }

        state.next_tag += 1;
        let consumer_tag = format!("mem-consumer-{}", state.next_tag);
        let (tx, rx) = unbounded();

        let q = state.queues.entry(queue.to_string()).or_default();
        q.consumers.push((consumer_tag.clone(), tx));
        dispatch(&self.state, queue, q);

        debug!(queue, consumer_tag = %consumer_tag, "memory consumer started");
        Ok(Consumption {
            consumer_tag,
            stream: Box::pin(rx),
        })
    }

    async fn cancel(&self, queue: &str, consumer_tag: &str) -> Result<(), TopicError> {
        let mut state = self.lock();
        if state.failing_cancel.contains(queue) {
            return Err(TopicError::Broker {
                topic: queue.to_string(),
                reason: "cancel refused".into(),
            });
        }
        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| TopicError::Broker {
                topic: queue.to_string(),
                reason: "no such queue".into(),
            })?;
        let before = q.consumers.len();
        q.consumers.retain(|(tag, _)| tag != consumer_tag);
        if q.consumers.len() == before {
            return Err(TopicError::Broker {
                topic: queue.to_string(),
                reason: format!("unknown consumer '{consumer_tag}'"),
            });
        }
        Ok(())
    }

    fn url(&self) -> &str {
        "memory://"
    }
}

struct MemoryAcker {
    state: Arc<Mutex<State>>,
    queue: String,
    tag: u64,
}

impl MemoryAcker {
    fn settle(&self, requeue: bool) -> Result<(), TopicError> {
        let mut state = lock(&self.state);
        let q = state
            .queues
            .get_mut(&self.queue)
            .ok_or_else(|| TopicError::Ack(format!("queue '{}' is gone", self.queue)))?;
        let body = q
            .unacked
            .remove(&self.tag)
            .ok_or_else(|| TopicError::Ack(format!("delivery {} already settled", self.tag)))?;
        if requeue {
            q.ready.push_back(Message {
                body,
                redelivered: true,
            });
            dispatch(&self.state, &self.queue, q);
        }
        Ok(())
    }
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<(), TopicError> {
        self.settle(false)
    }

    async fn nack(&self, requeue: bool) -> Result<(), TopicError> {
        self.settle(requeue)
    }
}
