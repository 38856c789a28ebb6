//! `TopicRegistry`: at most one live binding per topic key.
//!
//! A key is reserved under the lock before the broker is contacted, so
//! concurrent registrations of the same key make exactly one broker call.
//! The reservation is released if the bind fails or the registering future
//! is dropped, leaving the registry as it was before the call.

use elog_core::{error::TopicError, topic::TopicKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::broker::{Broker, DeliveryStream};

enum Slot {
    /// Reserved; the broker bind holding `ticket` is in flight.
    Pending { ticket: u64 },
    Active { consumer_tag: String },
}

#[derive(Default)]
struct Topics {
    slots: HashMap<TopicKey, Slot>,
    next_ticket: u64,
}

impl Topics {
    fn is_pending(&self, key: &TopicKey, ticket: u64) -> bool {
        matches!(self.slots.get(key), Some(Slot::Pending { ticket: t }) if *t == ticket)
    }
}

/// Releases a pending reservation unless the bind completed.
struct Reservation<'a> {
    topics: &'a Mutex<Topics>,
    key: &'a TopicKey,
    ticket: u64,
    armed: bool,
}

impl Reservation<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut topics = lock(self.topics);
        if topics.is_pending(self.key, self.ticket) {
            topics.slots.remove(self.key);
            debug!(topic = %self.key, "reservation released");
        }
    }
}

fn lock(topics: &Mutex<Topics>) -> MutexGuard<'_, Topics> {
    topics.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct TopicRegistry {
    broker: Arc<dyn Broker>,
    topics: Mutex<Topics>,
}

impl TopicRegistry {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            topics: Mutex::new(Topics::default()),
        }
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    fn reserve<'a>(&'a self, key: &'a TopicKey) -> Result<Reservation<'a>, TopicError> {
        let mut topics = lock(&self.topics);
        if topics.slots.contains_key(key) {
            return Err(TopicError::AlreadyRegistered {
                topic: key.to_string(),
            });
        }
        topics.next_ticket += 1;
        let ticket = topics.next_ticket;
        topics.slots.insert(key.clone(), Slot::Pending { ticket });
        Ok(Reservation {
            topics: &self.topics,
            key,
            ticket,
            armed: true,
        })
    }

    /// Bind `key` to its durable queue and return the delivery stream.
    ///
    /// Fails with `AlreadyRegistered` without contacting the broker if the key
    /// is bound or being bound. If `unregister` removes the key while the bind
    /// is in flight, the new consumer is cancelled and `Interrupted` is
    /// returned.
    pub async fn register(&self, key: &TopicKey) -> Result<DeliveryStream, TopicError> {
        let reservation = self.reserve(key)?;
        let ticket = reservation.ticket;

        let consumption = match self.broker.consume(key.as_str()).await {
            Ok(c) => c,
            Err(e) => {
                warn!(topic = %key, error = %e, "topic bind failed");
                return Err(e);
            }
        };

        let bound = {
            let mut topics = lock(&self.topics);
            if topics.is_pending(key, ticket) {
                topics.slots.insert(
                    key.clone(),
                    Slot::Active {
                        consumer_tag: consumption.consumer_tag.clone(),
                    },
                );
                true
            } else {
                false
            }
        };
        reservation.disarm();

        if !bound {
            if let Err(e) = self
                .broker
                .cancel(key.as_str(), &consumption.consumer_tag)
                .await
            {
                warn!(topic = %key, error = %e, "failed to cancel interrupted consumer");
            }
            return Err(TopicError::Interrupted {
                topic: key.to_string(),
            });
        }

        info!(topic = %key, broker = self.broker.url(), "topic registered");
        Ok(consumption.stream)
    }

    /// Drop the binding for `key` and stop its consumer.
    ///
    /// Returns `false` if the key was not registered. The durable queue is
    /// left on the broker so events keep accumulating for a later
    /// registration. If the broker refuses the cancel, the binding is kept
    /// and the error returned.
    pub async fn unregister(&self, key: &TopicKey) -> Result<bool, TopicError> {
        let slot = lock(&self.topics).slots.remove(key);
        match slot {
            None => Ok(false),
            Some(Slot::Pending { .. }) => {
                debug!(topic = %key, "pending topic released");
                Ok(true)
            }
            Some(Slot::Active { consumer_tag }) => {
                if let Err(e) = self.broker.cancel(key.as_str(), &consumer_tag).await {
                    let mut topics = lock(&self.topics);
                    if topics.slots.contains_key(key) {
                        warn!(
                            topic = %key,
                            consumer_tag = %consumer_tag,
                            "cancel failed after key was rebound"
                        );
                    } else {
                        topics.slots.insert(key.clone(), Slot::Active { consumer_tag });
                    }
                    return Err(e);
                }
                info!(topic = %key, "topic unregistered");
                Ok(true)
            }
        }
    }

    /// True if `key` is bound or being bound.
    pub async fn contains(&self, key: &TopicKey) -> bool {
        lock(&self.topics).slots.contains_key(key)
    }

    /// Keys with a completed binding, sorted.
    pub async fn active_topics(&self) -> Vec<TopicKey> {
        let topics = lock(&self.topics);
        let mut keys: Vec<TopicKey> = topics
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Active { .. }))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        lock(&self.topics).slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        lock(&self.topics).slots.is_empty()
    }
}
