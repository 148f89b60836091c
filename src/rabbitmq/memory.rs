// src/rabbitmq/memory.rs
// In-process stand-in for a broker: a topic exchange routing on exact keys.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

use super::broker::{Broker, Delivery, DeliveryStream};
use super::errors::{PlantError, Result};

/// A message as it was handed to the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub content_type: String,
}

impl Published {
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.payload)
    }
}

struct BoundQueue {
    name: String,
    keys: HashSet<String>,
    sender: mpsc::UnboundedSender<Delivery>,
}

#[derive(Default)]
struct ExchangeState {
    queues: Vec<BoundQueue>,
    published: Vec<Published>,
    next_queue: u64,
}

/// Shared exchange. Every broker handle created from the same exchange sees
/// the same bindings, like separate processes on one RabbitMQ server.
#[derive(Clone, Default)]
pub struct MemoryExchange {
    state: Arc<Mutex<ExchangeState>>,
}

impl MemoryExchange {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ExchangeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new "connection" with its own exclusive queue.
    pub fn connect(&self) -> MemoryBroker {
        let (sender, receiver) = mpsc::unbounded_channel();
        let name = {
            let mut state = self.state();
            state.next_queue += 1;
            let name = format!("amq.gen-{}", state.next_queue);
            state.queues.push(BoundQueue {
                name: name.clone(),
                keys: HashSet::new(),
                sender,
            });
            name
        };

        MemoryBroker {
            exchange: self.clone(),
            queue: name,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Route a message to every queue bound to `routing_key`.
    pub fn publish(&self, routing_key: &str, payload: Vec<u8>, content_type: &str) {
        let mut state = self.state();
        for queue in state.queues.iter().filter(|q| q.keys.contains(routing_key)) {
            // A queue whose consumer went away just drops the message
            let _ = queue.sender.send(Delivery {
                routing_key: routing_key.to_string(),
                data: payload.clone(),
            });
        }
        state.published.push(Published {
            routing_key: routing_key.to_string(),
            payload,
            content_type: content_type.to_string(),
        });
    }

    /// Everything published so far, oldest first.
    pub fn published(&self) -> Vec<Published> {
        self.state().published.clone()
    }

    pub fn bindings(&self, queue: &str) -> Vec<String> {
        let state = self.state();
        let mut keys: Vec<String> = state
            .queues
            .iter()
            .filter(|q| q.name == queue)
            .flat_map(|q| q.keys.iter().cloned())
            .collect();
        keys.sort();
        keys
    }
}

pub struct MemoryBroker {
    exchange: MemoryExchange,
    queue: String,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>,
}

#[async_trait]
impl Broker for MemoryBroker {
    fn queue_name(&self) -> &str {
        &self.queue
    }

    async fn bind(&self, routing_key: &str) -> Result<()> {
        let mut state = self.exchange.state();
        let queue = state
            .queues
            .iter_mut()
            .find(|q| q.name == self.queue)
            .ok_or_else(|| PlantError::ChannelError(format!("Queue {} is closed", self.queue)))?;
        queue.keys.insert(routing_key.to_string());
        Ok(())
    }

    async fn publish(&self, routing_key: &str, payload: Vec<u8>, content_type: &str) -> Result<()> {
        debug!(routing_key = %routing_key, bytes = payload.len(), "Published message");
        self.exchange.publish(routing_key, payload, content_type);
        Ok(())
    }

    async fn consume(&self) -> Result<DeliveryStream> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| {
                PlantError::ConsumeError(format!("Queue {} already has a consumer", self.queue))
            })?;

        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|delivery| (Ok(delivery), receiver))
        });
        Ok(stream.boxed())
    }

    async fn close(&self) -> Result<()> {
        // Dropping the sender ends the consumer stream
        self.exchange.state().queues.retain(|q| q.name != self.queue);
        Ok(())
    }
}
