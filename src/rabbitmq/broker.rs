// src/rabbitmq/broker.rs
// The slice of broker functionality a plant needs. Everything behind this
// trait (framing, acks, reconnection) belongs to the broker client.

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::errors::Result;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const BINARY_CONTENT_TYPE: &str = "application/x-binary";

/// A message taken off the plant's private queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub routing_key: String,
    pub data: Vec<u8>,
}

pub type DeliveryStream = BoxStream<'static, Result<Delivery>>;

/// One connection, one topic exchange and one exclusive queue bound to it.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Server-assigned name of the private queue.
    fn queue_name(&self) -> &str;

    /// Bind the private queue to the exchange under `routing_key`.
    async fn bind(&self, routing_key: &str) -> Result<()>;

    /// Publish `payload` to the exchange under `routing_key`.
    async fn publish(&self, routing_key: &str, payload: Vec<u8>, content_type: &str) -> Result<()>;

    /// Start consuming the private queue without acknowledgements.
    async fn consume(&self) -> Result<DeliveryStream>;

    /// Close the connection. Best-effort: in-flight publishes may be lost.
    async fn close(&self) -> Result<()>;
}
