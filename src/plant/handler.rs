// src/plant/handler.rs
use async_trait::async_trait;
use serde_json::Value;

use super::client::PlantClient;
use crate::rabbitmq::Result;

/// Receives every decoded message arriving on the plant's queue, one at a
/// time and in order. The client is handed back so replies (`started`,
/// `finished`, ...) can be published from inside the handler.
///
/// An `Err` is logged by the receive loop and does not stop it.
#[async_trait]
pub trait MessageHandler: Send {
    async fn handle(&mut self, plant: &PlantClient, message: Value, routing_key: &str)
        -> Result<()>;
}

/// Adapts a plain closure. Closures cannot await, so this suits handlers
/// that only record or forward what they see.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: FnMut(&PlantClient, Value, &str) -> Result<()> + Send,
{
    async fn handle(
        &mut self,
        plant: &PlantClient,
        message: Value,
        routing_key: &str,
    ) -> Result<()> {
        (self.0)(plant, message, routing_key)
    }
}

pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: FnMut(&PlantClient, Value, &str) -> Result<()> + Send,
{
    FnHandler(f)
}
