// src/plant/client.rs
use std::fmt;
use std::future::Future;

use futures::StreamExt;
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

use super::envelope::{
    message_plant_id, stamp_observations, Envelope, FinishReason, MessageId, Observation,
};
use super::handler::MessageHandler;
use super::ids::{CounterIds, IdGenerator};
use super::time::now_millis;
use crate::config::PlantConfig;
use crate::rabbitmq::{
    Broker, DeliveryStream, LapinBroker, PlantError, Result, BINARY_CONTENT_TYPE,
    JSON_CONTENT_TYPE,
};

/// A decoded message together with the routing key it was delivered under.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub message: Value,
    pub routing_key: String,
}

/// The plant's queue seen as a sequence of decoded messages.
pub struct Inbox {
    deliveries: DeliveryStream,
}

impl Inbox {
    /// Next message, `None` once the connection is gone. A body that is not
    /// UTF-8 JSON yields `DecodeError` for that delivery only.
    pub async fn next(&mut self) -> Option<Result<InboundMessage>> {
        let delivery = match self.deliveries.next().await? {
            Ok(delivery) => delivery,
            Err(e) => return Some(Err(e)),
        };

        let decoded = serde_json::from_slice::<Value>(&delivery.data)
            .map(|message| InboundMessage {
                message,
                routing_key: delivery.routing_key.clone(),
            })
            .map_err(|e| PlantError::DecodeError {
                routing_key: delivery.routing_key,
                reason: e.to_string(),
            });
        Some(decoded)
    }
}

/// One connection to a topic exchange, a private queue bound to the plant's
/// id, and helpers for the plant message vocabulary.
pub struct PlantClient {
    broker: Box<dyn Broker>,
    config: PlantConfig,
    ids: Box<dyn IdGenerator>,
}

impl PlantClient {
    /// Connect to the broker described by `config`. No retries.
    pub async fn connect(config: PlantConfig) -> Result<Self> {
        config.validate()?;
        let broker = LapinBroker::connect(config.amqp_uri(), &config.exchange).await?;
        Self::with_broker(Box::new(broker), config).await
    }

    /// Build on an already connected broker, binding the plant id if there is one.
    pub async fn with_broker(broker: Box<dyn Broker>, config: PlantConfig) -> Result<Self> {
        if let Some(plant_id) = &config.plant_id {
            broker.bind(plant_id).await?;
        }

        let ids = Box::new(CounterIds::new(config.id_prefix.clone()));
        Ok(Self {
            broker,
            config,
            ids,
        })
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn plant_id(&self) -> Option<&str> {
        self.config.plant_id.as_deref()
    }

    pub fn exchange(&self) -> &str {
        &self.config.exchange
    }

    pub fn queue_name(&self) -> &str {
        self.broker.queue_name()
    }

    /// Also receive messages published under each of `keys`.
    pub async fn subscribe<I, S>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            self.broker.bind(key.as_ref()).await?;
        }
        Ok(())
    }

    /// `plant-id` of `message` when it carries one, otherwise our own.
    pub fn resolve_plant_id(&self, message: Option<&Value>) -> Option<String> {
        message
            .and_then(message_plant_id)
            .or(self.plant_id())
            .map(str::to_string)
    }

    fn correlation_id(message: &Value) -> Result<MessageId> {
        MessageId::from_message(message).ok_or(PlantError::MissingField("id"))
    }

    pub fn make_observation(
        field: impl Into<String>,
        value: impl Into<Value>,
        timestamp: Option<f64>,
    ) -> Observation {
        Observation::new(field, value, timestamp)
    }

    pub fn start_envelope(
        &self,
        function_name: &str,
        plant_id: &str,
        args: Vec<Value>,
        argsmap: Map<String, Value>,
        timestamp: Option<f64>,
    ) -> Envelope {
        Envelope::Start {
            id: MessageId::Text(self.ids.next_id()),
            plant_id: plant_id.to_string(),
            function_name: function_name.to_string(),
            args,
            argsmap,
            timestamp: timestamp.unwrap_or_else(now_millis),
        }
    }

    pub fn started_envelope(&self, original: &Value) -> Result<Envelope> {
        Ok(Envelope::Started {
            id: Self::correlation_id(original)?,
            plant_id: self.resolve_plant_id(Some(original)),
            timestamp: now_millis(),
        })
    }

    pub fn finished_envelope(&self, original: &Value, reason: FinishReason) -> Result<Envelope> {
        Ok(Envelope::Finished {
            id: Self::correlation_id(original)?,
            plant_id: self.resolve_plant_id(Some(original)),
            timestamp: now_millis(),
            reason,
        })
    }

    pub fn observations_envelope(
        &self,
        original: Option<&Value>,
        observations: &[Observation],
        timestamp: Option<f64>,
    ) -> Envelope {
        let timestamp = timestamp.unwrap_or_else(now_millis);
        Envelope::Observations {
            id: original.and_then(MessageId::from_message),
            plant_id: self.resolve_plant_id(original),
            timestamp,
            observations: stamp_observations(observations, timestamp),
        }
    }

    /// Serialize `envelope` and publish it under its routing key.
    pub async fn publish_envelope(&self, envelope: &Envelope) -> Result<()> {
        let payload = serde_json::to_vec(envelope)?;
        debug!(
            state = envelope.state(),
            routing_key = envelope.routing_key(),
            "Publishing envelope"
        );
        self.broker
            .publish(envelope.routing_key(), payload, JSON_CONTENT_TYPE)
            .await
    }

    /// Ask `plant_id` to run `function_name`. Returns the id of the command;
    /// replies are not awaited.
    pub async fn start(
        &self,
        function_name: &str,
        plant_id: &str,
        args: Vec<Value>,
        argsmap: Map<String, Value>,
        timestamp: Option<f64>,
    ) -> Result<MessageId> {
        let envelope = self.start_envelope(function_name, plant_id, args, argsmap, timestamp);
        let id = envelope.id().cloned().ok_or(PlantError::MissingField("id"))?;
        self.publish_envelope(&envelope).await?;
        info!(
            function = %function_name,
            plant_id = %plant_id,
            id = %id,
            "Sent start command"
        );
        Ok(id)
    }

    /// Report that the command in `original` began executing.
    pub async fn started(&self, original: &Value) -> Result<()> {
        let envelope = self.started_envelope(original)?;
        self.publish_envelope(&envelope).await
    }

    pub async fn failed(&self, original: &Value, failure_message: &str) -> Result<()> {
        let envelope = self.finished_envelope(
            original,
            FinishReason::Failed {
                failed_reason: Some(failure_message.to_string()),
            },
        )?;
        self.publish_envelope(&envelope).await
    }

    pub async fn finished(&self, original: &Value) -> Result<()> {
        let envelope = self.finished_envelope(original, FinishReason::Success)?;
        self.publish_envelope(&envelope).await
    }

    /// Publish telemetry. Observations without a timestamp get the envelope's;
    /// the caller's observations are left untouched.
    pub async fn observations(
        &self,
        original: Option<&Value>,
        observations: &[Observation],
        timestamp: Option<f64>,
    ) -> Result<()> {
        let envelope = self.observations_envelope(original, observations, timestamp);
        self.publish_envelope(&envelope).await
    }

    /// Publish raw bytes, outside the envelope format.
    pub async fn binary_publish(&self, routing_key: &str, data: Vec<u8>) -> Result<()> {
        info!(routing_key = %routing_key, bytes = data.len(), "Publishing binary data");
        self.broker
            .publish(routing_key, data, BINARY_CONTENT_TYPE)
            .await
    }

    /// Start consuming (without acknowledgements) and return the message sequence.
    pub async fn messages(&self) -> Result<Inbox> {
        let deliveries = self.broker.consume().await?;
        Ok(Inbox { deliveries })
    }

    /// Dispatch messages to `handler` until Ctrl-C, which ends the loop cleanly.
    pub async fn wait_for_messages<H: MessageHandler>(&self, handler: H) -> Result<()> {
        let interrupted = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for Ctrl-C: {}", e);
                futures::future::pending::<()>().await;
            }
        };
        self.wait_for_messages_until(handler, interrupted).await
    }

    /// Dispatch messages to `handler` until `shutdown` completes or the
    /// connection goes away. Undecodable messages are logged and skipped.
    #[instrument(skip_all, fields(queue = %self.queue_name()))]
    pub async fn wait_for_messages_until<H, F>(&self, mut handler: H, shutdown: F) -> Result<()>
    where
        H: MessageHandler,
        F: Future<Output = ()>,
    {
        info!("{}", self);
        info!("Waiting for commands");

        let mut inbox = self.messages().await?;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Interrupted, leaving receive loop");
                    return Ok(());
                }
                next = inbox.next() => match next {
                    None => {
                        warn!("Delivery stream ended");
                        return Ok(());
                    }
                    Some(Ok(inbound)) => {
                        debug!(routing_key = %inbound.routing_key, "Dispatching message");
                        if let Err(e) = handler
                            .handle(self, inbound.message, &inbound.routing_key)
                            .await
                        {
                            error!(routing_key = %inbound.routing_key, "Message handler failed: {}", e);
                        }
                    }
                    Some(Err(e @ PlantError::DecodeError { .. })) => {
                        warn!("Skipping message: {}", e);
                    }
                    Some(Err(e)) => return Err(e),
                }
            }
        }
    }

    /// Close the connection. Publishes still in flight may be lost.
    pub async fn close(&self) -> Result<()> {
        info!(exchange = %self.config.exchange, "Closing plant connection");
        self.broker.close().await
    }
}

impl fmt::Display for PlantClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "plantid: {}, exchange: {}, host: {}, port: {}",
            self.plant_id().unwrap_or("None"),
            self.config.exchange,
            self.config.host,
            self.config.port
        )
    }
}
