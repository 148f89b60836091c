// src/rabbitmq/connection.rs
use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::*, types::FieldTable, uri::AMQPUri, BasicProperties, Channel, Connection,
    ConnectionProperties, ExchangeKind,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::broker::{Broker, Delivery, DeliveryStream};
use super::errors::{PlantError, Result};

/// AMQP broker reached through lapin.
pub struct LapinBroker {
    connection: Connection,
    channel: Channel,
    exchange: String,
    queue: String,
}

impl LapinBroker {
    /// Connect, declare the topic exchange and an exclusive server-named queue.
    /// Fails fast: there is no reconnect policy.
    pub async fn connect(uri: AMQPUri, exchange: &str) -> Result<Self> {
        info!(
            host = %uri.authority.host,
            port = uri.authority.port,
            exchange = %exchange,
            "Connecting to RabbitMQ"
        );

        let connection = Connection::connect_uri(uri, ConnectionProperties::default())
            .await
            .map_err(|e| PlantError::ConnectionError(format!("Failed to connect: {}", e)))?;

        let channel = connection.create_channel().await?;

        // Redeclaring an existing topic exchange with the same type is a no-op
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                PlantError::ConnectionError(format!("Failed to declare exchange: {}", e))
            })?;

        let queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| PlantError::ConnectionError(format!("Failed to declare queue: {}", e)))?;

        let queue = queue.name().as_str().to_string();
        info!(exchange = %exchange, queue = %queue, "Connected to RabbitMQ");

        Ok(Self {
            connection,
            channel,
            exchange: exchange.to_string(),
            queue,
        })
    }
}

#[async_trait]
impl Broker for LapinBroker {
    fn queue_name(&self) -> &str {
        &self.queue
    }

    async fn bind(&self, routing_key: &str) -> Result<()> {
        self.channel
            .queue_bind(
                &self.queue,
                &self.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(queue = %self.queue, routing_key = %routing_key, "Queue bound");
        Ok(())
    }

    async fn publish(&self, routing_key: &str, payload: Vec<u8>, content_type: &str) -> Result<()> {
        let properties = BasicProperties::default().with_content_type(content_type.into());

        self.channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await?;

        debug!(
            exchange = %self.exchange,
            routing_key = %routing_key,
            bytes = payload.len(),
            "Published message"
        );
        Ok(())
    }

    async fn consume(&self) -> Result<DeliveryStream> {
        let consumer = self
            .channel
            .basic_consume(
                &self.queue,
                &format!("plant-{}", Uuid::new_v4()),
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        info!(queue = %self.queue, "Started consuming");

        let stream = consumer.map(|delivery| {
            delivery
                .map(|delivery| Delivery {
                    routing_key: delivery.routing_key.as_str().to_string(),
                    data: delivery.data,
                })
                .map_err(|e| PlantError::ConsumeError(e.to_string()))
        });

        Ok(stream.boxed())
    }

    async fn close(&self) -> Result<()> {
        info!("Closing RabbitMQ connection");
        if let Err(e) = self.connection.close(0, "Closing plant").await {
            // Closing an already-broken connection fails; nothing left to release
            warn!("Error while closing connection: {}", e);
        }
        Ok(())
    }
}
