// src/rabbitmq/errors.rs

use lapin::Error as LapinError;
use serde_json::Error as SerdeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlantError {
    #[error("RabbitMQ connection error: {0}")]
    ConnectionError(String),

    #[error("RabbitMQ channel error: {0}")]
    ChannelError(String),

    #[error("Message serialization error: {0}")]
    SerializationError(#[from] SerdeError),

    #[error("Undecodable message on routing key '{routing_key}': {reason}")]
    DecodeError { routing_key: String, reason: String },

    #[error("RabbitMQ publish error: {0}")]
    PublishError(String),

    #[error("RabbitMQ consume error: {0}")]
    ConsumeError(String),

    #[error("Message is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

// Custom Result type for plant operations
pub type Result<T> = std::result::Result<T, PlantError>;

// Converting from lapin errors
impl From<LapinError> for PlantError {
    fn from(error: LapinError) -> Self {
        classify(error.to_string())
    }
}

// Use string representation for classification; anything unrecognised is
// treated as a broken connection
fn classify(error_text: String) -> PlantError {
    let lowered = error_text.to_lowercase();

    if lowered.contains("channel") {
        PlantError::ChannelError(error_text)
    } else if lowered.contains("publish") {
        PlantError::PublishError(error_text)
    } else if lowered.contains("consume") {
        PlantError::ConsumeError(error_text)
    } else {
        PlantError::ConnectionError(error_text)
    }
}
