//! Client helpers for plants: devices and processes that take `start`
//! commands and report `started`, `finished` and observations over a
//! RabbitMQ topic exchange.

pub mod config;
pub mod plant;
pub mod rabbitmq;

pub use config::PlantConfig;
pub use plant::{
    Envelope, FinishReason, MessageHandler, MessageId, Observation, PlantClient,
};
pub use rabbitmq::{PlantError, Result};
