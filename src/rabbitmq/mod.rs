// src/rabbitmq/mod.rs
// Broker access for plants: the real lapin connection and an in-memory double

pub mod broker;
pub mod connection;
pub mod errors;
pub mod memory;

// Re-export specific items to simplify imports elsewhere
pub use broker::{Broker, Delivery, DeliveryStream, BINARY_CONTENT_TYPE, JSON_CONTENT_TYPE};
pub use connection::LapinBroker;
pub use errors::{PlantError, Result};
pub use memory::{MemoryBroker, MemoryExchange, Published};
