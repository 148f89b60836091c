// src/plant/mod.rs
// Plant control and telemetry messages over a topic exchange

pub mod client;
pub mod envelope;
pub mod handler;
pub mod ids;
pub mod time;

pub use client::{InboundMessage, Inbox, PlantClient};
pub use envelope::{Envelope, FinishReason, MessageId, Observation, OBSERVATIONS_KEY};
pub use handler::{from_fn, FnHandler, MessageHandler};
pub use ids::{CounterIds, IdGenerator};
