// src/plant/envelope.rs
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::rabbitmq::Result;

/// Routing key for every lifecycle acknowledgement and telemetry message.
pub const OBSERVATIONS_KEY: &str = "observations";

/// Correlation id. Replies copy the id of the request verbatim, and other
/// implementations are free to use numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Text(String),
    Number(serde_json::Number),
}

impl MessageId {
    /// Read the `id` of a decoded message. Ids that are neither strings nor
    /// numbers are treated as absent.
    pub fn from_message(message: &Value) -> Option<Self> {
        match message.get("id")? {
            Value::String(text) => Some(MessageId::Text(text.clone())),
            Value::Number(number) => Some(MessageId::Number(number.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Text(text) => f.write_str(text),
            MessageId::Number(number) => write!(f, "{}", number),
        }
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        MessageId::Text(id)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        MessageId::Text(id.to_string())
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        MessageId::Number(id.into())
    }
}

/// The `plant-id` carried by a decoded message, if it is a string. `null` or
/// any other non-string value counts as absent, so replies fall back to the
/// sender's own id instead of echoing a malformed one.
pub fn message_plant_id(message: &Value) -> Option<&str> {
    message.get("plant-id").and_then(Value::as_str)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "finish-state", rename_all = "lowercase")]
pub enum FinishReason {
    Success,
    Failed {
        #[serde(
            rename = "failed-reason",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        failed_reason: Option<String>,
    },
}

/// A single telemetry reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub field: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl Observation {
    pub fn new(field: impl Into<String>, value: impl Into<Value>, timestamp: Option<f64>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            timestamp,
        }
    }
}

/// Copy `observations`, giving the ones without a timestamp `timestamp`.
pub fn stamp_observations(observations: &[Observation], timestamp: f64) -> Vec<Observation> {
    observations
        .iter()
        .map(|observation| Observation {
            timestamp: observation.timestamp.or(Some(timestamp)),
            ..observation.clone()
        })
        .collect()
}

/// Every message a plant sends or understands, keyed by its `state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase", rename_all_fields = "kebab-case")]
pub enum Envelope {
    /// Command asking `plant_id` to run `function_name`.
    Start {
        id: MessageId,
        plant_id: String,
        function_name: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(default)]
        argsmap: Map<String, Value>,
        timestamp: f64,
    },
    Started {
        id: MessageId,
        plant_id: Option<String>,
        timestamp: f64,
    },
    Finished {
        id: MessageId,
        plant_id: Option<String>,
        timestamp: f64,
        reason: FinishReason,
    },
    Observations {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<MessageId>,
        plant_id: Option<String>,
        timestamp: f64,
        observations: Vec<Observation>,
    },
}

impl Envelope {
    /// Typed view of a message handed to a message handler.
    pub fn from_value(message: &Value) -> Result<Self> {
        Ok(serde_json::from_value(message.clone())?)
    }

    pub fn state(&self) -> &'static str {
        match self {
            Envelope::Start { .. } => "start",
            Envelope::Started { .. } => "started",
            Envelope::Finished { .. } => "finished",
            Envelope::Observations { .. } => "observations",
        }
    }

    /// Commands go to the target plant; everything else to `observations`.
    pub fn routing_key(&self) -> &str {
        match self {
            Envelope::Start { plant_id, .. } => plant_id.as_str(),
            _ => OBSERVATIONS_KEY,
        }
    }

    pub fn id(&self) -> Option<&MessageId> {
        match self {
            Envelope::Start { id, .. }
            | Envelope::Started { id, .. }
            | Envelope::Finished { id, .. } => Some(id),
            Envelope::Observations { id, .. } => id.as_ref(),
        }
    }

    pub fn plant_id(&self) -> Option<&str> {
        match self {
            Envelope::Start { plant_id, .. } => Some(plant_id.as_str()),
            Envelope::Started { plant_id, .. }
            | Envelope::Finished { plant_id, .. }
            | Envelope::Observations { plant_id, .. } => plant_id.as_deref(),
        }
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            Envelope::Start { timestamp, .. }
            | Envelope::Started { timestamp, .. }
            | Envelope::Finished { timestamp, .. }
            | Envelope::Observations { timestamp, .. } => *timestamp,
        }
    }
}
