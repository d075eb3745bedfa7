//! Decoding of inbound dashboard messages.
//!
//! Three shapes arrive on a subscriber connection:
//!
//! - tagged operations: `{"type": "update" | "batch-update" | "clear", "data": ..., "timestamp"?: ...}`
//! - the same operation wrapped in a server envelope:
//!   `{"message": "Message received", "data": {<operation>}, "timestamp": ...}`
//! - bare events as broadcast from the stream: `{"id", "label", "value", "unit", "timestamp"}`,
//!   which are read as an `update` of that metric

use pulseboard_types::MetricUpdate;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// A decoded dashboard operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Upsert one metric.
    Update {
        metric: MetricUpdate,
        timestamp: Option<String>,
    },
    /// Upsert several metrics; later entries win on duplicate ids.
    BatchUpdate {
        metrics: Vec<MetricUpdate>,
        timestamp: Option<String>,
    },
    /// Drop every metric.
    Clear,
    /// A tag this client does not know (or no tag at all). Ignored.
    Unknown(String),
}

impl Operation {
    /// The wire tag of this operation.
    pub fn kind(&self) -> &str {
        match self {
            Operation::Update { .. } => "update",
            Operation::BatchUpdate { .. } => "batch-update",
            Operation::Clear => "clear",
            Operation::Unknown(tag) => tag,
        }
    }
}

/// A message that could not be decoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(String),

    /// A known tag whose `data` has the wrong shape.
    #[error("invalid '{kind}' payload: {reason}")]
    Payload { kind: String, reason: String },
}

/// Parse one text frame into an [`Operation`].
pub fn parse_message(text: &str) -> Result<Operation, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;
    parse_value(value)
}

/// Like [`parse_message`], for an already parsed JSON value.
pub fn parse_value(value: Value) -> Result<Operation, DecodeError> {
    let Value::Object(mut object) = value else {
        return Ok(Operation::Unknown(String::new()));
    };

    if let Some(kind) = object.get("type").and_then(Value::as_str).map(str::to_owned) {
        return parse_tagged(&kind, &mut object);
    }

    if is_server_envelope(&object) {
        if let Some(Value::Object(mut inner)) = object.remove("data") {
            // The envelope's time stands in for an untimed inner operation
            if !inner.contains_key("timestamp") {
                if let Some(timestamp) = object.remove("timestamp") {
                    inner.insert("timestamp".to_owned(), timestamp);
                }
            }
            return parse_value(Value::Object(inner));
        }
    }

    if object.contains_key("id") && object.contains_key("value") {
        let metric = decode("update", Value::Object(object))?;
        return Ok(Operation::Update {
            metric,
            timestamp: None,
        });
    }

    Ok(Operation::Unknown(String::new()))
}

fn is_server_envelope(object: &Map<String, Value>) -> bool {
    object.contains_key("message")
        && object
            .get("data")
            .and_then(Value::as_object)
            .is_some_and(|data| data.contains_key("type"))
}

fn parse_tagged(kind: &str, object: &mut Map<String, Value>) -> Result<Operation, DecodeError> {
    let timestamp = object
        .get("timestamp")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let data = object.remove("data").unwrap_or(Value::Null);

    match kind {
        "update" => Ok(Operation::Update {
            metric: decode(kind, data)?,
            timestamp,
        }),
        "batch-update" => Ok(Operation::BatchUpdate {
            metrics: decode(kind, data)?,
            timestamp,
        }),
        "clear" => Ok(Operation::Clear),
        other => Ok(Operation::Unknown(other.to_owned())),
    }
}

fn decode<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|e| DecodeError::Payload {
        kind: kind.to_owned(),
        reason: e.to_string(),
    })
}
