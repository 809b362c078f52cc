//! Inbound message records.
//!
//! The host sends many message shapes, and most fields only mean something to
//! the plugin author.  Rather than modelling every shape, a [`MessageRecord`]
//! keeps the decoded JSON object as-is and guarantees one thing: a string
//! `type` field is present.  All other fields are passed through to the
//! consumer untouched.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::protocol::framer::FrameError;

/// One decoded protocol message.
///
/// Serializes back to exactly the JSON object it was decoded from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MessageRecord {
    fields: Map<String, Value>,
}

impl MessageRecord {
    /// The record's `type` field.
    pub fn message_type(&self) -> &str {
        // Presence is checked in `TryFrom<Value>`, the only constructor.
        self.fields
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Returns a payload field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a payload field by name if it is a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// The `pluginId` field carried by `closePlugin` and `info` messages.
    pub fn plugin_id(&self) -> Option<&str> {
        self.get_str("pluginId")
    }

    /// All fields of the record, including `type`.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Converts the record back into a plain JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl TryFrom<Value> for MessageRecord {
    type Error = FrameError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(fields) = value else {
            return Err(FrameError::NotAnObject);
        };
        if !fields.get("type").is_some_and(Value::is_string) {
            return Err(FrameError::MissingType);
        }
        Ok(Self { fields })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
