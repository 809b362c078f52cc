//! Inbound message classification.
//!
//! Maps a record's `type` field to the events a consumer sees:
//!
//! | `type`        | events                                   |
//! |---------------|------------------------------------------|
//! | `closePlugin` | `Close` (only when addressed to us)      |
//! | `info`        | `Info`, then `Settings` if it has any    |
//! | `settings`    | `Settings` with the `values` field       |
//! | `listChange`  | `ListChange`                             |
//! | `action`      | `Action` / [`Hold::Momentary`]           |
//! | `broadcast`   | `Broadcast`                              |
//! | `up`          | `Action` / [`Hold::Released`]            |
//! | `down`        | `Action` / [`Hold::Engaged`]             |
//! | anything else | `Message` with the full record           |

use serde_json::Value;
use tracing::debug;

use crate::protocol::events::{Hold, PluginEvent};
use crate::protocol::messages::MessageRecord;

/// Semantic category of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    ClosePlugin,
    Info,
    Settings,
    ListChange,
    Action,
    Broadcast,
    Up,
    Down,
    /// Any type not listed above.
    Other,
}

impl EventCategory {
    /// Looks up a `type` value by exact, case-sensitive match.
    pub fn from_type(message_type: &str) -> Self {
        match message_type {
            "closePlugin" => EventCategory::ClosePlugin,
            "info" => EventCategory::Info,
            "settings" => EventCategory::Settings,
            "listChange" => EventCategory::ListChange,
            "action" => EventCategory::Action,
            "broadcast" => EventCategory::Broadcast,
            "up" => EventCategory::Up,
            "down" => EventCategory::Down,
            _ => EventCategory::Other,
        }
    }
}

/// Result of classifying one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    /// Events to emit, in order.
    pub events: Vec<PluginEvent>,
    /// The host told this plugin to close.  Emit `events` first, then end the
    /// session.
    pub close_requested: bool,
}

impl Classified {
    fn emit(events: Vec<PluginEvent>) -> Self {
        Self {
            events,
            close_requested: false,
        }
    }
}

/// Whether an `info` message's `settings` field is worth emitting.  `null`,
/// `false`, `0` and `""` count as absent; any array or object counts, even an
/// empty one.
fn carries_settings(settings: &Value) -> bool {
    match settings {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Classifies `record` for the plugin identified by `plugin_id`.
///
/// A `closePlugin` addressed to another plugin yields no events at all.
pub fn classify(record: MessageRecord, plugin_id: &str) -> Classified {
    match EventCategory::from_type(record.message_type()) {
        EventCategory::ClosePlugin => {
            if record.plugin_id() == Some(plugin_id) {
                Classified {
                    events: vec![PluginEvent::Close(record)],
                    close_requested: true,
                }
            } else {
                debug!(
                    target_plugin = record.plugin_id().unwrap_or("<none>"),
                    "ignoring closePlugin addressed to another plugin"
                );
                Classified::emit(Vec::new())
            }
        }
        EventCategory::Info => {
            let settings = record
                .get("settings")
                .filter(|settings| carries_settings(settings))
                .cloned();
            let mut events = vec![PluginEvent::Info(record)];
            if let Some(settings) = settings {
                events.push(PluginEvent::Settings(settings));
            }
            Classified::emit(events)
        }
        EventCategory::Settings => {
            let values = record.get("values").cloned().unwrap_or(Value::Null);
            Classified::emit(vec![PluginEvent::Settings(values)])
        }
        EventCategory::ListChange => Classified::emit(vec![PluginEvent::ListChange(record)]),
        EventCategory::Action => Classified::emit(vec![PluginEvent::Action {
            record,
            hold: Hold::Momentary,
        }]),
        EventCategory::Broadcast => Classified::emit(vec![PluginEvent::Broadcast(record)]),
        EventCategory::Up => Classified::emit(vec![PluginEvent::Action {
            record,
            hold: Hold::Released,
        }]),
        EventCategory::Down => Classified::emit(vec![PluginEvent::Action {
            record,
            hold: Hold::Engaged,
        }]),
        EventCategory::Other => {
            debug!(message_type = record.message_type(), "unhandled message type");
            Classified::emit(vec![PluginEvent::Message(record)])
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
