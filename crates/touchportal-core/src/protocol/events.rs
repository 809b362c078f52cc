//! Consumer-facing events.
//!
//! Every inbound message ends up as one or more [`PluginEvent`]s.  Consumers
//! subscribe by [`EventKind`] and receive the typed payload.

use std::fmt;

use serde_json::Value;

use crate::protocol::messages::MessageRecord;

/// Tri-state hold flag carried by [`PluginEvent::Action`].
///
/// `action` messages are momentary presses; `down`/`up` are the two halves
/// of a held button.  All three arrive as the same `Action` event so a plugin
/// needs a single action handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hold {
    /// A plain `action`: not part of a hold (`null`).
    Momentary,
    /// An `up` message: the hold was released (`false`).
    Released,
    /// A `down` message: the hold was engaged (`true`).
    Engaged,
}

impl Hold {
    /// The flag as the host's JSON would express it: `None` for a momentary
    /// action, `Some(false)` for release, `Some(true)` for engage.
    pub fn as_flag(self) -> Option<bool> {
        match self {
            Hold::Momentary => None,
            Hold::Released => Some(false),
            Hold::Engaged => Some(true),
        }
    }
}

/// A typed event delivered to plugin code.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginEvent {
    /// The TCP connection is up and the pair message has been written.
    Connected,
    /// The host asked this plugin to close.  The session ends right after.
    Close(MessageRecord),
    /// The host's reply to pairing (versions, initial settings, ...).
    Info(MessageRecord),
    /// Plugin settings: either `info.settings` or `settings.values`.
    Settings(Value),
    /// The user picked a different entry in an action's choice list.
    ListChange(MessageRecord),
    /// An action was triggered, pressed or released.
    Action { record: MessageRecord, hold: Hold },
    /// A host-wide broadcast such as a page change.
    Broadcast(MessageRecord),
    /// Any message type this library does not classify.
    Message(MessageRecord),
    /// A newer plugin version is available.
    Update { current: String, latest: String },
}

impl PluginEvent {
    /// The subscription key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            PluginEvent::Connected => EventKind::Connected,
            PluginEvent::Close(_) => EventKind::Close,
            PluginEvent::Info(_) => EventKind::Info,
            PluginEvent::Settings(_) => EventKind::Settings,
            PluginEvent::ListChange(_) => EventKind::ListChange,
            PluginEvent::Action { .. } => EventKind::Action,
            PluginEvent::Broadcast(_) => EventKind::Broadcast,
            PluginEvent::Message(_) => EventKind::Message,
            PluginEvent::Update { .. } => EventKind::Update,
        }
    }

    /// The message record behind the event, if there is one.
    pub fn record(&self) -> Option<&MessageRecord> {
        match self {
            PluginEvent::Close(record)
            | PluginEvent::Info(record)
            | PluginEvent::ListChange(record)
            | PluginEvent::Action { record, .. }
            | PluginEvent::Broadcast(record)
            | PluginEvent::Message(record) => Some(record),
            PluginEvent::Connected | PluginEvent::Settings(_) | PluginEvent::Update { .. } => None,
        }
    }
}

/// Payload-free discriminant of [`PluginEvent`], used to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Close,
    Info,
    Settings,
    ListChange,
    Action,
    Broadcast,
    Message,
    Update,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 9] = [
        EventKind::Connected,
        EventKind::Close,
        EventKind::Info,
        EventKind::Settings,
        EventKind::ListChange,
        EventKind::Action,
        EventKind::Broadcast,
        EventKind::Message,
        EventKind::Update,
    ];

    /// The event name plugin authors know from the host documentation.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::Close => "Close",
            EventKind::Info => "Info",
            EventKind::Settings => "Settings",
            EventKind::ListChange => "ListChange",
            EventKind::Action => "Action",
            EventKind::Broadcast => "Broadcast",
            EventKind::Message => "Message",
            EventKind::Update => "Update",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
