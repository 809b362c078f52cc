//! Custom states created by this plugin at runtime.
//!
//! The host rejects nothing on its side, so creating the same state twice
//! would silently produce a duplicate.  The registry remembers every id passed
//! to `createState` and refuses a second registration.  Entries are never
//! removed.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::protocol::commands::{CommandError, OutboundMessage};

/// What was sent when a state was created.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRegistration {
    pub desc: String,
    pub default_value: Value,
}

/// Append-only map from state id to its registration.
#[derive(Debug, Default)]
pub struct CustomStateRegistry {
    states: HashMap<String, StateRegistration>,
}

impl CustomStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new state and returns the `createState` message to send.
    ///
    /// # Errors
    ///
    /// - [`CommandError::DuplicateState`] if `id` was registered before.
    /// - [`CommandError::EmptyIdentifier`] if `id` is empty.
    pub fn register(
        &mut self,
        id: &str,
        desc: &str,
        default_value: Value,
    ) -> Result<OutboundMessage, CommandError> {
        if self.states.contains_key(id) {
            return Err(CommandError::DuplicateState(id.to_string()));
        }
        let message = OutboundMessage::create_state(id, desc, default_value.clone())?;
        self.states.insert(
            id.to_string(),
            StateRegistration {
                desc: desc.to_string(),
                default_value,
            },
        );
        Ok(message)
    }

    /// Records every `createState` in `messages`, all or nothing.  Other
    /// message types are ignored.
    ///
    /// # Errors
    ///
    /// [`CommandError::DuplicateState`] if an id was registered before or
    /// appears twice in `messages`; nothing is recorded in that case.
    pub fn register_messages(&mut self, messages: &[OutboundMessage]) -> Result<(), CommandError> {
        let mut batch = HashSet::new();
        for message in messages {
            if let OutboundMessage::CreateState { id, .. } = message {
                if self.states.contains_key(id) || !batch.insert(id.as_str()) {
                    return Err(CommandError::DuplicateState(id.clone()));
                }
            }
        }
        for message in messages {
            if let OutboundMessage::CreateState {
                id,
                desc,
                default_value,
            } = message
            {
                self.states.insert(
                    id.clone(),
                    StateRegistration {
                        desc: desc.clone(),
                        default_value: default_value.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.states.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&StateRegistration> {
        self.states.get(id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
