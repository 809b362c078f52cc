//! Outbound command shapes and their preconditions.
//!
//! Every command is a single-line JSON object followed by `\n`:
//!
//! ```json
//! {"type":"pair","id":"demo.plugin"}
//! {"type":"stateUpdate","id":"demo.state","value":"42"}
//! {"type":"choiceUpdate","id":"demo.list","value":["a","b"],"instanceId":"i1"}
//! ```
//!
//! The constructors below check preconditions up front, so a malformed
//! command is rejected with a [`CommandError`] before a single byte reaches
//! the socket.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A command rejected before sending.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A required identifier or name was empty.
    #[error("{operation}: identifier is empty")]
    EmptyIdentifier { operation: &'static str },

    /// A choice list update carried no choices.
    #[error("choiceUpdate: value is an empty array")]
    EmptyChoices,

    /// An instance-scoped choice update had no instance id.
    #[error("choiceUpdate: instanceId is not populated")]
    MissingInstanceId,

    /// A batch send had nothing in it.
    #[error("{operation}: batch contains no data")]
    EmptyBatch { operation: &'static str },

    /// `pair` is written by the session when it connects, never by plugin
    /// code.
    #[error("pair: sent automatically when the session connects")]
    PairNotAllowed,

    /// `createState` was called twice for the same id.
    #[error("createState: custom state {0} already created")]
    DuplicateState(String),

    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// All messages a plugin sends to the host.
///
/// # Serde representation
///
/// `tag = "type"` puts the camelCase variant name in the `type` field and the
/// variant's fields next to it in the same object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Identifies the plugin right after the connection is established.
    Pair { id: String },

    /// Creates a state at runtime.
    CreateState {
        id: String,
        desc: String,
        #[serde(rename = "defaultValue")]
        default_value: Value,
    },

    /// Sets a state's value.  The host treats every value as a string.
    StateUpdate { id: String, value: String },

    /// Replaces the choices of a list, globally or for one action instance.
    ChoiceUpdate {
        id: String,
        value: Vec<String>,
        #[serde(
            rename = "instanceId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        instance_id: Option<String>,
    },

    /// Changes one of the plugin's settings.
    SettingUpdate { name: String, value: Value },
}

/// One `id`/`value` pair for a batched state update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateValue {
    pub id: String,
    pub value: String,
}

impl StateValue {
    pub fn new(id: impl Into<String>, value: impl Display) -> Self {
        Self {
            id: id.into(),
            value: value.to_string(),
        }
    }
}

fn require_id(id: &str, operation: &'static str) -> Result<(), CommandError> {
    if id.is_empty() {
        return Err(CommandError::EmptyIdentifier { operation });
    }
    Ok(())
}

impl OutboundMessage {
    /// The pairing handshake message.
    pub fn pair(plugin_id: impl Into<String>) -> Self {
        OutboundMessage::Pair {
            id: plugin_id.into(),
        }
    }

    /// A `createState` command.
    ///
    /// Duplicate detection needs session state and lives in
    /// [`crate::registry::CustomStateRegistry`].
    pub fn create_state(
        id: impl Into<String>,
        desc: impl Into<String>,
        default_value: impl Into<Value>,
    ) -> Result<Self, CommandError> {
        let id = id.into();
        require_id(&id, "createState")?;
        Ok(OutboundMessage::CreateState {
            id,
            desc: desc.into(),
            default_value: default_value.into(),
        })
    }

    /// A `stateUpdate` command.  `value` is sent in its `Display` form.
    pub fn state_update(id: impl Into<String>, value: impl Display) -> Result<Self, CommandError> {
        let id = id.into();
        require_id(&id, "stateUpdate")?;
        Ok(OutboundMessage::StateUpdate {
            id,
            value: value.to_string(),
        })
    }

    /// One `stateUpdate` per element of `states`, in order.
    pub fn state_updates(states: &[StateValue]) -> Result<Vec<Self>, CommandError> {
        if states.is_empty() {
            return Err(CommandError::EmptyBatch {
                operation: "stateUpdateMany",
            });
        }
        states
            .iter()
            .map(|state| Self::state_update(state.id.clone(), &state.value))
            .collect()
    }

    /// A global `choiceUpdate`.
    pub fn choice_update(id: impl Into<String>, choices: Vec<String>) -> Result<Self, CommandError> {
        Self::build_choice_update(id.into(), choices, None)
    }

    /// A `choiceUpdate` scoped to one action instance.
    pub fn choice_update_specific(
        id: impl Into<String>,
        choices: Vec<String>,
        instance_id: impl Into<String>,
    ) -> Result<Self, CommandError> {
        Self::build_choice_update(id.into(), choices, Some(instance_id.into()))
    }

    fn build_choice_update(
        id: String,
        choices: Vec<String>,
        instance_id: Option<String>,
    ) -> Result<Self, CommandError> {
        let message = OutboundMessage::ChoiceUpdate {
            id,
            value: choices,
            instance_id,
        };
        message.validate()?;
        Ok(message)
    }

    /// A `settingUpdate` command.
    pub fn setting_update(
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, CommandError> {
        let name = name.into();
        require_id(&name, "settingUpdate")?;
        Ok(OutboundMessage::SettingUpdate {
            name,
            value: value.into(),
        })
    }

    /// Checks the preconditions the constructors enforce, for messages built
    /// by hand.
    ///
    /// # Errors
    ///
    /// - [`CommandError::PairNotAllowed`] for `pair`.
    /// - [`CommandError::EmptyIdentifier`] for an empty id or setting name.
    /// - [`CommandError::EmptyChoices`] / [`CommandError::MissingInstanceId`]
    ///   for a malformed `choiceUpdate`.
    pub fn validate(&self) -> Result<(), CommandError> {
        match self {
            OutboundMessage::Pair { .. } => Err(CommandError::PairNotAllowed),
            OutboundMessage::CreateState { id, .. } => require_id(id, "createState"),
            OutboundMessage::StateUpdate { id, .. } => require_id(id, "stateUpdate"),
            OutboundMessage::ChoiceUpdate {
                id,
                value,
                instance_id,
            } => {
                require_id(id, "choiceUpdate")?;
                if value.is_empty() {
                    return Err(CommandError::EmptyChoices);
                }
                if instance_id.as_deref() == Some("") {
                    return Err(CommandError::MissingInstanceId);
                }
                Ok(())
            }
            OutboundMessage::SettingUpdate { name, .. } => require_id(name, "settingUpdate"),
        }
    }

    /// The wire name of this command.
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundMessage::Pair { .. } => "pair",
            OutboundMessage::CreateState { .. } => "createState",
            OutboundMessage::StateUpdate { .. } => "stateUpdate",
            OutboundMessage::ChoiceUpdate { .. } => "choiceUpdate",
            OutboundMessage::SettingUpdate { .. } => "settingUpdate",
        }
    }
}

/// Serializes one message as a JSON line including the trailing `\n`.
pub fn encode_line(message: &OutboundMessage) -> Result<String, CommandError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Serializes every message as its own JSON line, concatenated in order, so
/// the whole batch can go out in one write.
pub fn encode_batch(messages: &[OutboundMessage]) -> Result<String, CommandError> {
    if messages.is_empty() {
        return Err(CommandError::EmptyBatch {
            operation: "sendArray",
        });
    }
    let mut out = String::new();
    for message in messages {
        out.push_str(&encode_line(message)?);
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pair_encodes_as_single_line() {
        let line = encode_line(&OutboundMessage::pair("demo.plugin")).unwrap();
        assert_eq!(line, "{\"type\":\"pair\",\"id\":\"demo.plugin\"}\n");
    }

    #[test]
    fn test_create_state_uses_camel_case_default_value() {
        // Arrange
        let msg = OutboundMessage::create_state("demo.s", "Demo state", "off").unwrap();

        // Act
        let value = serde_json::to_value(&msg).unwrap();

        // Assert
        assert_eq!(
            value,
            json!({"type": "createState", "id": "demo.s", "desc": "Demo state", "defaultValue": "off"})
        );
    }

    #[test]
    fn test_state_update_stringifies_value() {
        let msg = OutboundMessage::state_update("demo.count", 42).unwrap();
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "stateUpdate", "id": "demo.count", "value": "42"})
        );
    }

    #[test]
    fn test_empty_identifier_is_rejected() {
        assert!(matches!(
            OutboundMessage::state_update("", "x"),
            Err(CommandError::EmptyIdentifier {
                operation: "stateUpdate"
            })
        ));
        assert!(matches!(
            OutboundMessage::setting_update("", 1),
            Err(CommandError::EmptyIdentifier { .. })
        ));
        assert!(matches!(
            OutboundMessage::create_state("", "d", 0),
            Err(CommandError::EmptyIdentifier { .. })
        ));
    }

    #[test]
    fn test_choice_update_rejects_empty_choices() {
        let result = OutboundMessage::choice_update("demo.list", vec![]);
        assert!(matches!(result, Err(CommandError::EmptyChoices)));
    }

    #[test]
    fn test_choice_update_omits_instance_id_when_global() {
        let msg = OutboundMessage::choice_update("demo.list", vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(
            encode_line(&msg).unwrap(),
            "{\"type\":\"choiceUpdate\",\"id\":\"demo.list\",\"value\":[\"a\",\"b\"]}\n"
        );
    }

    #[test]
    fn test_choice_update_specific_rejects_empty_choices_and_instance() {
        assert!(matches!(
            OutboundMessage::choice_update_specific("demo.list", vec![], "inst"),
            Err(CommandError::EmptyChoices)
        ));
        assert!(matches!(
            OutboundMessage::choice_update_specific("demo.list", vec!["a".into()], ""),
            Err(CommandError::MissingInstanceId)
        ));
    }

    #[test]
    fn test_choice_update_specific_carries_instance_id() {
        let msg =
            OutboundMessage::choice_update_specific("demo.list", vec!["a".into()], "inst-1").unwrap();
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "choiceUpdate", "id": "demo.list", "value": ["a"], "instanceId": "inst-1"})
        );
    }

    #[test]
    fn test_state_updates_rejects_empty_batch() {
        assert!(matches!(
            OutboundMessage::state_updates(&[]),
            Err(CommandError::EmptyBatch {
                operation: "stateUpdateMany"
            })
        ));
    }

    #[test]
    fn test_batch_encodes_one_line_per_message_in_order() {
        // Arrange
        let messages = OutboundMessage::state_updates(&[
            StateValue::new("s1", "a"),
            StateValue::new("s2", 2),
            StateValue::new("s3", true),
        ])
        .unwrap();

        // Act
        let batch = encode_batch(&messages).unwrap();

        // Assert
        let lines: Vec<&str> = batch.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(batch.ends_with('\n'));
        assert_eq!(lines[0], "{\"type\":\"stateUpdate\",\"id\":\"s1\",\"value\":\"a\"}");
        assert_eq!(lines[1], "{\"type\":\"stateUpdate\",\"id\":\"s2\",\"value\":\"2\"}");
        assert_eq!(lines[2], "{\"type\":\"stateUpdate\",\"id\":\"s3\",\"value\":\"true\"}");
    }

    #[test]
    fn test_encode_batch_rejects_empty() {
        assert!(matches!(
            encode_batch(&[]),
            Err(CommandError::EmptyBatch { .. })
        ));
    }

    #[test]
    fn test_outbound_message_parses_back_from_wire_shape() {
        let msg: OutboundMessage =
            serde_json::from_str("{\"type\":\"settingUpdate\",\"name\":\"Interval\",\"value\":\"10\"}")
                .unwrap();
        assert_eq!(msg.type_name(), "settingUpdate");
        assert_eq!(
            msg,
            OutboundMessage::SettingUpdate {
                name: "Interval".into(),
                value: json!("10"),
            }
        );
    }

    #[test]
    fn test_validate_rejects_hand_built_malformed_messages() {
        // Arrange
        let empty_choices = OutboundMessage::ChoiceUpdate {
            id: "demo.list".into(),
            value: vec![],
            instance_id: Some("".into()),
        };
        let blank_instance = OutboundMessage::ChoiceUpdate {
            id: "demo.list".into(),
            value: vec!["a".into()],
            instance_id: Some("".into()),
        };
        let unnamed_setting = OutboundMessage::SettingUpdate {
            name: String::new(),
            value: json!("1"),
        };

        // Act / Assert
        assert!(matches!(empty_choices.validate(), Err(CommandError::EmptyChoices)));
        assert!(matches!(blank_instance.validate(), Err(CommandError::MissingInstanceId)));
        assert!(matches!(
            unnamed_setting.validate(),
            Err(CommandError::EmptyIdentifier { operation: "settingUpdate" })
        ));
        assert!(matches!(
            OutboundMessage::pair("demo").validate(),
            Err(CommandError::PairNotAllowed)
        ));
    }

    #[test]
    fn test_validate_accepts_constructed_messages() {
        let messages = [
            OutboundMessage::create_state("demo.s", "Demo", "off").unwrap(),
            OutboundMessage::state_update("demo.s", "on").unwrap(),
            OutboundMessage::choice_update_specific("demo.list", vec!["a".into()], "i1").unwrap(),
            OutboundMessage::setting_update("Interval", "5").unwrap(),
        ];
        for message in &messages {
            assert!(message.validate().is_ok(), "{message:?}");
        }
    }
}
