//! Outbound command API.
//!
//! [`CommandSender`] is the only way plugin code writes to the host.  It
//! validates and encodes each command synchronously, then hands the finished
//! bytes to the session task, which owns the socket and performs one
//! `write_all` per command.  A batch therefore reaches the socket as a single
//! write, and two commands never interleave.
//!
//! Precondition failures are returned to the caller before anything is
//! queued; the session is unaffected and the sender stays usable.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use touchportal_core::{
    encode_batch, encode_line, CommandError, CustomStateRegistry, OutboundMessage, StateValue,
};
use tracing::{debug, error};

use crate::domain::SessionState;

/// Work items for the session task's write path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outbound {
    /// Encoded JSON lines to write with a single `write_all`.
    Write(String),
    /// End the session.
    Shutdown,
}

/// Failure to send a command.
#[derive(Debug, Error)]
pub enum SendError {
    /// The command failed a precondition and was not sent.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The session has ended; nothing can be written any more.
    #[error("session is closed")]
    SessionClosed,
}

/// Cloneable handle for sending commands to the host.
#[derive(Debug, Clone)]
pub struct CommandSender {
    plugin_id: Arc<str>,
    tx: mpsc::UnboundedSender<Outbound>,
    registry: Arc<Mutex<CustomStateRegistry>>,
    state: watch::Receiver<SessionState>,
}

impl CommandSender {
    pub(crate) fn new(
        plugin_id: Arc<str>,
        tx: mpsc::UnboundedSender<Outbound>,
        state: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            plugin_id,
            tx,
            registry: Arc::new(Mutex::new(CustomStateRegistry::new())),
            state,
        }
    }

    /// Creates a custom state.  Each id may only be created once per process.
    ///
    /// # Errors
    ///
    /// [`CommandError::DuplicateState`] if `id` was created before.
    pub fn create_state(
        &self,
        id: &str,
        desc: &str,
        default_value: impl Into<Value>,
    ) -> Result<(), SendError> {
        let message = {
            let mut registry = self
                .registry
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.checked(registry.register(id, desc, default_value.into()))?
        };
        self.queue(&message)
    }

    /// Sets a state's value.  `value` is sent in its `Display` form.
    pub fn state_update(&self, id: &str, value: impl std::fmt::Display) -> Result<(), SendError> {
        let message = self.checked(OutboundMessage::state_update(id, value))?;
        self.queue(&message)
    }

    /// Sets several states with one write, in the given order.
    ///
    /// # Errors
    ///
    /// [`CommandError::EmptyBatch`] if `states` is empty.
    pub fn state_update_many(&self, states: &[StateValue]) -> Result<(), SendError> {
        let messages = self.checked(OutboundMessage::state_updates(states))?;
        self.queue_batch(&messages)
    }

    /// Replaces a choice list for every action instance.
    ///
    /// # Errors
    ///
    /// [`CommandError::EmptyChoices`] if `choices` is empty.
    pub fn choice_update(&self, id: &str, choices: Vec<String>) -> Result<(), SendError> {
        let message = self.checked(OutboundMessage::choice_update(id, choices))?;
        self.queue(&message)
    }

    /// Replaces a choice list for one action instance.
    ///
    /// # Errors
    ///
    /// [`CommandError::EmptyChoices`] if `choices` is empty,
    /// [`CommandError::MissingInstanceId`] if `instance_id` is empty.
    pub fn choice_update_specific(
        &self,
        id: &str,
        choices: Vec<String>,
        instance_id: &str,
    ) -> Result<(), SendError> {
        let message = self.checked(OutboundMessage::choice_update_specific(
            id,
            choices,
            instance_id,
        ))?;
        self.queue(&message)
    }

    /// Changes one of the plugin's settings.
    pub fn setting_update(&self, name: &str, value: impl Into<Value>) -> Result<(), SendError> {
        let message = self.checked(OutboundMessage::setting_update(name, value))?;
        self.queue(&message)
    }

    /// Sends one pre-built message.
    ///
    /// The message is held to the same preconditions as the typed methods,
    /// and a `createState` is recorded in the registry.
    ///
    /// # Errors
    ///
    /// Any [`CommandError`] from [`OutboundMessage::validate`], or
    /// [`CommandError::DuplicateState`] for a state created before.
    pub fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        self.admit(std::slice::from_ref(message))?;
        self.queue(message)
    }

    /// Sends several pre-built messages as consecutive JSON lines in one
    /// write.  Nothing is sent if any message fails its preconditions.
    ///
    /// # Errors
    ///
    /// [`CommandError::EmptyBatch`] if `messages` is empty, otherwise as for
    /// [`CommandSender::send`].
    pub fn send_many(&self, messages: &[OutboundMessage]) -> Result<(), SendError> {
        self.admit(messages)?;
        self.queue_batch(messages)
    }

    /// Asks the session to end.  It returns [`crate::infrastructure::session::SessionExit::Shutdown`].
    pub fn shutdown(&self) -> Result<(), SendError> {
        self.enqueue(Outbound::Shutdown)
    }

    /// The session's current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Waits until the session reaches `target` (or has already passed it).
    ///
    /// Returns the state that was observed, which is `Terminated` if the
    /// session ended without ever reaching `target`.
    pub async fn wait_for(&mut self, target: SessionState) -> SessionState {
        let result = self
            .state
            .wait_for(|state| *state == target || state.is_terminal())
            .await
            .map(|state| *state);
        result.unwrap_or(SessionState::Terminated)
    }

    /// Whether `id` was created through this sender or one of its clones.
    pub fn has_state(&self, id: &str) -> bool {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(id)
    }

    fn checked<T>(&self, result: Result<T, CommandError>) -> Result<T, SendError> {
        result.map_err(|err| {
            error!(plugin_id = %self.plugin_id, "{err}");
            SendError::Command(err)
        })
    }

    /// Validates hand-built messages and records their `createState`s.
    fn admit(&self, messages: &[OutboundMessage]) -> Result<(), SendError> {
        for message in messages {
            self.checked(message.validate())?;
        }
        let mut registry = self
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.checked(registry.register_messages(messages))
    }

    fn queue(&self, message: &OutboundMessage) -> Result<(), SendError> {
        let line = self.checked(encode_line(message))?;
        debug!(plugin_id = %self.plugin_id, command = message.type_name(), "queueing command");
        self.enqueue(Outbound::Write(line))
    }

    fn queue_batch(&self, messages: &[OutboundMessage]) -> Result<(), SendError> {
        let batch = self.checked(encode_batch(messages))?;
        debug!(plugin_id = %self.plugin_id, count = messages.len(), "queueing command batch");
        self.enqueue(Outbound::Write(batch))
    }

    fn enqueue(&self, item: Outbound) -> Result<(), SendError> {
        self.tx.send(item).map_err(|_| SendError::SessionClosed)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
