//! Typed event dispatch.
//!
//! Plugin code registers callbacks per [`EventKind`] (or for every event) and
//! the session calls [`Dispatcher::emit`] once per event, in the order the
//! events were framed.  Callbacks run synchronously on the session task, so
//! a callback observes events strictly one after another.
//!
//! # Example
//!
//! ```rust
//! use touchportal_core::{EventKind, PluginEvent};
//! use touchportal_plugin::application::Dispatcher;
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.on(EventKind::Connected, |_| println!("paired"));
//! assert_eq!(dispatcher.emit(&PluginEvent::Connected), 1);
//! ```

use std::fmt;

use tokio::sync::mpsc;
use touchportal_core::{EventKind, PluginEvent};
use tracing::trace;

/// A registered callback.
pub type EventHandler = Box<dyn FnMut(&PluginEvent) + Send + 'static>;

/// Handle returned by [`Dispatcher::on`] and [`Dispatcher::on_any`], used to
/// unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    /// `None` matches every event.
    kind: Option<EventKind>,
    handler: EventHandler,
}

/// Ordered list of event subscriptions.
#[derive(Default)]
pub struct Dispatcher {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `handler` for every event of `kind`.
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&PluginEvent) + Send + 'static,
    {
        self.subscribe(Some(kind), Box::new(handler))
    }

    /// Calls `handler` for every event.
    pub fn on_any<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&PluginEvent) + Send + 'static,
    {
        self.subscribe(None, Box::new(handler))
    }

    /// Forwards a clone of every event to the returned channel.
    ///
    /// Useful for async consumers that would rather `recv().await` than run
    /// inside a callback.  Events stop flowing once the receiver is dropped.
    pub fn channel(&mut self) -> mpsc::UnboundedReceiver<PluginEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.on_any(move |event| {
            // A dropped receiver just means nobody is listening any more.
            let _ = tx.send(event.clone());
        });
        rx
    }

    /// Removes a subscription.  Returns `false` if it was already gone.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != id);
        self.subscriptions.len() != before
    }

    /// Delivers `event` to every matching subscription in registration order
    /// and returns how many handlers ran.
    pub fn emit(&mut self, event: &PluginEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        for sub in &mut self.subscriptions {
            if sub.kind.map_or(true, |k| k == kind) {
                (sub.handler)(event);
                delivered += 1;
            }
        }
        trace!(event = %kind, delivered, "dispatched event");
        delivered
    }

    /// Number of subscriptions that would receive an event of `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.subscriptions
            .iter()
            .filter(|sub| sub.kind.map_or(true, |k| k == kind))
            .count()
    }

    fn subscribe(&mut self, kind: Option<EventKind>, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription { id, kind, handler });
        id
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use touchportal_core::{Hold, MessageRecord};

    fn record(value: serde_json::Value) -> MessageRecord {
        MessageRecord::try_from(value).unwrap()
    }

    #[test]
    fn test_handler_receives_only_its_kind() {
        // Arrange
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();
        let sink = Arc::clone(&seen);
        dispatcher.on(EventKind::Settings, move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        // Act
        dispatcher.emit(&PluginEvent::Connected);
        dispatcher.emit(&PluginEvent::Settings(json!({"a": 1})));

        // Assert
        assert_eq!(
            *seen.lock().unwrap(),
            vec![PluginEvent::Settings(json!({"a": 1}))]
        );
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();

        let o = Arc::clone(&order);
        dispatcher.on(EventKind::Action, move |_| o.lock().unwrap().push("first"));
        let o = Arc::clone(&order);
        dispatcher.on_any(move |_| o.lock().unwrap().push("any"));
        let o = Arc::clone(&order);
        dispatcher.on(EventKind::Action, move |_| o.lock().unwrap().push("third"));

        let delivered = dispatcher.emit(&PluginEvent::Action {
            record: record(json!({"type": "action"})),
            hold: Hold::Momentary,
        });

        assert_eq!(delivered, 3);
        assert_eq!(*order.lock().unwrap(), vec!["first", "any", "third"]);
    }

    #[test]
    fn test_off_removes_subscription() {
        let count = Arc::new(Mutex::new(0));
        let mut dispatcher = Dispatcher::new();
        let c = Arc::clone(&count);
        let id = dispatcher.on(EventKind::Connected, move |_| *c.lock().unwrap() += 1);

        dispatcher.emit(&PluginEvent::Connected);
        assert!(dispatcher.off(id));
        assert!(!dispatcher.off(id));
        dispatcher.emit(&PluginEvent::Connected);

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(dispatcher.handler_count(EventKind::Connected), 0);
    }

    #[test]
    fn test_emit_without_handlers_delivers_nothing() {
        let mut dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.emit(&PluginEvent::Connected), 0);
    }

    #[test]
    fn test_channel_preserves_emit_order() {
        let mut dispatcher = Dispatcher::new();
        let mut rx = dispatcher.channel();

        dispatcher.emit(&PluginEvent::Connected);
        dispatcher.emit(&PluginEvent::Broadcast(record(json!({"type": "broadcast"}))));
        dispatcher.emit(&PluginEvent::Settings(json!(null)));

        assert_eq!(rx.try_recv().unwrap().kind(), EventKind::Connected);
        assert_eq!(rx.try_recv().unwrap().kind(), EventKind::Broadcast);
        assert_eq!(rx.try_recv().unwrap().kind(), EventKind::Settings);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_with_dropped_receiver_does_not_panic() {
        let mut dispatcher = Dispatcher::new();
        drop(dispatcher.channel());
        assert_eq!(dispatcher.emit(&PluginEvent::Connected), 1);
    }

    #[test]
    fn test_handler_count_includes_catch_all() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.on(EventKind::Info, |_| {});
        dispatcher.on_any(|_| {});
        assert_eq!(dispatcher.handler_count(EventKind::Info), 2);
        assert_eq!(dispatcher.handler_count(EventKind::Close), 1);
    }
}
