//! Event envelope and listener failure type.

use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// Closed event type dispatched by one component.
///
/// Each component defines one enum of events with a typed payload per
/// variant, plus a fieldless kind enum used for subscriptions.
pub trait Event {
    /// Payload-free discriminant listeners subscribe to.
    type Kind: Copy + Eq + Debug;

    /// Returns the subscription kind of this event.
    fn kind(&self) -> Self::Kind;
}

/// Envelope passed to every listener of one dispatch.
///
/// `consume()` is advisory: it marks the event but dispatch still reaches
/// every remaining listener.
#[derive(Debug, Clone)]
pub struct EventObject<E> {
    event: E,
    consumed: bool,
    properties: BTreeMap<String, Value>,
}

impl<E: Event> EventObject<E> {
    /// Wraps a typed event with an empty property bag.
    pub fn new(event: E) -> Self {
        Self {
            event,
            consumed: false,
            properties: BTreeMap::new(),
        }
    }

    /// Adds one property while building the envelope.
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn event(&self) -> &E {
        &self.event
    }

    pub fn kind(&self) -> E::Kind {
        self.event.kind()
    }

    /// Unwraps the typed event.
    pub fn into_event(self) -> E {
        self.event
    }

    /// Marks this event as handled.
    pub fn consume(&mut self) {
        self.consumed = true;
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Returns one property by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Sets one property, returning the previous value if any.
    pub fn set_property(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.properties.insert(name.into(), value)
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }
}

/// Failure reported by one listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ListenerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener failed: {}", self.message)
    }
}

impl Error for ListenerError {}
