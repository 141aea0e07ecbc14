//! Named-event publish/subscribe primitives shared by every stateful component.
//!
//! # Responsibility
//! - Provide a typed dispatcher that components embed by composition.
//! - Define the event envelope (consumed flag + property bag) handed to listeners.
//!
//! # Invariants
//! - Dispatch is synchronous and runs listeners in registration order.
//! - A listener removed during dispatch is not invoked after its removal.
//! - A failing listener never prevents the remaining listeners from running.

mod dispatcher;
mod object;

pub use dispatcher::{listener, EventDispatcher, EventSource, Listener};
pub use object::{Event, EventObject, ListenerError};
