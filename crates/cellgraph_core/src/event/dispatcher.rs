//! Listener registry and dispatch loop.

use crate::event::object::{Event, EventObject, ListenerError};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Shared listener handle.
///
/// The same `Rc` is used to unregister: `remove_listener` drops every
/// registration whose handle points at the same closure.
pub type Listener<S, E> = Rc<dyn Fn(&mut S, &mut EventObject<E>) -> Result<(), ListenerError>>;

/// Wraps a closure into a [`Listener`] handle.
pub fn listener<S, E, F>(f: F) -> Listener<S, E>
where
    F: Fn(&mut S, &mut EventObject<E>) -> Result<(), ListenerError> + 'static,
{
    Rc::new(f)
}

struct Registration<S, E: Event> {
    seq: u64,
    kind: Option<E::Kind>,
    listener: Listener<S, E>,
}

/// Typed listener registry embedded by one event source.
///
/// Kind-specific and catch-all registrations are kept in two lists; a
/// sequence number preserves the global registration order across both.
pub struct EventDispatcher<S, E: Event> {
    named: Vec<Registration<S, E>>,
    all: Vec<Registration<S, E>>,
    next_seq: u64,
    enabled: bool,
}

impl<S, E: Event> Default for EventDispatcher<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, E: Event> Debug for EventDispatcher<S, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("named", &self.named.len())
            .field("all", &self.all.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl<S, E: Event> EventDispatcher<S, E> {
    pub fn new() -> Self {
        Self {
            named: Vec::new(),
            all: Vec::new(),
            next_seq: 0,
            enabled: true,
        }
    }

    /// Registers `listener` for one event kind.
    pub fn add_listener(&mut self, kind: E::Kind, listener: Listener<S, E>) {
        let seq = self.bump_seq();
        self.named.push(Registration {
            seq,
            kind: Some(kind),
            listener,
        });
    }

    /// Registers `listener` for every event this dispatcher fires.
    pub fn add_listener_all(&mut self, listener: Listener<S, E>) {
        let seq = self.bump_seq();
        self.all.push(Registration {
            seq,
            kind: None,
            listener,
        });
    }

    /// Removes every registration of `listener`, whatever kind it was added for.
    ///
    /// Returns how many registrations were dropped.
    pub fn remove_listener(&mut self, listener: &Listener<S, E>) -> usize {
        let before = self.named.len() + self.all.len();
        self.named
            .retain(|registration| !Rc::ptr_eq(&registration.listener, listener));
        self.all
            .retain(|registration| !Rc::ptr_eq(&registration.listener, listener));
        before - (self.named.len() + self.all.len())
    }

    /// Number of live registrations across both lists.
    pub fn listener_count(&self) -> usize {
        self.named.len() + self.all.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling turns every `fire_event` into a no-op.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Copies the listeners due for `kind`, in registration order.
    fn snapshot(&self, kind: E::Kind) -> Vec<(u64, Listener<S, E>)> {
        let mut due: Vec<(u64, Listener<S, E>)> = self
            .named
            .iter()
            .filter(|registration| registration.kind == Some(kind))
            .chain(self.all.iter())
            .map(|registration| (registration.seq, Rc::clone(&registration.listener)))
            .collect();
        due.sort_by_key(|(seq, _)| *seq);
        due
    }

    fn is_registered(&self, seq: u64) -> bool {
        self.named
            .iter()
            .chain(self.all.iter())
            .any(|registration| registration.seq == seq)
    }
}

/// Narrow subscribe/fire surface of a component that embeds a dispatcher.
///
/// Listeners receive the source itself mutably, so they may fire further
/// events, mutate the source, or add/remove listeners while a dispatch runs.
pub trait EventSource: Sized {
    type Event: Event;

    fn dispatcher(&self) -> &EventDispatcher<Self, Self::Event>;

    fn dispatcher_mut(&mut self) -> &mut EventDispatcher<Self, Self::Event>;

    fn add_listener(
        &mut self,
        kind: <Self::Event as Event>::Kind,
        listener: Listener<Self, Self::Event>,
    ) {
        self.dispatcher_mut().add_listener(kind, listener);
    }

    fn add_listener_all(&mut self, listener: Listener<Self, Self::Event>) {
        self.dispatcher_mut().add_listener_all(listener);
    }

    fn remove_listener(&mut self, listener: &Listener<Self, Self::Event>) -> usize {
        self.dispatcher_mut().remove_listener(listener)
    }

    fn set_events_enabled(&mut self, enabled: bool) {
        self.dispatcher_mut().set_enabled(enabled);
    }

    /// Dispatches `event` to every listener due for its kind.
    ///
    /// Every due listener runs even when an earlier one fails; the first
    /// failure is returned after the loop. The envelope is returned on
    /// success so callers can inspect `is_consumed()`.
    fn fire_event(
        &mut self,
        mut event: EventObject<Self::Event>,
    ) -> Result<EventObject<Self::Event>, ListenerError> {
        if !self.dispatcher().is_enabled() {
            return Ok(event);
        }

        let due = self.dispatcher().snapshot(event.kind());
        let mut first_error = None;
        for (seq, listener) in due {
            // Skip listeners unregistered by an earlier listener of this dispatch.
            if !self.dispatcher().is_registered(seq) {
                continue;
            }
            if let Err(err) = listener(self, &mut event) {
                log::warn!(
                    "event=listener_failed module=event status=error kind={:?}",
                    event.kind()
                );
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{listener, EventDispatcher, EventSource, Listener};
    use crate::event::object::{Event, EventObject, ListenerError};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum PingKind {
        Ping,
        Pong,
    }

    #[derive(Debug, Clone)]
    enum PingEvent {
        Ping(u32),
        Pong,
    }

    impl Event for PingEvent {
        type Kind = PingKind;

        fn kind(&self) -> PingKind {
            match self {
                Self::Ping(_) => PingKind::Ping,
                Self::Pong => PingKind::Pong,
            }
        }
    }

    #[derive(Default)]
    struct Source {
        events: EventDispatcher<Source, PingEvent>,
        log: Vec<String>,
    }

    impl EventSource for Source {
        type Event = PingEvent;

        fn dispatcher(&self) -> &EventDispatcher<Self, PingEvent> {
            &self.events
        }

        fn dispatcher_mut(&mut self) -> &mut EventDispatcher<Self, PingEvent> {
            &mut self.events
        }
    }

    fn recorder(tag: &'static str) -> Listener<Source, PingEvent> {
        listener(move |source: &mut Source, _event: &mut EventObject<PingEvent>| {
            source.log.push(tag.to_string());
            Ok(())
        })
    }

    fn ping(value: u32) -> EventObject<PingEvent> {
        EventObject::new(PingEvent::Ping(value))
    }

    #[test]
    fn named_and_catch_all_listeners_run_in_registration_order() {
        let mut source = Source::default();
        source.add_listener(PingKind::Ping, recorder("a"));
        source.add_listener_all(recorder("all"));
        source.add_listener(PingKind::Pong, recorder("pong-only"));
        source.add_listener(PingKind::Ping, recorder("b"));

        source.fire_event(ping(1)).unwrap();
        assert_eq!(source.log, vec!["a", "all", "b"]);
    }

    #[test]
    fn remove_listener_drops_every_registration_of_the_handle() {
        let mut source = Source::default();
        let shared = recorder("shared");
        source.add_listener(PingKind::Ping, Rc::clone(&shared));
        source.add_listener(PingKind::Pong, Rc::clone(&shared));
        source.add_listener_all(Rc::clone(&shared));

        assert_eq!(source.remove_listener(&shared), 3);
        assert_eq!(source.dispatcher().listener_count(), 0);
        source.fire_event(ping(1)).unwrap();
        assert!(source.log.is_empty());
    }

    #[test]
    fn disabled_dispatcher_is_a_no_op() {
        let mut source = Source::default();
        source.add_listener_all(recorder("all"));
        source.set_events_enabled(false);
        source.fire_event(ping(1)).unwrap();
        assert!(source.log.is_empty());
    }

    #[test]
    fn listener_removed_mid_dispatch_is_not_invoked() {
        let mut source = Source::default();
        let victim = recorder("victim");
        let victim_handle = Rc::clone(&victim);
        let remover = listener(move |source: &mut Source, _event: &mut EventObject<PingEvent>| {
            source.log.push("remover".to_string());
            source.remove_listener(&victim_handle);
            Ok(())
        });
        source.add_listener(PingKind::Ping, remover);
        source.add_listener(PingKind::Ping, victim);

        source.fire_event(ping(1)).unwrap();
        assert_eq!(source.log, vec!["remover"]);
    }

    #[test]
    fn listener_added_mid_dispatch_waits_for_next_dispatch() {
        let mut source = Source::default();
        let adder = listener(|source: &mut Source, _event: &mut EventObject<PingEvent>| {
            source.log.push("adder".to_string());
            source.add_listener(PingKind::Ping, recorder("late"));
            Ok(())
        });
        source.add_listener(PingKind::Ping, adder);

        source.fire_event(ping(1)).unwrap();
        assert_eq!(source.log, vec!["adder"]);
    }

    #[test]
    fn reentrant_fire_completes_inner_dispatch_first() {
        let mut source = Source::default();
        let forward = listener(|source: &mut Source, _event: &mut EventObject<PingEvent>| {
            source.log.push("ping".to_string());
            source.fire_event(EventObject::new(PingEvent::Pong))?;
            source.log.push("ping-done".to_string());
            Ok(())
        });
        source.add_listener(PingKind::Ping, forward);
        source.add_listener(PingKind::Pong, recorder("pong"));

        source.fire_event(ping(1)).unwrap();
        assert_eq!(source.log, vec!["ping", "pong", "ping-done"]);
    }

    #[test]
    fn consume_is_advisory_and_failures_do_not_stop_dispatch() {
        let mut source = Source::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let failing = listener(|_source: &mut Source, event: &mut EventObject<PingEvent>| {
            event.consume();
            Err(ListenerError::new("boom"))
        });
        let seen_by_second = Rc::clone(&seen);
        let second = listener(move |_source: &mut Source, event: &mut EventObject<PingEvent>| {
            seen_by_second.borrow_mut().push(event.is_consumed());
            Ok(())
        });
        source.add_listener(PingKind::Ping, failing);
        source.add_listener(PingKind::Ping, second);

        let err = source.fire_event(ping(7)).unwrap_err();
        assert_eq!(err.message(), "boom");
        assert_eq!(*seen.borrow(), vec![true]);
    }

    #[test]
    fn envelope_properties_round_trip() {
        let mut source = Source::default();
        let tagger = listener(|_source: &mut Source, event: &mut EventObject<PingEvent>| {
            event.set_property("seen", serde_json::json!(true));
            Ok(())
        });
        source.add_listener(PingKind::Ping, tagger);

        let fired = source
            .fire_event(ping(3).with_property("origin", serde_json::json!("test")))
            .unwrap();
        assert_eq!(fired.property("origin"), Some(&serde_json::json!("test")));
        assert_eq!(fired.property("seen"), Some(&serde_json::json!(true)));
        assert!(matches!(fired.into_event(), PingEvent::Ping(3)));
    }
}
