//! Bounded undo/redo history.
//!
//! # Responsibility
//! - Store closed edits handed off by the model's `UNDO` event.
//! - Step backwards/forwards through them, skipping insignificant edits.
//!
//! # Invariants
//! - Edits at or after `index_of_next_add` are redoable; a new edit drops them.
//! - With a non-zero size the oldest edit is evicted first.
//! - Undo/redo replays do not re-enter the history.

use crate::config::CoreConfig;
use crate::event::{
    listener, Event, EventDispatcher, EventObject, EventSource, Listener, ListenerError,
};
use crate::model::edit::UndoableEdit;
use crate::model::error::{keep_first, ModelError, ModelResult};
use crate::model::event::{ModelEvent, ModelEventKind};
use crate::model::graph_model::GraphModel;
use std::cell::RefCell;
use std::rc::Rc;

/// Subscription kinds for history events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryEventKind {
    Added,
    Undone,
    Redone,
    Cleared,
}

/// History event with the affected edit.
#[derive(Debug, Clone)]
pub enum HistoryEvent {
    Added { edit: Rc<UndoableEdit> },
    Undone { edit: Rc<UndoableEdit> },
    Redone { edit: Rc<UndoableEdit> },
    Cleared,
}

impl Event for HistoryEvent {
    type Kind = HistoryEventKind;

    fn kind(&self) -> HistoryEventKind {
        match self {
            Self::Added { .. } => HistoryEventKind::Added,
            Self::Undone { .. } => HistoryEventKind::Undone,
            Self::Redone { .. } => HistoryEventKind::Redone,
            Self::Cleared => HistoryEventKind::Cleared,
        }
    }
}

/// Linear undo/redo history of closed edits.
#[derive(Debug)]
pub struct UndoManager {
    size: usize,
    history: Vec<Rc<UndoableEdit>>,
    index_of_next_add: usize,
    events: EventDispatcher<UndoManager, HistoryEvent>,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::from_config(&CoreConfig::default())
    }
}

impl EventSource for UndoManager {
    type Event = HistoryEvent;

    fn dispatcher(&self) -> &EventDispatcher<Self, HistoryEvent> {
        &self.events
    }

    fn dispatcher_mut(&mut self) -> &mut EventDispatcher<Self, HistoryEvent> {
        &mut self.events
    }
}

impl UndoManager {
    /// Creates a history keeping at most `size` edits (`0` = unbounded).
    pub fn new(size: usize) -> Self {
        Self {
            size,
            history: Vec::new(),
            index_of_next_add: 0,
            events: EventDispatcher::new(),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.history_size)
    }

    /// Subscribes `manager` to `model`'s `UNDO` event.
    ///
    /// Returns the listener handle so the host can detach the history later.
    pub fn track(
        manager: &Rc<RefCell<UndoManager>>,
        model: &mut GraphModel,
    ) -> Listener<GraphModel, ModelEvent> {
        let history = Rc::clone(manager);
        let handle = listener(
            move |_model: &mut GraphModel, event: &mut EventObject<ModelEvent>| {
                let ModelEvent::Undo { edit } = event.event() else {
                    return Ok(());
                };
                let mut manager = history
                    .try_borrow_mut()
                    .map_err(|_| ListenerError::new("undo history is busy"))?;
                manager
                    .undoable_edit_happened(Rc::clone(edit))
                    .map_err(|err| ListenerError::new(err.to_string()))
            },
        );
        model.add_listener(ModelEventKind::Undo, Rc::clone(&handle));
        handle
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.index_of_next_add > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index_of_next_add < self.history.len()
    }

    /// Stored edits, oldest first.
    pub fn edits(&self) -> &[Rc<UndoableEdit>] {
        &self.history
    }

    /// Drops every stored edit.
    pub fn clear(&mut self) -> ModelResult<()> {
        self.history.clear();
        self.index_of_next_add = 0;
        self.fire(HistoryEvent::Cleared)
    }

    /// Appends a closed edit, discarding anything redoable.
    pub fn undoable_edit_happened(&mut self, edit: Rc<UndoableEdit>) -> ModelResult<()> {
        self.history.truncate(self.index_of_next_add);
        if self.size > 0 && self.history.len() >= self.size {
            self.history.remove(0);
        }
        self.history.push(Rc::clone(&edit));
        self.index_of_next_add = self.history.len();
        self.fire(HistoryEvent::Added { edit })
    }

    /// Undoes edits until one significant edit was undone.
    ///
    /// Returns whether a significant edit was undone.
    ///
    /// # Errors
    /// - A record that fails to apply; the model and the position are unchanged.
    /// - The first listener failure. The edit is still undone and the
    ///   position moves past it.
    pub fn undo(&mut self, model: &mut GraphModel) -> ModelResult<bool> {
        let mut outcome = Ok(());
        while self.index_of_next_add > 0 {
            let edit = Rc::clone(&self.history[self.index_of_next_add - 1]);
            keep_first(&mut outcome, replayed(edit.undo(model))?);
            self.index_of_next_add -= 1;
            if edit.is_significant() {
                keep_first(&mut outcome, self.fire(HistoryEvent::Undone { edit }));
                return outcome.map(|()| true);
            }
        }
        outcome.map(|()| false)
    }

    /// Redoes edits until one significant edit was redone.
    ///
    /// Errors follow [`undo`](Self::undo).
    pub fn redo(&mut self, model: &mut GraphModel) -> ModelResult<bool> {
        let mut outcome = Ok(());
        while self.index_of_next_add < self.history.len() {
            let edit = Rc::clone(&self.history[self.index_of_next_add]);
            keep_first(&mut outcome, replayed(edit.redo(model))?);
            self.index_of_next_add += 1;
            if edit.is_significant() {
                keep_first(&mut outcome, self.fire(HistoryEvent::Redone { edit }));
                return outcome.map(|()| true);
            }
        }
        outcome.map(|()| false)
    }

    fn fire(&mut self, event: HistoryEvent) -> ModelResult<()> {
        self.fire_event(EventObject::new(event))
            .map(|_| ())
            .map_err(ModelError::from)
    }
}

/// Separates a replay that never happened from listener failures after it.
///
/// A replay returns `Listener` only once all records are applied; any other
/// error means the model was left untouched.
fn replayed(result: ModelResult<Rc<UndoableEdit>>) -> ModelResult<ModelResult<()>> {
    match result {
        Ok(_) => Ok(Ok(())),
        Err(ModelError::Listener(err)) => Ok(Err(ModelError::Listener(err))),
        Err(err) => Err(err),
    }
}
