//! Events fired by [`GraphModel`](crate::GraphModel).

use crate::event::Event;
use crate::model::change::ChangeRecord;
use crate::model::edit::UndoableEdit;
use std::rc::Rc;

/// Subscription kinds for model events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEventKind {
    BeginUpdate,
    StartEdit,
    EndEdit,
    EndUpdate,
    Execute,
    Executed,
    BeforeUndo,
    Change,
    Notify,
    Undo,
}

/// Model event with its typed payload.
#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// Every `begin_update`.
    BeginUpdate,
    /// Transaction depth went from 0 to 1 (also opens an undo/redo replay).
    StartEdit,
    /// Transaction depth went back to 0 (also closes an undo/redo replay).
    EndEdit,
    /// Every `end_update`; nested calls carry the edit still accumulating.
    EndUpdate { edit: Rc<UndoableEdit> },
    /// One record was applied and appended to the current edit.
    Execute { change: ChangeRecord },
    /// Follows `Execute`; also fired per record during undo/redo replay.
    Executed { change: ChangeRecord },
    /// The outermost transaction is about to hand off its edit.
    BeforeUndo { edit: Rc<UndoableEdit> },
    /// A closed edit (or replay) is observable; fired once per edit.
    Change { edit: Rc<UndoableEdit> },
    /// Follows `Change` with the same edit.
    Notify { edit: Rc<UndoableEdit> },
    /// The closed edit is ready for an undo history.
    Undo { edit: Rc<UndoableEdit> },
}

impl ModelEvent {
    /// Edit carried by this event, if any.
    pub fn edit(&self) -> Option<&Rc<UndoableEdit>> {
        match self {
            Self::EndUpdate { edit }
            | Self::BeforeUndo { edit }
            | Self::Change { edit }
            | Self::Notify { edit }
            | Self::Undo { edit } => Some(edit),
            _ => None,
        }
    }

    /// Ordered change list carried by `Change`/`Notify` (and other edit events).
    pub fn changes(&self) -> Option<&[ChangeRecord]> {
        self.edit().map(|edit| edit.changes())
    }

    /// Record carried by `Execute`/`Executed`.
    pub fn change(&self) -> Option<&ChangeRecord> {
        match self {
            Self::Execute { change } | Self::Executed { change } => Some(change),
            _ => None,
        }
    }
}

impl Event for ModelEvent {
    type Kind = ModelEventKind;

    fn kind(&self) -> ModelEventKind {
        match self {
            Self::BeginUpdate => ModelEventKind::BeginUpdate,
            Self::StartEdit => ModelEventKind::StartEdit,
            Self::EndEdit => ModelEventKind::EndEdit,
            Self::EndUpdate { .. } => ModelEventKind::EndUpdate,
            Self::Execute { .. } => ModelEventKind::Execute,
            Self::Executed { .. } => ModelEventKind::Executed,
            Self::BeforeUndo { .. } => ModelEventKind::BeforeUndo,
            Self::Change { .. } => ModelEventKind::Change,
            Self::Notify { .. } => ModelEventKind::Notify,
            Self::Undo { .. } => ModelEventKind::Undo,
        }
    }
}
