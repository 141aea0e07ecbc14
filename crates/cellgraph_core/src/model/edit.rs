//! Transaction-sized batches of change records.
//!
//! # Responsibility
//! - Collect the records executed during one transaction, in order.
//! - Broadcast a closed batch as one `CHANGE`/`NOTIFY` pair.
//! - Replay a batch backwards (undo) or forwards (redo).
//!
//! # Invariants
//! - Records are only appended while the edit is the model's current edit.
//! - A closed edit is shared read-only (`Rc`) with listeners and histories.

use crate::model::change::ChangeRecord;
use crate::model::error::{keep_first, ModelResult};
use crate::model::event::ModelEvent;
use crate::model::graph_model::GraphModel;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use uuid::Uuid;

/// Ordered change records of one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoableEdit {
    id: Uuid,
    changes: Vec<ChangeRecord>,
    significant: bool,
}

impl Default for UndoableEdit {
    fn default() -> Self {
        Self::new(true)
    }
}

impl UndoableEdit {
    /// Creates an empty edit with a fresh identity.
    pub fn new(significant: bool) -> Self {
        Self::from_changes(Vec::new(), significant)
    }

    pub(crate) fn from_changes(changes: Vec<ChangeRecord>, significant: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            changes,
            significant,
        }
    }

    /// Stable identity for external histories.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn add(&mut self, change: ChangeRecord) {
        self.changes.push(change);
    }

    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Whether this edit counts as a user-visible undo step.
    pub fn is_significant(&self) -> bool {
        self.significant
    }

    pub fn set_significant(&mut self, significant: bool) {
        self.significant = significant;
    }

    /// Fires `CHANGE` then `NOTIFY` on `model`, both carrying this edit.
    pub fn notify(self: Rc<Self>, model: &mut GraphModel) -> ModelResult<()> {
        let mut outcome = model.fire(ModelEvent::Change {
            edit: Rc::clone(&self),
        });
        keep_first(&mut outcome, model.fire(ModelEvent::Notify { edit: self }));
        outcome
    }

    /// Applies the inverse of every record in reverse order.
    ///
    /// Returns the edit of records actually applied, which is also what the
    /// `CHANGE` notification of the undo carries.
    pub fn undo(&self, model: &mut GraphModel) -> ModelResult<Rc<UndoableEdit>> {
        let inverses = self
            .changes
            .iter()
            .rev()
            .map(ChangeRecord::inverse)
            .collect();
        model.replay(inverses, self.significant)
    }

    /// Applies every record again in original order.
    pub fn redo(&self, model: &mut GraphModel) -> ModelResult<Rc<UndoableEdit>> {
        model.replay(self.changes.clone(), self.significant)
    }
}
