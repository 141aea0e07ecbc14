//! Minimal cache invalidation from `CHANGE` notifications.
//!
//! # Responsibility
//! - Translate each change record into the exact set of stale cells a view
//!   cache must re-derive.
//! - Accumulate invalidations until the cache consumes them.
//!
//! # Invariants
//! - A root change forces a full reset; nothing finer is tracked after it
//!   until the next `take`.
//! - Child changes invalidate the child and every parent whose ordering changed.
//! - Field changes invalidate exactly the named cell.

use crate::event::{listener, EventObject, EventSource, Listener, ListenerError};
use crate::model::cell::CellRef;
use crate::model::change::ChangeRecord;
use crate::model::event::{ModelEvent, ModelEventKind};
use crate::model::graph_model::GraphModel;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Stale state collected since the last `take`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    /// Drop the whole cache and re-derive from the root.
    pub full_reset: bool,
    /// Cells whose cached state is stale.
    pub stale: BTreeSet<CellRef>,
    /// Subset of `stale` whose label text must be re-derived.
    pub labels: BTreeSet<CellRef>,
    /// Subset of `stale` whose shape implementation must be re-selected.
    pub shapes: BTreeSet<CellRef>,
}

impl Invalidation {
    pub fn is_empty(&self) -> bool {
        !self.full_reset && self.stale.is_empty()
    }

    /// Whether `cell` needs re-deriving.
    pub fn is_stale(&self, cell: CellRef) -> bool {
        self.full_reset || self.stale.contains(&cell)
    }
}

/// Accumulates invalidations from a model's `CHANGE` events.
#[derive(Debug, Default)]
pub struct InvalidationTracker {
    pending: Invalidation,
    notifications: usize,
}

impl InvalidationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `tracker` to `model`'s `CHANGE` event.
    ///
    /// While the host holds a borrow of `tracker` the listener fails with
    /// a `ListenerError` instead of panicking.
    pub fn observe(
        tracker: &Rc<RefCell<InvalidationTracker>>,
        model: &mut GraphModel,
    ) -> Listener<GraphModel, ModelEvent> {
        let sink = Rc::clone(tracker);
        let handle = listener(
            move |_model: &mut GraphModel, event: &mut EventObject<ModelEvent>| {
                if let Some(changes) = event.event().changes() {
                    sink.try_borrow_mut()
                        .map_err(|_| ListenerError::new("invalidation tracker is busy"))?
                        .invalidate(changes);
                }
                Ok(())
            },
        );
        model.add_listener(ModelEventKind::Change, Rc::clone(&handle));
        handle
    }

    /// Number of `CHANGE` notifications consumed so far.
    pub fn notifications(&self) -> usize {
        self.notifications
    }

    pub fn pending(&self) -> &Invalidation {
        &self.pending
    }

    /// Returns and resets the pending invalidation.
    pub fn take(&mut self) -> Invalidation {
        std::mem::take(&mut self.pending)
    }

    /// Walks one ordered change list.
    pub fn invalidate(&mut self, changes: &[ChangeRecord]) {
        self.notifications += 1;
        for change in changes {
            self.invalidate_one(change);
        }
    }

    fn invalidate_one(&mut self, change: &ChangeRecord) {
        if let ChangeRecord::RootChanged { .. } = change {
            self.pending = Invalidation {
                full_reset: true,
                ..Invalidation::default()
            };
            return;
        }
        if self.pending.full_reset {
            return;
        }

        let stale = &mut self.pending.stale;
        match change {
            ChangeRecord::ChildInserted {
                parent,
                child,
                previous_parent,
                ..
            } => {
                stale.insert(*child);
                stale.insert(*parent);
                if let Some(previous_parent) = previous_parent {
                    stale.insert(*previous_parent);
                }
            }
            ChangeRecord::ChildRemoved { parent, child, .. } => {
                stale.insert(*child);
                stale.insert(*parent);
            }
            ChangeRecord::ValueChanged { cell, .. } => {
                stale.insert(*cell);
                self.pending.labels.insert(*cell);
            }
            ChangeRecord::StyleChanged { cell, .. } => {
                stale.insert(*cell);
                self.pending.shapes.insert(*cell);
            }
            other => {
                stale.insert(other.cell());
            }
        }
    }
}
