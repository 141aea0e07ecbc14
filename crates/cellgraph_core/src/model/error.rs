//! Model error taxonomy.

use crate::event::ListenerError;
use crate::model::cell::CellRef;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors from model operations.
///
/// ID collisions are not errors: the model resolves them by reassigning
/// the incoming cell's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Handle does not belong to this model's arena.
    UnknownCell(CellRef),
    /// Child index past the end of a children list.
    IndexOutOfRange { index: usize, len: usize },
    /// `child` is not currently a child of `parent`.
    NotAChild { parent: CellRef, child: CellRef },
    /// Inserting `child` under `parent` would make a cell its own ancestor.
    CycleDetected { child: CellRef, parent: CellRef },
    /// A new root must be detached.
    RootHasParent(CellRef),
    /// The current root cannot be moved under another cell.
    CannotMoveRoot(CellRef),
    /// Requested id is registered to another cell.
    DuplicateId(String),
    /// `end_update` without a matching `begin_update`.
    UnbalancedEndUpdate,
    /// A listener failed; the mutation itself was applied and recorded.
    Listener(ListenerError),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCell(cell) => write!(f, "cell not found in model: {cell}"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "child index {index} out of range for {len} children")
            }
            Self::NotAChild { parent, child } => {
                write!(f, "cell {child} is not a child of {parent}")
            }
            Self::CycleDetected { child, parent } => write!(
                f,
                "insert would create cycle: cell {child} under parent {parent}"
            ),
            Self::RootHasParent(cell) => write!(f, "new root {cell} must not have a parent"),
            Self::CannotMoveRoot(cell) => write!(f, "root cell {cell} cannot be reparented"),
            Self::DuplicateId(id) => write!(f, "cell id already in use: {id}"),
            Self::UnbalancedEndUpdate => write!(f, "end_update called without begin_update"),
            Self::Listener(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Listener(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ListenerError> for ModelError {
    fn from(value: ListenerError) -> Self {
        Self::Listener(value)
    }
}

/// Keeps the first failure of a multi-step protocol that must run to the end.
pub(crate) fn keep_first(outcome: &mut ModelResult<()>, next: ModelResult<()>) {
    if outcome.is_ok() {
        *outcome = next;
    }
}
