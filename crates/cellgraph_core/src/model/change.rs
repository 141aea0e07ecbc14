//! Reversible change records.
//!
//! # Responsibility
//! - Describe one atomic model mutation with enough state to replay it.
//! - Produce the inverse record used by undo.
//!
//! # Invariants
//! - `previous*` fields are captured when the record is applied; a record
//!   appended to an edit is never mutated again.
//! - Applying a record and then its inverse restores the observable state.

use crate::model::cell::{CellRef, Geometry};
use crate::model::error::{ModelError, ModelResult};
use crate::model::graph_model::GraphModel;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One reversible model mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeRecord {
    /// Replaces the model root and rebuilds the id registry.
    RootChanged {
        root: CellRef,
        previous: Option<CellRef>,
    },
    /// Attaches `child` under `parent` at `index`, moving it if it had a parent.
    ChildInserted {
        parent: CellRef,
        child: CellRef,
        index: usize,
        previous_parent: Option<CellRef>,
        previous_index: Option<usize>,
    },
    /// Detaches `child` from `parent`; the cell stays alive in the arena.
    ChildRemoved {
        parent: CellRef,
        child: CellRef,
        index: usize,
    },
    /// Connects one end of an edge.
    TerminalChanged {
        edge: CellRef,
        is_source: bool,
        terminal: Option<CellRef>,
        previous: Option<CellRef>,
    },
    GeometryChanged {
        cell: CellRef,
        geometry: Option<Geometry>,
        previous: Option<Geometry>,
    },
    ValueChanged {
        cell: CellRef,
        value: Value,
        previous: Value,
    },
    StyleChanged {
        cell: CellRef,
        style: Option<String>,
        previous: Option<String>,
    },
    CollapsedChanged {
        cell: CellRef,
        collapsed: bool,
        previous: bool,
    },
    VisibleChanged {
        cell: CellRef,
        visible: bool,
        previous: bool,
    },
}

impl ChangeRecord {
    pub fn root(root: CellRef) -> Self {
        Self::RootChanged {
            root,
            previous: None,
        }
    }

    pub fn child_inserted(parent: CellRef, child: CellRef, index: usize) -> Self {
        Self::ChildInserted {
            parent,
            child,
            index,
            previous_parent: None,
            previous_index: None,
        }
    }

    pub fn child_removed(parent: CellRef, child: CellRef, index: usize) -> Self {
        Self::ChildRemoved {
            parent,
            child,
            index,
        }
    }

    pub fn terminal(edge: CellRef, terminal: Option<CellRef>, is_source: bool) -> Self {
        Self::TerminalChanged {
            edge,
            is_source,
            terminal,
            previous: None,
        }
    }

    pub fn geometry(cell: CellRef, geometry: Option<Geometry>) -> Self {
        Self::GeometryChanged {
            cell,
            geometry,
            previous: None,
        }
    }

    pub fn value(cell: CellRef, value: Value) -> Self {
        Self::ValueChanged {
            cell,
            value,
            previous: Value::Null,
        }
    }

    pub fn style(cell: CellRef, style: Option<String>) -> Self {
        Self::StyleChanged {
            cell,
            style,
            previous: None,
        }
    }

    pub fn collapsed(cell: CellRef, collapsed: bool) -> Self {
        Self::CollapsedChanged {
            cell,
            collapsed,
            previous: false,
        }
    }

    pub fn visible(cell: CellRef, visible: bool) -> Self {
        Self::VisibleChanged {
            cell,
            visible,
            previous: true,
        }
    }

    /// The cell whose cached state this record invalidates first.
    ///
    /// For child changes this is the child; for root changes the new root.
    pub fn cell(&self) -> CellRef {
        match self {
            Self::RootChanged { root, .. } => *root,
            Self::ChildInserted { child, .. } | Self::ChildRemoved { child, .. } => *child,
            Self::TerminalChanged { edge, .. } => *edge,
            Self::GeometryChanged { cell, .. }
            | Self::ValueChanged { cell, .. }
            | Self::StyleChanged { cell, .. }
            | Self::CollapsedChanged { cell, .. }
            | Self::VisibleChanged { cell, .. } => *cell,
        }
    }

    /// Applies the record to `model`, capturing the state it replaces.
    ///
    /// Validation happens before any mutation: on error the model and the
    /// record are unchanged.
    pub(crate) fn apply(&mut self, model: &mut GraphModel) -> ModelResult<()> {
        match self {
            Self::RootChanged { root, previous } => {
                *previous = Some(model.root_changed(*root)?);
            }
            Self::ChildInserted {
                parent,
                child,
                index,
                previous_parent,
                previous_index,
            } => {
                let before = model.parent_for_cell_changed(*child, Some((*parent, *index)))?;
                *previous_parent = before.map(|(old_parent, _)| old_parent);
                *previous_index = before.map(|(_, old_index)| old_index);
            }
            Self::ChildRemoved {
                parent,
                child,
                index,
            } => {
                let actual = model
                    .index_of(*parent, *child)
                    .ok_or(ModelError::NotAChild {
                        parent: *parent,
                        child: *child,
                    })?;
                model.parent_for_cell_changed(*child, None)?;
                *index = actual;
            }
            Self::TerminalChanged {
                edge,
                is_source,
                terminal,
                previous,
            } => {
                *previous = model.terminal_for_cell_changed(*edge, *terminal, *is_source)?;
            }
            Self::GeometryChanged {
                cell,
                geometry,
                previous,
            } => {
                *previous = model.geometry_for_cell_changed(*cell, *geometry)?;
            }
            Self::ValueChanged {
                cell,
                value,
                previous,
            } => {
                *previous = model.value_for_cell_changed(*cell, value.clone())?;
            }
            Self::StyleChanged {
                cell,
                style,
                previous,
            } => {
                *previous = model.style_for_cell_changed(*cell, style.clone())?;
            }
            Self::CollapsedChanged {
                cell,
                collapsed,
                previous,
            } => {
                *previous = model.collapsed_state_for_cell_changed(*cell, *collapsed)?;
            }
            Self::VisibleChanged {
                cell,
                visible,
                previous,
            } => {
                *previous = model.visible_state_for_cell_changed(*cell, *visible)?;
            }
        }
        Ok(())
    }

    /// Record that undoes this one once it has been applied.
    pub fn inverse(&self) -> Self {
        match self {
            Self::RootChanged { root, previous } => Self::RootChanged {
                root: previous.unwrap_or(*root),
                previous: Some(*root),
            },
            Self::ChildInserted {
                parent,
                child,
                index,
                previous_parent,
                previous_index,
            } => match (previous_parent, previous_index) {
                (Some(old_parent), Some(old_index)) => Self::ChildInserted {
                    parent: *old_parent,
                    child: *child,
                    index: *old_index,
                    previous_parent: Some(*parent),
                    previous_index: Some(*index),
                },
                _ => Self::ChildRemoved {
                    parent: *parent,
                    child: *child,
                    index: *index,
                },
            },
            Self::ChildRemoved {
                parent,
                child,
                index,
            } => Self::ChildInserted {
                parent: *parent,
                child: *child,
                index: *index,
                previous_parent: None,
                previous_index: None,
            },
            Self::TerminalChanged {
                edge,
                is_source,
                terminal,
                previous,
            } => Self::TerminalChanged {
                edge: *edge,
                is_source: *is_source,
                terminal: *previous,
                previous: *terminal,
            },
            Self::GeometryChanged {
                cell,
                geometry,
                previous,
            } => Self::GeometryChanged {
                cell: *cell,
                geometry: *previous,
                previous: *geometry,
            },
            Self::ValueChanged {
                cell,
                value,
                previous,
            } => Self::ValueChanged {
                cell: *cell,
                value: previous.clone(),
                previous: value.clone(),
            },
            Self::StyleChanged {
                cell,
                style,
                previous,
            } => Self::StyleChanged {
                cell: *cell,
                style: previous.clone(),
                previous: style.clone(),
            },
            Self::CollapsedChanged {
                cell,
                collapsed,
                previous,
            } => Self::CollapsedChanged {
                cell: *cell,
                collapsed: *previous,
                previous: *collapsed,
            },
            Self::VisibleChanged {
                cell,
                visible,
                previous,
            } => Self::VisibleChanged {
                cell: *cell,
                visible: *previous,
                previous: *visible,
            },
        }
    }
}
