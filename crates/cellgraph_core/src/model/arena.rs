//! Arena storage for cells and the raw tree operations.
//!
//! # Responsibility
//! - Own every cell created through one model, addressed by [`CellRef`].
//! - Implement insert/remove/index lookups on the ownership tree.
//!
//! # Invariants
//! - A cell appears in at most one `children` list, exactly once, and its
//!   `parent` field names that list's owner.
//! - Insertion is always a move: the child is detached from its previous
//!   parent before it is attached to the new one.
//! - Operations here do not touch the id registry or record changes; the
//!   model layers that on top.

use crate::model::cell::{Cell, CellRef};
use crate::model::error::{ModelError, ModelResult};

/// Append-only cell storage.
#[derive(Debug, Clone, Default)]
pub struct CellArena {
    cells: Vec<Cell>,
}

impl CellArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Stores a detached cell and returns its handle.
    ///
    /// Tree links on the incoming value are cleared; the cell starts detached.
    pub fn alloc(&mut self, mut cell: Cell) -> CellRef {
        cell.parent = None;
        cell.children.clear();
        cell.source = None;
        cell.target = None;
        let handle = CellRef(self.cells.len() as u32);
        self.cells.push(cell);
        handle
    }

    /// Stores `parent` with `child` as its only child and returns the parent.
    ///
    /// Both cells are fresh, so the link needs no cycle or ownership checks.
    pub fn alloc_with_child(&mut self, parent: Cell, child: Cell) -> CellRef {
        let parent = self.alloc(parent);
        let child = self.alloc(child);
        self.cells[child.index()].parent = Some(parent);
        self.cells[parent.index()].children.push(child);
        parent
    }

    pub fn get(&self, cell: CellRef) -> Option<&Cell> {
        self.cells.get(cell.index())
    }

    pub(crate) fn get_mut(&mut self, cell: CellRef) -> Option<&mut Cell> {
        self.cells.get_mut(cell.index())
    }

    /// Returns the cell or `UnknownCell` for a foreign handle.
    pub fn require(&self, cell: CellRef) -> ModelResult<&Cell> {
        self.get(cell).ok_or(ModelError::UnknownCell(cell))
    }

    pub(crate) fn require_mut(&mut self, cell: CellRef) -> ModelResult<&mut Cell> {
        self.get_mut(cell).ok_or(ModelError::UnknownCell(cell))
    }

    /// Moves `child` under `parent` at `index` (appends when `None`).
    ///
    /// # Errors
    /// - `UnknownCell` for foreign handles.
    /// - `CycleDetected` when `child` is `parent` or one of its ancestors.
    /// - `IndexOutOfRange` when `index` is past the end of the children
    ///   list as it stands once `child` is detached.
    pub fn insert(
        &mut self,
        parent: CellRef,
        child: CellRef,
        index: Option<usize>,
    ) -> ModelResult<CellRef> {
        let index = self.resolve_insert_index(parent, child, index)?;
        self.remove_from_parent(child);
        let owner = self.require_mut(parent)?;
        owner.children.insert(index, child);
        self.set_parent(child, Some(parent));
        Ok(child)
    }

    /// Validates an insert and returns the effective index after detaching.
    pub(crate) fn resolve_insert_index(
        &self,
        parent: CellRef,
        child: CellRef,
        index: Option<usize>,
    ) -> ModelResult<usize> {
        let owner = self.require(parent)?;
        let moving = self.require(child)?;
        if child == parent || self.is_ancestor(child, parent) {
            return Err(ModelError::CycleDetected { child, parent });
        }

        let already_here = moving.parent == Some(parent);
        let len_after_detach = owner.children.len() - usize::from(already_here);
        let index = index.unwrap_or(len_after_detach);
        if index > len_after_detach {
            return Err(ModelError::IndexOutOfRange {
                index,
                len: len_after_detach,
            });
        }
        Ok(index)
    }

    /// Removes and returns the child at `index`, clearing its parent link.
    ///
    /// Returns `None` when `index` is out of range; callers must check.
    pub fn remove(&mut self, parent: CellRef, index: usize) -> Option<CellRef> {
        let owner = self.get_mut(parent)?;
        if index >= owner.children.len() {
            return None;
        }
        let child = owner.children.remove(index);
        self.set_parent(child, None);
        Some(child)
    }

    /// Detaches `child` from its parent, returning the old parent and index.
    pub fn remove_from_parent(&mut self, child: CellRef) -> Option<(CellRef, usize)> {
        let parent = self.get(child)?.parent?;
        let index = self.index_of(parent, child)?;
        self.remove(parent, index).map(|_| (parent, index))
    }

    /// Position of `child` in `parent`'s children.
    pub fn index_of(&self, parent: CellRef, child: CellRef) -> Option<usize> {
        self.get(parent)?
            .children
            .iter()
            .position(|candidate| *candidate == child)
    }

    /// Rewrites the parent link only. Does not touch any children list.
    pub(crate) fn set_parent(&mut self, child: CellRef, parent: Option<CellRef>) {
        if let Some(cell) = self.get_mut(child) {
            cell.parent = parent;
        }
    }

    /// Whether `ancestor` is a strict ancestor of `cell`.
    pub fn is_ancestor(&self, ancestor: CellRef, cell: CellRef) -> bool {
        let mut cursor = self.get(cell).and_then(|current| current.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.get(current).and_then(|node| node.parent);
        }
        false
    }

    /// `cell` followed by its descendants in pre-order.
    pub fn descendants(&self, cell: CellRef) -> Vec<CellRef> {
        let mut out = Vec::new();
        let mut stack = vec![cell];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }
}
