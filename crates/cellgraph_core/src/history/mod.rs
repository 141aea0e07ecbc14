//! Undo/redo history fed by closed model edits.

pub mod undo_manager;
