//! Transactional cell-graph model.
//!
//! # Responsibility
//! - Define the cell tree, the reversible change records and the edits
//!   that batch them.
//! - Orchestrate transactions and the notifications caches rely on.
//!
//! # Invariants
//! - Every mutation of a registered cell goes through `GraphModel::execute`
//!   or an undo/redo replay, so it is always described by a change record.
//! - Parent links own children; edge terminals are non-owning handles.

pub mod arena;
pub mod cell;
pub mod change;
pub mod edit;
pub mod error;
pub mod event;
pub mod graph_model;
pub mod ids;
