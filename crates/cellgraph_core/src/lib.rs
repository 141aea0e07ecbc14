//! Transactional cell-graph model with change notification and undo.
//! Views, caches and history observe the model only through its events.

pub mod config;
pub mod event;
pub mod history;
pub mod logging;
pub mod model;
pub mod view;

pub use config::{ConfigError, CoreConfig};
pub use event::{listener, Event, EventDispatcher, EventObject, EventSource, Listener, ListenerError};
pub use history::undo_manager::{HistoryEvent, HistoryEventKind, UndoManager};
pub use logging::{default_log_level, init_logging, init_logging_from, logging_status};
pub use model::cell::{Cell, CellRef, Geometry};
pub use model::change::ChangeRecord;
pub use model::edit::UndoableEdit;
pub use model::error::{ModelError, ModelResult};
pub use model::event::{ModelEvent, ModelEventKind};
pub use model::graph_model::GraphModel;
pub use model::ids::{IdConfig, IdStrategy, SequentialIds};
pub use view::invalidation::{Invalidation, InvalidationTracker};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
