//! Transactional cell-graph model.
//!
//! # Responsibility
//! - Own the cell arena, the current root and the id registry.
//! - Turn every mutation into a [`ChangeRecord`] executed inside a transaction.
//! - Fire the transaction events that let caches invalidate incrementally.
//!
//! # Invariants
//! - Outside a transaction the registry holds exactly the ids reachable
//!   from the root, each mapped to one cell.
//! - `CHANGE`/`NOTIFY` fire once per closed outermost transaction that
//!   recorded at least one change, and never for an empty one.
//! - The close-out guard is released on every exit path, including
//!   listener failures and panics.

use crate::config::CoreConfig;
use crate::event::{EventDispatcher, EventObject, EventSource};
use crate::model::arena::CellArena;
use crate::model::cell::{Cell, CellRef, Geometry};
use crate::model::change::ChangeRecord;
use crate::model::edit::UndoableEdit;
use crate::model::error::{keep_first, ModelError, ModelResult};
use crate::model::event::ModelEvent;
use crate::model::ids::{numeric_id, IdConfig, IdStrategy, SequentialIds};
use serde_json::Value;
use std::cell::Cell as FlagCell;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Scoped hold on the `ending_update` flag.
///
/// Dropping the guard clears the flag, so a failing or panicking listener
/// cannot leave the model stuck in its closing state.
struct EndingUpdateGuard {
    flag: Rc<FlagCell<bool>>,
}

impl EndingUpdateGuard {
    fn acquire(flag: &Rc<FlagCell<bool>>, closing: bool) -> Self {
        flag.set(closing);
        Self {
            flag: Rc::clone(flag),
        }
    }

    fn is_closing(&self) -> bool {
        self.flag.get()
    }
}

impl Drop for EndingUpdateGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Mutable tree of cells with recorded, undoable mutations.
pub struct GraphModel {
    arena: CellArena,
    root: CellRef,
    registry: HashMap<String, CellRef>,
    next_id: u64,
    ids: IdConfig,
    id_strategy: Box<dyn IdStrategy>,
    update_level: u32,
    current_edit: Rc<UndoableEdit>,
    ending_update: Rc<FlagCell<bool>>,
    events: EventDispatcher<GraphModel, ModelEvent>,
}

impl Debug for GraphModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphModel")
            .field("root", &self.root)
            .field("cells", &self.arena.len())
            .field("registered", &self.registry.len())
            .field("next_id", &self.next_id)
            .field("update_level", &self.update_level)
            .field("pending_changes", &self.current_edit.len())
            .field("events", &self.events)
            .finish()
    }
}

impl Default for GraphModel {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for GraphModel {
    type Event = ModelEvent;

    fn dispatcher(&self) -> &EventDispatcher<Self, ModelEvent> {
        &self.events
    }

    fn dispatcher_mut(&mut self) -> &mut EventDispatcher<Self, ModelEvent> {
        &mut self.events
    }
}

impl GraphModel {
    /// Creates a model holding a root with one default layer.
    pub fn new() -> Self {
        Self::with_ids(IdConfig::default())
    }

    /// Creates a model using the id settings from `config`.
    pub fn with_config(config: &CoreConfig) -> Self {
        Self::with_ids(config.ids.clone())
    }

    /// Creates a model with explicit id settings.
    ///
    /// The initial root is installed directly; it is not part of any edit.
    pub fn with_ids(ids: IdConfig) -> Self {
        let mut arena = CellArena::new();
        let root = arena.alloc_with_child(Cell::default(), Cell::default());
        let mut model = Self {
            arena,
            root,
            registry: HashMap::new(),
            next_id: 0,
            ids,
            id_strategy: Box::new(SequentialIds),
            update_level: 0,
            current_edit: Rc::default(),
            ending_update: Rc::new(FlagCell::new(false)),
            events: EventDispatcher::new(),
        };
        model.cell_added(root);
        model
    }

    /// Replaces the id hook used for generated ids.
    pub fn set_id_strategy(&mut self, strategy: Box<dyn IdStrategy>) {
        self.id_strategy = strategy;
    }

    pub fn id_config(&self) -> &IdConfig {
        &self.ids
    }

    pub fn set_create_ids(&mut self, create_ids: bool) {
        self.ids.create_ids = create_ids;
    }

    // -- Queries --

    pub fn root(&self) -> CellRef {
        self.root
    }

    /// Cell data for a handle of this model.
    pub fn cell(&self, cell: CellRef) -> Option<&Cell> {
        self.arena.get(cell)
    }

    /// Looks up a registered cell by id. Absence is a normal outcome.
    pub fn get_cell(&self, id: &str) -> Option<CellRef> {
        self.registry.get(id).copied()
    }

    /// Registered ids, sorted.
    pub fn registered_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registry.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn parent(&self, cell: CellRef) -> Option<CellRef> {
        self.arena.get(cell).and_then(Cell::parent)
    }

    /// Children in z-order; empty for unknown handles.
    pub fn children(&self, cell: CellRef) -> &[CellRef] {
        self.arena.get(cell).map(Cell::children).unwrap_or(&[])
    }

    pub fn child_count(&self, cell: CellRef) -> usize {
        self.children(cell).len()
    }

    pub fn child_at(&self, cell: CellRef, index: usize) -> Option<CellRef> {
        self.children(cell).get(index).copied()
    }

    pub fn index_of(&self, parent: CellRef, child: CellRef) -> Option<usize> {
        self.arena.index_of(parent, child)
    }

    pub fn terminal(&self, edge: CellRef, is_source: bool) -> Option<CellRef> {
        self.arena.get(edge).and_then(|cell| cell.terminal(is_source))
    }

    /// Edges in the current tree that have `cell` as source or target.
    pub fn edges(&self, cell: CellRef) -> Vec<CellRef> {
        self.arena
            .descendants(self.root)
            .into_iter()
            .filter(|candidate| {
                self.arena.get(*candidate).is_some_and(|node| {
                    node.is_edge()
                        && (node.terminal(true) == Some(cell) || node.terminal(false) == Some(cell))
                })
            })
            .collect()
    }

    /// Whether `ancestor` is `cell` or one of its ancestors.
    pub fn is_ancestor(&self, ancestor: CellRef, cell: CellRef) -> bool {
        ancestor == cell || self.arena.is_ancestor(ancestor, cell)
    }

    /// Whether `cell` is reachable from the current root.
    pub fn contains(&self, cell: CellRef) -> bool {
        self.is_ancestor(self.root, cell)
    }

    /// Whether `cell` is a direct child of the root.
    pub fn is_layer(&self, cell: CellRef) -> bool {
        self.parent(cell) == Some(self.root)
    }

    /// `cell` and its descendants in pre-order.
    pub fn descendants(&self, cell: CellRef) -> Vec<CellRef> {
        self.arena.descendants(cell)
    }

    pub fn update_level(&self) -> u32 {
        self.update_level
    }

    pub fn is_updating(&self) -> bool {
        self.update_level > 0
    }

    /// Edit accumulating the open (or next) transaction.
    pub fn current_edit(&self) -> &UndoableEdit {
        &self.current_edit
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    // -- Cell creation --

    /// Stores a detached cell; attach it with [`add`](Self::add) or
    /// [`set_root`](Self::set_root).
    pub fn create_cell(&mut self, cell: Cell) -> CellRef {
        self.arena.alloc(cell)
    }

    /// Creates a detached root holding one empty layer.
    pub fn create_root(&mut self) -> CellRef {
        self.arena.alloc_with_child(Cell::default(), Cell::default())
    }

    /// Changes the id of `cell`, keeping the registry in sync.
    ///
    /// A cell reachable from the root is registered under the new id even
    /// when it had none before. Detached cells only carry the id until
    /// they are attached.
    ///
    /// This is bookkeeping, not a recorded change.
    ///
    /// # Errors
    /// - `DuplicateId` when another registered cell owns `id`.
    pub fn set_id(&mut self, cell: CellRef, id: impl Into<String>) -> ModelResult<()> {
        let id = id.into();
        if let Some(owner) = self.registry.get(&id) {
            if *owner != cell {
                return Err(ModelError::DuplicateId(id));
            }
        }
        let attached = self.contains(cell);
        let node = self.arena.require_mut(cell)?;
        let old = node.id.replace(id.clone());
        if !attached {
            return Ok(());
        }
        if let Some(old) = old {
            if self.registry.get(&old) == Some(&cell) {
                self.registry.remove(&old);
            }
        }
        if let Some(numeric) = numeric_id(&id) {
            self.next_id = self.next_id.max(numeric.saturating_add(1));
        }
        self.registry.insert(id, cell);
        Ok(())
    }

    // -- Recorded mutations --

    /// Replaces the root. Undoable; rebuilds the registry.
    pub fn set_root(&mut self, root: CellRef) -> ModelResult<()> {
        self.execute(ChangeRecord::root(root))
    }

    /// Replaces the whole tree with a fresh root + layer.
    pub fn clear(&mut self) -> ModelResult<()> {
        let root = self.create_root();
        self.set_root(root)
    }

    /// Moves `child` under `parent` at `index` (appends when `None`).
    ///
    /// # Errors
    /// - `CycleDetected`, `IndexOutOfRange`, `UnknownCell`, `CannotMoveRoot`;
    ///   nothing is recorded in those cases.
    pub fn add(
        &mut self,
        parent: CellRef,
        child: CellRef,
        index: Option<usize>,
    ) -> ModelResult<CellRef> {
        if child == self.root {
            return Err(ModelError::CannotMoveRoot(child));
        }
        let index = self.arena.resolve_insert_index(parent, child, index)?;
        self.execute(ChangeRecord::child_inserted(parent, child, index))?;
        Ok(child)
    }

    /// Detaches `cell` from its parent. A detached cell is left as is.
    pub fn remove(&mut self, cell: CellRef) -> ModelResult<CellRef> {
        if cell == self.root {
            return Err(ModelError::CannotMoveRoot(cell));
        }
        let node = self.arena.require(cell)?;
        let Some(parent) = node.parent() else {
            return Ok(cell);
        };
        let index = self
            .index_of(parent, cell)
            .ok_or(ModelError::NotAChild {
                parent,
                child: cell,
            })?;
        self.execute(ChangeRecord::child_removed(parent, cell, index))?;
        Ok(cell)
    }

    /// Connects the source (`is_source`) or target end of `edge`.
    pub fn set_terminal(
        &mut self,
        edge: CellRef,
        terminal: Option<CellRef>,
        is_source: bool,
    ) -> ModelResult<()> {
        if self.arena.require(edge)?.terminal(is_source) == terminal {
            return Ok(());
        }
        self.execute(ChangeRecord::terminal(edge, terminal, is_source))
    }

    /// Connects both ends of `edge` in one transaction.
    pub fn set_terminals(
        &mut self,
        edge: CellRef,
        source: Option<CellRef>,
        target: Option<CellRef>,
    ) -> ModelResult<()> {
        self.transaction(|model| {
            model.set_terminal(edge, source, true)?;
            model.set_terminal(edge, target, false)
        })
    }

    /// Replaces the value. Always recorded, even when equal.
    pub fn set_value(&mut self, cell: CellRef, value: Value) -> ModelResult<()> {
        self.arena.require(cell)?;
        self.execute(ChangeRecord::value(cell, value))
    }

    pub fn set_geometry(&mut self, cell: CellRef, geometry: Option<Geometry>) -> ModelResult<()> {
        if self.arena.require(cell)?.geometry() == geometry.as_ref() {
            return Ok(());
        }
        self.execute(ChangeRecord::geometry(cell, geometry))
    }

    pub fn set_style(&mut self, cell: CellRef, style: Option<String>) -> ModelResult<()> {
        if self.arena.require(cell)?.style() == style.as_deref() {
            return Ok(());
        }
        self.execute(ChangeRecord::style(cell, style))
    }

    pub fn set_collapsed(&mut self, cell: CellRef, collapsed: bool) -> ModelResult<()> {
        if self.arena.require(cell)?.is_collapsed() == collapsed {
            return Ok(());
        }
        self.execute(ChangeRecord::collapsed(cell, collapsed))
    }

    pub fn set_visible(&mut self, cell: CellRef, visible: bool) -> ModelResult<()> {
        if self.arena.require(cell)?.is_visible() == visible {
            return Ok(());
        }
        self.execute(ChangeRecord::visible(cell, visible))
    }

    /// Creates a vertex and appends it under `parent`.
    pub fn insert_vertex(
        &mut self,
        parent: CellRef,
        value: Value,
        geometry: Geometry,
    ) -> ModelResult<CellRef> {
        let vertex = self.create_cell(Cell::vertex(value).with_geometry(geometry));
        self.add(parent, vertex, None)
    }

    /// Creates an edge under `parent` and connects it, all in one transaction.
    pub fn insert_edge(
        &mut self,
        parent: CellRef,
        value: Value,
        source: Option<CellRef>,
        target: Option<CellRef>,
    ) -> ModelResult<CellRef> {
        let edge = self.create_cell(Cell::edge(value));
        self.transaction(|model| {
            model.add(parent, edge, None)?;
            model.set_terminals(edge, source, target)?;
            Ok(edge)
        })
    }

    // -- Transactions --

    /// Opens (or nests) a transaction.
    pub fn begin_update(&mut self) -> ModelResult<()> {
        self.update_level += 1;
        let mut outcome = self.fire(ModelEvent::BeginUpdate);
        if self.update_level == 1 {
            keep_first(&mut outcome, self.fire(ModelEvent::StartEdit));
        }
        outcome
    }

    /// Closes one transaction level; the outermost close hands off the edit.
    ///
    /// # Errors
    /// - `UnbalancedEndUpdate` without an open transaction (nothing fires).
    /// - The first listener failure; the close-out still runs to the end.
    pub fn end_update(&mut self) -> ModelResult<()> {
        if self.update_level == 0 {
            return Err(ModelError::UnbalancedEndUpdate);
        }
        self.update_level -= 1;

        let mut outcome = Ok(());
        if self.update_level == 0 {
            keep_first(&mut outcome, self.fire(ModelEvent::EndEdit));
        }

        if !self.ending_update.get() {
            let guard = EndingUpdateGuard::acquire(&self.ending_update, self.update_level == 0);
            keep_first(
                &mut outcome,
                self.fire(ModelEvent::EndUpdate {
                    edit: Rc::clone(&self.current_edit),
                }),
            );

            if guard.is_closing() && !self.current_edit.is_empty() {
                keep_first(
                    &mut outcome,
                    self.fire(ModelEvent::BeforeUndo {
                        edit: Rc::clone(&self.current_edit),
                    }),
                );
                let closed = std::mem::take(&mut self.current_edit);
                log::debug!(
                    "event=edit_closed module=model status=ok changes={}",
                    closed.len()
                );
                keep_first(&mut outcome, Rc::clone(&closed).notify(self));
                keep_first(&mut outcome, self.fire(ModelEvent::Undo { edit: closed }));
            }
            drop(guard);
        }
        outcome
    }

    /// Runs `body` between `begin_update` and `end_update`.
    ///
    /// `end_update` runs even when `body` fails; the body's error wins.
    pub fn transaction<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> ModelResult<T>,
    ) -> ModelResult<T> {
        let began = self.begin_update();
        let result = body(self);
        let ended = self.end_update();
        let value = result?;
        began?;
        ended?;
        Ok(value)
    }

    /// Applies `change`, records it in the current edit and fires
    /// `EXECUTE`/`EXECUTED` inside an implicit transaction.
    ///
    /// # Errors
    /// - Validation errors of the record; nothing is applied or recorded.
    /// - The first listener failure; the change stays applied and recorded.
    pub fn execute(&mut self, mut change: ChangeRecord) -> ModelResult<()> {
        change.apply(self)?;

        let mut outcome = self.begin_update();
        // Copies only when a listener still holds an earlier END_UPDATE edit.
        Rc::make_mut(&mut self.current_edit).add(change.clone());
        keep_first(
            &mut outcome,
            self.fire(ModelEvent::Execute {
                change: change.clone(),
            }),
        );
        keep_first(&mut outcome, self.fire(ModelEvent::Executed { change }));
        keep_first(&mut outcome, self.end_update());
        outcome
    }

    /// Applies already-recorded changes directly (undo/redo path).
    ///
    /// Bypasses `execute` so the replay is not recorded again, but still
    /// broadcasts `CHANGE`/`NOTIFY` with the records applied.
    ///
    /// # Errors
    /// - The first record that fails to apply. The records before it are
    ///   rolled back and `END_EDIT` closes the bracket; the model is left as
    ///   it was and no `CHANGE` fires.
    /// - `ModelError::Listener` once every record is applied; the replay
    ///   itself is complete.
    pub(crate) fn replay(
        &mut self,
        records: Vec<ChangeRecord>,
        significant: bool,
    ) -> ModelResult<Rc<UndoableEdit>> {
        let mut outcome = self.fire(ModelEvent::StartEdit);
        let mut applied: Vec<ChangeRecord> = Vec::with_capacity(records.len());
        for mut record in records {
            if let Err(err) = record.apply(self) {
                log::error!(
                    "event=replay_failed module=model status=error rolled_back={} error={err}",
                    applied.len()
                );
                self.roll_back(&applied);
                if let Err(listener) = self.fire(ModelEvent::EndEdit) {
                    log::warn!("event=replay_failed module=model status=error error={listener}");
                }
                return Err(err);
            }
            keep_first(
                &mut outcome,
                self.fire(ModelEvent::Executed {
                    change: record.clone(),
                }),
            );
            applied.push(record);
        }
        keep_first(&mut outcome, self.fire(ModelEvent::EndEdit));

        let edit = Rc::new(UndoableEdit::from_changes(applied, significant));
        keep_first(&mut outcome, Rc::clone(&edit).notify(self));
        outcome.map(|()| edit)
    }

    /// Undoes `applied` in reverse order, announcing each inverse.
    fn roll_back(&mut self, applied: &[ChangeRecord]) {
        for record in applied.iter().rev() {
            let mut inverse = record.inverse();
            if let Err(err) = inverse.apply(self) {
                log::error!("event=rollback_failed module=model status=error error={err}");
                continue;
            }
            if let Err(err) = self.fire(ModelEvent::Executed { change: inverse }) {
                log::warn!("event=rollback_listener module=model status=error error={err}");
            }
        }
    }

    pub(crate) fn fire(&mut self, event: ModelEvent) -> ModelResult<()> {
        self.fire_event(EventObject::new(event))
            .map(|_| ())
            .map_err(ModelError::from)
    }

    // -- Primitives used by change records --

    pub(crate) fn root_changed(&mut self, root: CellRef) -> ModelResult<CellRef> {
        if self.arena.require(root)?.parent().is_some() {
            return Err(ModelError::RootHasParent(root));
        }
        let previous = std::mem::replace(&mut self.root, root);
        self.next_id = 0;
        self.registry.clear();
        self.cell_added(root);
        log::debug!(
            "event=root_changed module=model status=ok registered={}",
            self.registry.len()
        );
        Ok(previous)
    }

    /// Moves `child` to `target` (`None` detaches), returning where it was.
    pub(crate) fn parent_for_cell_changed(
        &mut self,
        child: CellRef,
        target: Option<(CellRef, usize)>,
    ) -> ModelResult<Option<(CellRef, usize)>> {
        self.arena.require(child)?;
        if child == self.root {
            return Err(ModelError::CannotMoveRoot(child));
        }
        if let Some((parent, index)) = target {
            self.arena.resolve_insert_index(parent, child, Some(index))?;
        }

        let was_contained = self.contains(child);
        let previous = self.arena.remove_from_parent(child);
        if let Some((parent, index)) = target {
            self.arena.insert(parent, child, Some(index))?;
        }
        let now_contained = self.contains(child);

        match (was_contained, now_contained) {
            (false, true) => self.cell_added(child),
            (true, false) => self.cell_removed(child),
            _ => {}
        }
        Ok(previous)
    }

    pub(crate) fn terminal_for_cell_changed(
        &mut self,
        edge: CellRef,
        terminal: Option<CellRef>,
        is_source: bool,
    ) -> ModelResult<Option<CellRef>> {
        if let Some(terminal) = terminal {
            self.arena.require(terminal)?;
        }
        let node = self.arena.require_mut(edge)?;
        let previous = node.terminal(is_source);
        node.set_terminal(terminal, is_source);
        Ok(previous)
    }

    pub(crate) fn value_for_cell_changed(
        &mut self,
        cell: CellRef,
        value: Value,
    ) -> ModelResult<Value> {
        let node = self.arena.require_mut(cell)?;
        Ok(std::mem::replace(&mut node.value, value))
    }

    pub(crate) fn geometry_for_cell_changed(
        &mut self,
        cell: CellRef,
        geometry: Option<Geometry>,
    ) -> ModelResult<Option<Geometry>> {
        let node = self.arena.require_mut(cell)?;
        Ok(std::mem::replace(&mut node.geometry, geometry))
    }

    pub(crate) fn style_for_cell_changed(
        &mut self,
        cell: CellRef,
        style: Option<String>,
    ) -> ModelResult<Option<String>> {
        let node = self.arena.require_mut(cell)?;
        Ok(std::mem::replace(&mut node.style, style))
    }

    pub(crate) fn collapsed_state_for_cell_changed(
        &mut self,
        cell: CellRef,
        collapsed: bool,
    ) -> ModelResult<bool> {
        let node = self.arena.require_mut(cell)?;
        Ok(std::mem::replace(&mut node.collapsed, collapsed))
    }

    pub(crate) fn visible_state_for_cell_changed(
        &mut self,
        cell: CellRef,
        visible: bool,
    ) -> ModelResult<bool> {
        let node = self.arena.require_mut(cell)?;
        Ok(std::mem::replace(&mut node.visible, visible))
    }

    // -- Registry --

    /// Registers `cell` and its subtree, assigning ids and resolving collisions.
    ///
    /// A colliding incoming cell is renamed; the incumbent keeps its id.
    fn cell_added(&mut self, cell: CellRef) {
        for current in self.arena.descendants(cell) {
            let mut id = self.arena.get(current).and_then(|node| node.id.clone());
            if id.is_none() && self.ids.create_ids {
                id = Some(self.create_id(current));
            }
            let Some(mut id) = id else {
                continue;
            };

            let mut collided = false;
            while self
                .registry
                .get(&id)
                .is_some_and(|owner| *owner != current)
            {
                collided = true;
                id = self.create_id(current);
            }
            if collided {
                log::debug!("event=id_collision module=model status=ok reassigned={id}");
            }

            if let Some(numeric) = numeric_id(&id) {
                self.next_id = self.next_id.max(numeric.saturating_add(1));
            }
            if let Some(node) = self.arena.get_mut(current) {
                node.id = Some(id.clone());
            }
            self.registry.insert(id, current);
        }
    }

    /// Unregisters `cell` and its subtree. Ids stay on the cells.
    fn cell_removed(&mut self, cell: CellRef) {
        for current in self.arena.descendants(cell) {
            let Some(id) = self.arena.get(current).and_then(|node| node.id.clone()) else {
                continue;
            };
            if self.registry.get(&id) == Some(&current) {
                self.registry.remove(&id);
            }
        }
    }

    fn create_id(&mut self, cell: CellRef) -> String {
        let counter = self.next_id;
        self.next_id += 1;
        let fallback = Cell::default();
        let node = self.arena.get(cell).unwrap_or(&fallback);
        self.id_strategy.create_id(node, counter, &self.ids)
    }
}
