use cellgraph_core::{
    CellRef, Geometry, GraphModel, InvalidationTracker, ListenerError, ModelError, UndoManager,
};
use serde_json::json;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

fn observed() -> (GraphModel, CellRef, Rc<RefCell<InvalidationTracker>>) {
    let mut model = GraphModel::new();
    let layer = model.child_at(model.root(), 0).unwrap();
    let tracker = Rc::new(RefCell::new(InvalidationTracker::new()));
    InvalidationTracker::observe(&tracker, &mut model);
    (model, layer, tracker)
}

fn set(cells: &[CellRef]) -> BTreeSet<CellRef> {
    cells.iter().copied().collect()
}

#[test]
fn move_invalidates_child_and_both_parents() {
    let (mut model, layer, tracker) = observed();
    let from = model.insert_vertex(layer, json!("from"), Geometry::default()).unwrap();
    let to = model.insert_vertex(layer, json!("to"), Geometry::default()).unwrap();
    let child = model.insert_vertex(from, json!("child"), Geometry::default()).unwrap();
    tracker.borrow_mut().take();

    model.add(to, child, None).unwrap();

    let stale = tracker.borrow_mut().take();
    assert!(!stale.full_reset);
    assert_eq!(stale.stale, set(&[from, to, child]));
    assert!(!stale.is_stale(layer));
}

#[test]
fn one_transaction_yields_one_notification() {
    let (mut model, layer, tracker) = observed();
    let (a, b, edge) = model
        .transaction(|model| {
            let a = model.insert_vertex(layer, json!("a"), Geometry::default())?;
            let b = model.insert_vertex(layer, json!("b"), Geometry::default())?;
            let edge = model.insert_edge(layer, json!(null), Some(a), Some(b))?;
            model.set_value(a, json!("A"))?;
            model.set_style(b, Some("shape=hexagon".to_string()))?;
            Ok((a, b, edge))
        })
        .unwrap();

    let tracker = tracker.borrow();
    assert_eq!(tracker.notifications(), 1);
    let pending = tracker.pending();
    assert_eq!(pending.stale, set(&[layer, a, b, edge]));
    assert_eq!(pending.labels, set(&[a]));
    assert_eq!(pending.shapes, set(&[b]));
}

#[test]
fn empty_transaction_invalidates_nothing() {
    let (mut model, _layer, tracker) = observed();
    model.begin_update().unwrap();
    model.end_update().unwrap();

    assert_eq!(tracker.borrow().notifications(), 0);
    assert!(tracker.borrow().pending().is_empty());
}

#[test]
fn root_change_and_its_undo_force_full_reset() {
    let (mut model, _layer, tracker) = observed();
    let history = Rc::new(RefCell::new(UndoManager::default()));
    UndoManager::track(&history, &mut model);

    model.clear().unwrap();
    assert!(tracker.borrow_mut().take().full_reset);

    history.borrow_mut().undo(&mut model).unwrap();
    let after_undo = tracker.borrow_mut().take();
    assert!(after_undo.full_reset);
    assert_eq!(tracker.borrow().notifications(), 2);
}

#[test]
fn held_tracker_borrow_fails_the_change_listener() {
    let (mut model, layer, tracker) = observed();
    let held = tracker.borrow();

    let err = model.set_value(layer, json!("busy")).unwrap_err();

    assert_eq!(
        err,
        ModelError::Listener(ListenerError::new("invalidation tracker is busy"))
    );
    assert_eq!(held.notifications(), 0);
    drop(held);
    assert_eq!(model.cell(layer).unwrap().value(), &json!("busy"));
    assert_eq!(model.update_level(), 0);

    model.set_value(layer, json!("free")).unwrap();
    assert_eq!(tracker.borrow().notifications(), 1);
    assert!(tracker.borrow().pending().is_stale(layer));
}
