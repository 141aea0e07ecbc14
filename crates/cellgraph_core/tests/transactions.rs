use cellgraph_core::{
    listener, ChangeRecord, EventObject, EventSource, GraphModel, ListenerError, ModelError,
    ModelEvent, ModelEventKind, UndoableEdit,
};
use serde_json::json;
use std::cell::{Cell as Counter, RefCell};
use std::rc::Rc;

fn record_kinds(model: &mut GraphModel) -> Rc<RefCell<Vec<ModelEventKind>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    model.add_listener_all(listener(
        move |_model: &mut GraphModel, event: &mut EventObject<ModelEvent>| {
            sink.borrow_mut().push(event.kind());
            Ok(())
        },
    ));
    seen
}

fn record_changes(model: &mut GraphModel) -> Rc<RefCell<Vec<Vec<ChangeRecord>>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    model.add_listener(
        ModelEventKind::Change,
        listener(
            move |_model: &mut GraphModel, event: &mut EventObject<ModelEvent>| {
                sink.borrow_mut()
                    .push(event.event().changes().unwrap_or_default().to_vec());
                Ok(())
            },
        ),
    );
    seen
}

fn count(kinds: &[ModelEventKind], kind: ModelEventKind) -> usize {
    kinds.iter().filter(|seen| **seen == kind).count()
}

#[test]
fn empty_transaction_fires_bracket_events_only() {
    let mut model = GraphModel::new();
    let kinds = record_kinds(&mut model);

    model.begin_update().unwrap();
    model.end_update().unwrap();

    assert_eq!(
        *kinds.borrow(),
        vec![
            ModelEventKind::BeginUpdate,
            ModelEventKind::StartEdit,
            ModelEventKind::EndEdit,
            ModelEventKind::EndUpdate,
        ]
    );
}

#[test]
fn single_execute_is_a_complete_transaction() {
    let mut model = GraphModel::new();
    let layer = model.child_at(model.root(), 0).unwrap();
    let kinds = record_kinds(&mut model);

    model.set_value(layer, json!("background")).unwrap();

    assert_eq!(
        *kinds.borrow(),
        vec![
            ModelEventKind::BeginUpdate,
            ModelEventKind::StartEdit,
            ModelEventKind::Execute,
            ModelEventKind::Executed,
            ModelEventKind::EndEdit,
            ModelEventKind::EndUpdate,
            ModelEventKind::BeforeUndo,
            ModelEventKind::Change,
            ModelEventKind::Notify,
            ModelEventKind::Undo,
        ]
    );
    assert!(model.current_edit().is_empty());
}

#[test]
fn nested_transactions_fold_into_one_change() {
    let mut model = GraphModel::new();
    let layer = model.child_at(model.root(), 0).unwrap();
    let kinds = record_kinds(&mut model);
    let changes = record_changes(&mut model);

    model.begin_update().unwrap();
    model.set_value(layer, json!("first")).unwrap();
    model.begin_update().unwrap();
    model.set_style(layer, Some("fill=red".to_string())).unwrap();
    model.end_update().unwrap();
    model.set_collapsed(layer, true).unwrap();
    assert!(changes.borrow().is_empty());
    model.end_update().unwrap();

    let kinds = kinds.borrow();
    assert_eq!(count(&kinds, ModelEventKind::StartEdit), 1);
    assert_eq!(count(&kinds, ModelEventKind::EndEdit), 1);
    assert_eq!(count(&kinds, ModelEventKind::Change), 1);
    assert_eq!(count(&kinds, ModelEventKind::Notify), 1);
    assert_eq!(count(&kinds, ModelEventKind::Undo), 1);
    assert_eq!(kinds.last(), Some(&ModelEventKind::Undo));

    let changes = changes.borrow();
    assert_eq!(changes.len(), 1);
    let cells_and_kinds: Vec<_> = changes[0]
        .iter()
        .map(|change| match change {
            ChangeRecord::ValueChanged { .. } => "value",
            ChangeRecord::StyleChanged { .. } => "style",
            ChangeRecord::CollapsedChanged { .. } => "collapsed",
            _ => "other",
        })
        .collect();
    assert_eq!(cells_and_kinds, vec!["value", "style", "collapsed"]);
}

#[test]
fn nested_end_update_carries_accumulating_edit() {
    let mut model = GraphModel::new();
    let layer = model.child_at(model.root(), 0).unwrap();
    let sizes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&sizes);
    model.add_listener(
        ModelEventKind::EndUpdate,
        listener(
            move |model: &mut GraphModel, event: &mut EventObject<ModelEvent>| {
                let edit = event.event().edit().unwrap();
                sink.borrow_mut().push((model.update_level(), edit.len()));
                Ok(())
            },
        ),
    );

    model
        .transaction(|model| {
            model.set_value(layer, json!(1))?;
            model.set_value(layer, json!(2))
        })
        .unwrap();

    assert_eq!(*sizes.borrow(), vec![(1, 1), (1, 2), (0, 2)]);
}

#[test]
fn close_out_events_share_one_edit_and_kept_snapshots_stay_put() {
    let mut model = GraphModel::new();
    let layer = model.child_at(model.root(), 0).unwrap();
    let kept: Rc<RefCell<Vec<(ModelEventKind, Rc<UndoableEdit>)>>> =
        Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&kept);
    model.add_listener_all(listener(
        move |_model: &mut GraphModel, event: &mut EventObject<ModelEvent>| {
            if let Some(edit) = event.event().edit() {
                sink.borrow_mut().push((event.kind(), Rc::clone(edit)));
            }
            Ok(())
        },
    ));

    model
        .transaction(|model| {
            model.set_value(layer, json!(1))?;
            model.set_value(layer, json!(2))
        })
        .unwrap();

    let kept = kept.borrow();
    let kinds: Vec<_> = kept.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(
        kinds,
        vec![
            ModelEventKind::EndUpdate,
            ModelEventKind::EndUpdate,
            ModelEventKind::EndUpdate,
            ModelEventKind::BeforeUndo,
            ModelEventKind::Change,
            ModelEventKind::Notify,
            ModelEventKind::Undo,
        ]
    );
    assert_eq!(kept[0].1.len(), 1);
    assert!(Rc::ptr_eq(&kept[1].1, &kept[2].1));
    for (_, edit) in &kept[2..] {
        assert!(Rc::ptr_eq(edit, &kept[6].1));
    }
    assert_eq!(kept[6].1.len(), 2);
    assert!(model.current_edit().is_empty());
}

#[test]
fn executed_fires_per_change_with_applied_state() {
    let mut model = GraphModel::new();
    let layer = model.child_at(model.root(), 0).unwrap();
    model.set_value(layer, json!("old")).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    model.add_listener(
        ModelEventKind::Executed,
        listener(
            move |model: &mut GraphModel, event: &mut EventObject<ModelEvent>| {
                let change = event.event().change().unwrap().clone();
                let current = model.cell(change.cell()).unwrap().value().clone();
                sink.borrow_mut().push((change, current));
                Ok(())
            },
        ),
    );

    model.set_value(layer, json!("new")).unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].0,
        ChangeRecord::ValueChanged {
            cell: layer,
            value: json!("new"),
            previous: json!("old"),
        }
    );
    assert_eq!(seen[0].1, json!("new"));
}

#[test]
fn unchanged_setters_record_nothing() {
    let mut model = GraphModel::new();
    let layer = model.child_at(model.root(), 0).unwrap();
    let changes = record_changes(&mut model);

    model.set_style(layer, None).unwrap();
    model.set_visible(layer, true).unwrap();
    model.set_collapsed(layer, false).unwrap();
    model.set_geometry(layer, None).unwrap();

    assert!(changes.borrow().is_empty());
}

#[test]
fn failing_listener_does_not_wedge_the_transaction_machine() {
    let mut model = GraphModel::new();
    let layer = model.child_at(model.root(), 0).unwrap();
    let fail = Rc::new(Counter::new(true));
    let flag = Rc::clone(&fail);
    model.add_listener(
        ModelEventKind::Change,
        listener(
            move |_model: &mut GraphModel, _event: &mut EventObject<ModelEvent>| {
                if flag.get() {
                    return Err(ListenerError::new("cache rebuild failed"));
                }
                Ok(())
            },
        ),
    );
    let undo_count = Rc::new(Counter::new(0));
    let undos = Rc::clone(&undo_count);
    model.add_listener(
        ModelEventKind::Undo,
        listener(
            move |_model: &mut GraphModel, _event: &mut EventObject<ModelEvent>| {
                undos.set(undos.get() + 1);
                Ok(())
            },
        ),
    );

    let err = model.set_value(layer, json!("applied")).unwrap_err();
    assert_eq!(
        err,
        ModelError::Listener(ListenerError::new("cache rebuild failed"))
    );
    assert_eq!(model.cell(layer).unwrap().value(), &json!("applied"));
    assert_eq!(model.update_level(), 0);
    assert!(model.current_edit().is_empty());
    assert_eq!(undo_count.get(), 1);

    fail.set(false);
    let changes = record_changes(&mut model);
    model.set_value(layer, json!("again")).unwrap();
    assert_eq!(changes.borrow().len(), 1);
    assert_eq!(undo_count.get(), 2);
}

#[test]
fn failing_body_still_closes_the_transaction() {
    let mut model = GraphModel::new();
    let layer = model.child_at(model.root(), 0).unwrap();
    let changes = record_changes(&mut model);

    let result: Result<(), ModelError> = model.transaction(|model| {
        model.set_value(layer, json!("kept"))?;
        model.add(layer, model.root(), None)?;
        Ok(())
    });

    assert_eq!(result, Err(ModelError::CannotMoveRoot(model.root())));
    assert_eq!(model.update_level(), 0);
    assert_eq!(changes.borrow().len(), 1);
    assert_eq!(changes.borrow()[0].len(), 1);
}

#[test]
fn change_listener_mutation_lands_in_next_transaction() {
    let mut model = GraphModel::new();
    let layer = model.child_at(model.root(), 0).unwrap();
    let armed = Rc::new(Counter::new(true));
    let trigger = Rc::clone(&armed);
    model.add_listener(
        ModelEventKind::Change,
        listener(
            move |model: &mut GraphModel, _event: &mut EventObject<ModelEvent>| {
                if trigger.replace(false) {
                    model
                        .set_style(layer, Some("derived".to_string()))
                        .map_err(|err| ListenerError::new(err.to_string()))?;
                }
                Ok(())
            },
        ),
    );
    let changes = record_changes(&mut model);

    model.set_value(layer, json!("source")).unwrap();
    assert_eq!(changes.borrow().len(), 1);
    assert_eq!(model.current_edit().len(), 1);
    assert_eq!(model.cell(layer).unwrap().style(), Some("derived"));

    model.begin_update().unwrap();
    model.end_update().unwrap();
    let changes = changes.borrow();
    assert_eq!(changes.len(), 2);
    assert!(matches!(changes[1][0], ChangeRecord::StyleChanged { .. }));
    assert!(model.current_edit().is_empty());
}

#[test]
fn listeners_see_registration_order_and_removal_mid_dispatch() {
    let mut model = GraphModel::new();
    let layer = model.child_at(model.root(), 0).unwrap();
    let order = Rc::new(RefCell::new(Vec::new()));

    let late_sink = Rc::clone(&order);
    let late = listener(
        move |_model: &mut GraphModel, _event: &mut EventObject<ModelEvent>| {
            late_sink.borrow_mut().push("late");
            Ok(())
        },
    );
    let remover_sink = Rc::clone(&order);
    let to_remove = Rc::clone(&late);
    model.add_listener(
        ModelEventKind::Change,
        listener(
            move |model: &mut GraphModel, event: &mut EventObject<ModelEvent>| {
                remover_sink.borrow_mut().push("remover");
                event.consume();
                model.remove_listener(&to_remove);
                Ok(())
            },
        ),
    );
    let all_sink = Rc::clone(&order);
    model.add_listener_all(listener(
        move |_model: &mut GraphModel, event: &mut EventObject<ModelEvent>| {
            if event.kind() == ModelEventKind::Change {
                assert!(event.is_consumed());
                all_sink.borrow_mut().push("all");
            }
            Ok(())
        },
    ));
    model.add_listener(ModelEventKind::Change, Rc::clone(&late));

    model.set_value(layer, json!("x")).unwrap();

    assert_eq!(*order.borrow(), vec!["remover", "all"]);
}

#[test]
fn disabled_events_still_apply_changes() {
    let mut model = GraphModel::new();
    let layer = model.child_at(model.root(), 0).unwrap();
    let kinds = record_kinds(&mut model);

    model.set_events_enabled(false);
    model.set_value(layer, json!("quiet")).unwrap();
    model.set_events_enabled(true);

    assert!(kinds.borrow().is_empty());
    assert_eq!(model.cell(layer).unwrap().value(), &json!("quiet"));
    assert!(model.current_edit().is_empty());
}
