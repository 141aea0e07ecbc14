//! CLI smoke entry point.
//!
//! # Responsibility
//! - Drive one transaction, an undo and a redo through `cellgraph_core`.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `cellgraph_cli [config.json]`

use cellgraph_core::{
    init_logging_from, listener, CoreConfig, EventObject, EventSource, Geometry, GraphModel,
    InvalidationTracker, ModelEvent, ModelEventKind, ModelResult, UndoManager,
};
use serde_json::json;
use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;

fn main() -> ExitCode {
    let config = match load_config(std::env::args().nth(1)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("cellgraph_cli config error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_logging_from(&config) {
        eprintln!("cellgraph_cli logging error: {err}");
        return ExitCode::FAILURE;
    }

    println!("cellgraph_core version={}", cellgraph_core::core_version());
    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("cellgraph_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<String>) -> Result<CoreConfig, String> {
    let Some(path) = path else {
        return Ok(CoreConfig::default());
    };
    let raw = std::fs::read_to_string(&path).map_err(|err| format!("{path}: {err}"))?;
    CoreConfig::from_json_str(&raw).map_err(|err| err.to_string())
}

fn run(config: &CoreConfig) -> ModelResult<()> {
    let mut model = GraphModel::with_config(config);
    let history = Rc::new(RefCell::new(UndoManager::from_config(config)));
    UndoManager::track(&history, &mut model);
    let tracker = Rc::new(RefCell::new(InvalidationTracker::new()));
    InvalidationTracker::observe(&tracker, &mut model);

    model.add_listener(
        ModelEventKind::Change,
        listener(|_model: &mut GraphModel, event: &mut EventObject<ModelEvent>| {
            let count = event.event().changes().map_or(0, <[_]>::len);
            println!("change changes={count}");
            Ok(())
        }),
    );

    let layer = model.child_at(model.root(), 0).unwrap_or(model.root());
    let (a, b) = model.transaction(|model| {
        let a = model.insert_vertex(layer, json!("A"), Geometry::new(20.0, 20.0, 80.0, 30.0))?;
        let b = model.insert_vertex(layer, json!("B"), Geometry::new(200.0, 150.0, 80.0, 30.0))?;
        model.insert_edge(layer, json!("A->B"), Some(a), Some(b))?;
        Ok((a, b))
    })?;
    println!(
        "cells={} edges_of_a={} stale={}",
        model.registered_ids().len(),
        model.edges(a).len(),
        tracker.borrow_mut().take().stale.len()
    );

    history.borrow_mut().undo(&mut model)?;
    println!(
        "undo children={} contains_b={}",
        model.child_count(layer),
        model.contains(b)
    );

    history.borrow_mut().redo(&mut model)?;
    println!(
        "redo children={} contains_b={} history={}",
        model.child_count(layer),
        model.contains(b),
        history.borrow().len()
    );
    Ok(())
}
