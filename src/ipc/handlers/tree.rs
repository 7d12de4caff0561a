use coursetree::{export_node, TreeEditor, TreeRecord};
use serde_json::json;

use crate::ipc::error::{edit_err, err, ok};
use crate::ipc::helpers::{editor_ref, parse_clock, required_path, tree_json};
use crate::ipc::types::{AppState, Request};

fn handle_tree_new(state: &mut AppState, req: &Request) -> serde_json::Value {
    let clock = match parse_clock(req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let editor = TreeEditor::new(state.settings.clone(), clock);
    let tree = tree_json(&editor);
    state.editor = Some(editor);
    ok(&req.id, json!({ "tree": tree }))
}

fn handle_tree_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("tree") else {
        return err(&req.id, "bad_params", "missing tree", None);
    };
    let record: TreeRecord = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("tree {}", e), None),
    };
    let clock = match parse_clock(req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    // Build into a fresh editor so a bad snapshot leaves the current one alone.
    let mut editor = TreeEditor::new(state.settings.clone(), clock);
    if let Err(e) = editor.load(&record) {
        return edit_err(&req.id, &e);
    }
    let tree = tree_json(&editor);
    let node_count = editor.tree().len();
    state.editor = Some(editor);
    ok(&req.id, json!({ "tree": tree, "nodeCount": node_count }))
}

fn handle_tree_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let editor = match editor_ref(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    ok(&req.id, json!({ "tree": tree_json(editor) }))
}

fn handle_nodes_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let editor = match editor_ref(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    let path = match required_path(req, "path") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match editor.node(&path) {
        Ok(node) => ok(
            &req.id,
            json!({
                "node": export_node(&node),
                "completionRatio": node.aggregates().completion_ratio(),
            }),
        ),
        Err(e) => edit_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "tree.new" => Some(handle_tree_new(state, req)),
        "tree.load" => Some(handle_tree_load(state, req)),
        "tree.export" => Some(handle_tree_export(state, req)),
        "nodes.open" => Some(handle_nodes_open(state, req)),
        _ => None,
    }
}
