use coursetree::{NodeId, TreeEditor};
use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{editor_mut, editor_ref, parse_path, required_str};
use crate::ipc::types::{AppState, Request};

fn selection_json(editor: &TreeEditor) -> serde_json::Value {
    serde_json::to_value(editor.selection()).unwrap_or_else(|_| json!({}))
}

fn handle_selection_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let editor = match editor_ref(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    ok(&req.id, json!({ "selection": selection_json(editor) }))
}

fn handle_selection_expand(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "id") {
        Ok(v) => NodeId::from(v),
        Err(e) => return e,
    };
    let editor = match editor_mut(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    let expanded = editor.expand(&id);
    ok(
        &req.id,
        json!({ "expanded": expanded, "selection": selection_json(editor) }),
    )
}

fn handle_selection_collapse(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "id") {
        Ok(v) => NodeId::from(v),
        Err(e) => return e,
    };
    let editor = match editor_mut(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    editor.collapse(&id);
    ok(
        &req.id,
        json!({ "expanded": false, "selection": selection_json(editor) }),
    )
}

fn handle_selection_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "id") {
        Ok(v) => NodeId::from(v),
        Err(e) => return e,
    };
    let editor = match editor_mut(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    let expanded = editor.toggle(&id);
    ok(
        &req.id,
        json!({ "expanded": expanded, "selection": selection_json(editor) }),
    )
}

fn handle_selection_focus(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match parse_path(req, "path") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let editor = match editor_mut(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    let focused = editor.set_focus(path).to_vec();
    ok(
        &req.id,
        json!({ "focusedPath": focused, "selection": selection_json(editor) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "selection.get" => Some(handle_selection_get(state, req)),
        "selection.expand" => Some(handle_selection_expand(state, req)),
        "selection.collapse" => Some(handle_selection_collapse(state, req)),
        "selection.toggle" => Some(handle_selection_toggle(state, req)),
        "selection.focus" => Some(handle_selection_focus(state, req)),
        _ => None,
    }
}
