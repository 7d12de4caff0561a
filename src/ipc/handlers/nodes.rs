use coursetree::{DuplicateOptions, NodeId, TitleMode};
use serde_json::json;

use crate::ipc::error::{edit_err, err, ok};
use crate::ipc::helpers::{editor_mut, parse_opt_i64, parse_path, required_object, required_path, tree_json};
use crate::ipc::types::{AppState, Request};

fn handle_nodes_insert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let parent_path = match parse_path(req, "parentPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input = match required_object(req, "input") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let editor = match editor_mut(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    match editor.insert(&parent_path, input) {
        Ok(inserted) => ok(
            &req.id,
            json!({
                "nodeId": inserted.id,
                "warnings": inserted.warnings,
                "tree": tree_json(editor),
            }),
        ),
        Err(e) => edit_err(&req.id, &e),
    }
}

fn handle_nodes_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_path(req, "path") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch = match required_object(req, "patch") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let editor = match editor_mut(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    match editor.update(&path, patch) {
        Ok(updated) => ok(
            &req.id,
            json!({ "warnings": updated.warnings, "tree": tree_json(editor) }),
        ),
        Err(e) => edit_err(&req.id, &e),
    }
}

fn handle_nodes_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_path(req, "path") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let editor = match editor_mut(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    match editor.remove(&path) {
        Ok(removed) => ok(
            &req.id,
            json!({
                "removedIds": removed.removed_ids,
                "removedCount": removed.removed_ids.len(),
                "tree": tree_json(editor),
            }),
        ),
        Err(e) => edit_err(&req.id, &e),
    }
}

fn handle_nodes_move(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_path(req, "path") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let new_parent_path = match parse_path(req, "newParentPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let new_index = match parse_opt_i64(req.params.get("newIndex")) {
        Ok(Some(v)) if v >= 0 => v as usize,
        Ok(Some(_)) => return err(&req.id, "bad_params", "newIndex must be >= 0", None),
        Ok(None) => usize::MAX,
        Err(m) => return err(&req.id, "bad_params", format!("newIndex {}", m), None),
    };
    let editor = match editor_mut(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    match editor.move_node(&path, &new_parent_path, new_index) {
        Ok(updated) => ok(
            &req.id,
            json!({ "warnings": updated.warnings, "tree": tree_json(editor) }),
        ),
        Err(e) => edit_err(&req.id, &e),
    }
}

fn handle_nodes_reorder(state: &mut AppState, req: &Request) -> serde_json::Value {
    let parent_path = match parse_path(req, "parentPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ordered: Vec<NodeId> = match required_path(req, "ids") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let editor = match editor_mut(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    match editor.reorder(&parent_path, &ordered) {
        Ok(_) => ok(&req.id, json!({ "tree": tree_json(editor) })),
        Err(e) => edit_err(&req.id, &e),
    }
}

fn handle_nodes_duplicate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_path(req, "path") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title_mode = match req.params.get("titleMode").and_then(|v| v.as_str()) {
        None => TitleMode::Same,
        Some(raw) => match TitleMode::parse(raw) {
            Some(m) => m,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "titleMode must be one of: same, appendCopy",
                    None,
                )
            }
        },
    };
    let day_offset = match parse_opt_i64(req.params.get("dayOffset")) {
        Ok(v) => v.unwrap_or(0),
        Err(m) => return err(&req.id, "bad_params", format!("dayOffset {}", m), None),
    };
    let editor = match editor_mut(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    let options = DuplicateOptions {
        title_mode,
        day_offset,
    };
    match editor.duplicate(&path, options) {
        Ok(inserted) => ok(
            &req.id,
            json!({
                "nodeId": inserted.id,
                "warnings": inserted.warnings,
                "tree": tree_json(editor),
            }),
        ),
        Err(e) => edit_err(&req.id, &e),
    }
}

fn handle_sessions_refresh_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let editor = match editor_mut(state, req) {
        Ok(e) => e,
        Err(e) => return e,
    };
    let (_, changed) = editor.refresh_session_statuses();
    ok(&req.id, json!({ "changed": changed, "tree": tree_json(editor) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "nodes.insert" => Some(handle_nodes_insert(state, req)),
        "nodes.update" => Some(handle_nodes_update(state, req)),
        "nodes.remove" => Some(handle_nodes_remove(state, req)),
        "nodes.move" => Some(handle_nodes_move(state, req)),
        "nodes.reorder" => Some(handle_nodes_reorder(state, req)),
        "nodes.duplicate" => Some(handle_nodes_duplicate(state, req)),
        "sessions.refreshStatus" => Some(handle_sessions_refresh_status(state, req)),
        _ => None,
    }
}
