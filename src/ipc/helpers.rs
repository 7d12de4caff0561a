use chrono::NaiveDateTime;
use coursetree::{export_tree, Clock, FixedClock, NodeId, SystemClock, TreeEditor};
use serde_json::{json, Map, Value as JsonValue};

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};

pub fn editor_mut<'a>(state: &'a mut AppState, req: &Request) -> Result<&'a mut TreeEditor, JsonValue> {
    state
        .editor
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_tree", "load or create a tree first", None))
}

pub fn editor_ref<'a>(state: &'a AppState, req: &Request) -> Result<&'a TreeEditor, JsonValue> {
    state
        .editor
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_tree", "load or create a tree first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, JsonValue> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_object<'a>(req: &'a Request, key: &str) -> Result<&'a Map<String, JsonValue>, JsonValue> {
    req.params
        .get(key)
        .and_then(|v| v.as_object())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn parse_id_array(v: &JsonValue) -> Result<Vec<NodeId>, &'static str> {
    let arr = v.as_array().ok_or("must be array of strings")?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        let s = item.as_str().ok_or("must be array of strings")?.trim();
        if s.is_empty() {
            return Err("must not contain empty values");
        }
        out.push(NodeId::from(s));
    }
    Ok(out)
}

/// A path of ids. Missing or null means the tree root.
pub fn parse_path(req: &Request, key: &str) -> Result<Vec<NodeId>, JsonValue> {
    match req.params.get(key) {
        None => Ok(Vec::new()),
        Some(v) if v.is_null() => Ok(Vec::new()),
        Some(v) => parse_id_array(v).map_err(|m| err(&req.id, "bad_params", format!("{} {}", key, m), None)),
    }
}

pub fn required_path(req: &Request, key: &str) -> Result<Vec<NodeId>, JsonValue> {
    match req.params.get(key) {
        Some(v) if !v.is_null() => parse_path(req, key),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

pub fn parse_opt_i64(v: Option<&JsonValue>) -> Result<Option<i64>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or("must be integer or null"),
    }
}

/// `params.now` pins the clock (`YYYY-MM-DD HH:MM`); otherwise the system
/// clock is used.
pub fn parse_clock(req: &Request) -> Result<Box<dyn Clock>, JsonValue> {
    match req.params.get("now").and_then(|v| v.as_str()) {
        None => Ok(Box::new(SystemClock)),
        Some(raw) => NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M")
            .map(|t| Box::new(FixedClock(t)) as Box<dyn Clock>)
            .map_err(|_| err(&req.id, "bad_params", "now must look like YYYY-MM-DD HH:MM", None)),
    }
}

pub fn tree_json(editor: &TreeEditor) -> JsonValue {
    serde_json::to_value(export_tree(editor.tree())).unwrap_or_else(|_| json!({}))
}
