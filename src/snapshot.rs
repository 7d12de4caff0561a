//! Plain nested records exchanged with the shell: what `load_tree` accepts
//! and `export_tree` produces.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::sync::Arc;

use crate::aggregate::Aggregates;
use crate::error::{EditError, ValidationErrors};
use crate::ident::IdGenerator;
use crate::model::{child_level_of, Attributes, Level, Node, NodeId};
use crate::tree::{TreeHandle, ROOT_ID};
use crate::validate;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub boards: Vec<NodeRecord>,
    /// Written on export for the shell; ignored on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregates: Option<Aggregates>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Optional on load; when present it must match the depth of the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregates: Option<Aggregates>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeRecord>,
    #[serde(flatten)]
    pub attributes: Map<String, JsonValue>,
}

/// Build a tree from `record`. Provided ids are kept and fed to `ids` so that
/// fresh ids never collide with them; records without an id get a new one.
pub fn load_tree(record: &TreeRecord, ids: &mut IdGenerator) -> Result<TreeHandle, EditError> {
    let root_id = record
        .id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ROOT_ID);
    ids.observe(&NodeId::from(root_id));
    let mut seen = HashSet::new();
    observe_ids(&record.boards, "boards", root_id, ids, &mut seen)?;
    let boards = build_children(&record.boards, None, "boards", ids)?;
    Ok(TreeHandle::from_parts(NodeId::from(root_id), boards))
}

fn observe_ids(
    records: &[NodeRecord],
    location: &str,
    root_id: &str,
    ids: &mut IdGenerator,
    seen: &mut HashSet<String>,
) -> Result<(), EditError> {
    for (i, r) in records.iter().enumerate() {
        let here = format!("{}[{}]", location, i);
        if let Some(raw) = r.id.as_deref() {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(ValidationErrors::single(&format!("{}.id", here), "must not be empty").into());
            }
            // Paths may start with the root id, so no node may reuse it.
            if raw == root_id {
                return Err(ValidationErrors::single(
                    &format!("{}.id", here),
                    format!("{} is reserved for the tree root", raw),
                )
                .into());
            }
            if !seen.insert(raw.to_string()) {
                return Err(ValidationErrors::single(
                    &format!("{}.id", here),
                    format!("duplicate id {}", raw),
                )
                .into());
            }
            ids.observe(&NodeId::from(raw));
        }
        observe_ids(&r.children, &format!("{}.children", here), root_id, ids, seen)?;
    }
    Ok(())
}

fn build_children(
    records: &[NodeRecord],
    parent: Option<Level>,
    location: &str,
    ids: &mut IdGenerator,
) -> Result<Vec<Arc<Node>>, EditError> {
    let Some(level) = child_level_of(parent) else {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        return Err(EditError::invalid(format!("{}: sessions cannot have children", location)));
    };
    let mut out = Vec::with_capacity(records.len());
    for (i, r) in records.iter().enumerate() {
        let here = format!("{}[{}]", location, i);
        if let Some(declared) = r.level {
            if declared != level {
                return Err(ValidationErrors::single(
                    &format!("{}.level", here),
                    format!("expected {} at this depth, found {}", level, declared),
                )
                .into());
            }
        }
        let mut attributes = Attributes::from_json(level, &r.attributes)
            .map_err(|e| EditError::Validation(e.located(&here)))?;
        validate::normalize(&mut attributes);
        validate::validate_fields(&attributes).map_err(|e| EditError::Validation(e.located(&here)))?;
        let id = match r.id.as_deref() {
            Some(raw) => NodeId::from(raw.trim()),
            None => ids.new_id(level),
        };
        let children = build_children(&r.children, Some(level), &format!("{}.children", here), ids)?;
        out.push(Arc::new(Node::new(id, attributes, children)));
    }
    Ok(out)
}

pub fn export_tree(tree: &TreeHandle) -> TreeRecord {
    TreeRecord {
        id: Some(tree.root_id().to_string()),
        boards: tree.boards().iter().map(|n| export_node(n)).collect(),
        aggregates: Some(*tree.aggregates()),
    }
}

pub fn export_node(node: &Node) -> NodeRecord {
    NodeRecord {
        id: Some(node.id().to_string()),
        level: Some(node.level()),
        aggregates: Some(*node.aggregates()),
        children: node.children().iter().map(|c| export_node(c)).collect(),
        attributes: node.attributes().to_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::IdStrategy;
    use serde_json::json;

    fn record(v: JsonValue) -> TreeRecord {
        serde_json::from_value(v).expect("tree record")
    }

    #[test]
    fn missing_ids_are_generated_after_provided_ones() {
        let r = record(json!({
            "boards": [
                { "id": "b4", "name": "CBSE", "children": [ { "name": "Class 10" } ] },
                { "name": "ICSE" }
            ]
        }));
        let mut ids = IdGenerator::new(IdStrategy::Counter);
        let tree = load_tree(&r, &mut ids).expect("load");
        assert_eq!(tree.boards()[0].id().as_str(), "b4");
        assert_eq!(tree.boards()[0].children()[0].id().as_str(), "g1");
        assert_eq!(tree.boards()[1].id().as_str(), "b5");
        assert!(tree.inconsistencies().is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let r = record(json!({
            "boards": [
                { "id": "x", "name": "CBSE", "children": [ { "id": "x", "name": "Class 10" } ] }
            ]
        }));
        let err = load_tree(&r, &mut IdGenerator::default()).expect_err("duplicate");
        let EditError::Validation(errs) = err else {
            panic!("expected validation error");
        };
        assert!(errs.has_field("boards[0].children[0].id"));
    }

    #[test]
    fn node_ids_cannot_reuse_the_root_id() {
        let r = record(json!({
            "boards": [ { "id": "b1", "name": "CBSE", "children": [ { "id": "root", "name": "Class 10" } ] } ]
        }));
        let err = load_tree(&r, &mut IdGenerator::default()).expect_err("root id reused");
        let EditError::Validation(errs) = err else {
            panic!("expected validation error");
        };
        assert!(errs.has_field("boards[0].children[0].id"));

        let named = record(json!({
            "id": "catalogue",
            "boards": [ { "id": "catalogue", "name": "CBSE" } ]
        }));
        let err = load_tree(&named, &mut IdGenerator::default()).expect_err("custom root id reused");
        assert_eq!(err.code(), "validation_failed");

        // With a custom root id, "root" is an ordinary node id.
        let custom = record(json!({
            "id": "catalogue",
            "boards": [ { "id": "root", "name": "CBSE" } ]
        }));
        let tree = load_tree(&custom, &mut IdGenerator::default()).expect("load");
        assert_eq!(tree.boards()[0].id().as_str(), "root");
    }

    #[test]
    fn invalid_attributes_are_located() {
        let r = record(json!({
            "boards": [ { "name": "CBSE", "children": [ { "name": "" } ] } ]
        }));
        let err = load_tree(&r, &mut IdGenerator::default()).expect_err("blank name");
        assert_eq!(err.code(), "validation_failed");
        let EditError::Validation(errs) = err else {
            panic!("expected validation error");
        };
        assert!(errs.has_field("boards[0].children[0].name"));
    }

    #[test]
    fn sessions_with_children_are_rejected() {
        let r = record(json!({
            "boards": [ { "name": "B", "children": [ { "name": "G", "children": [
                { "name": "S", "children": [ { "title": "C", "children": [
                    { "title": "Session", "children": [ { "title": "too deep" } ] }
                ] } ] }
            ] } ] } ]
        }));
        let err = load_tree(&r, &mut IdGenerator::default()).expect_err("too deep");
        assert_eq!(err.code(), "invalid_operation");
    }

    #[test]
    fn declared_level_must_match_depth() {
        let r = record(json!({
            "boards": [ { "name": "CBSE", "level": "chapter" } ]
        }));
        let err = load_tree(&r, &mut IdGenerator::default()).expect_err("wrong level");
        assert_eq!(err.code(), "validation_failed");
    }
}
