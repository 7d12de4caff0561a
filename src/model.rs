use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;

use crate::aggregate::{self, Aggregates};
use crate::error::ValidationErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Board,
    Grade,
    Subject,
    Chapter,
    Session,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Board,
        Level::Grade,
        Level::Subject,
        Level::Chapter,
        Level::Session,
    ];

    /// Zero-based depth below the tree root.
    pub fn depth(self) -> usize {
        match self {
            Level::Board => 0,
            Level::Grade => 1,
            Level::Subject => 2,
            Level::Chapter => 3,
            Level::Session => 4,
        }
    }

    pub fn child(self) -> Option<Level> {
        Level::ALL.get(self.depth() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Board => "board",
            Level::Grade => "grade",
            Level::Subject => "subject",
            Level::Chapter => "chapter",
            Level::Session => "session",
        }
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            Level::Board => "b",
            Level::Grade => "g",
            Level::Subject => "s",
            Level::Chapter => "c",
            Level::Session => "ss",
        }
    }

    /// Field holding the display name at this level.
    pub fn name_field(self) -> &'static str {
        match self {
            Level::Board | Level::Grade | Level::Subject => "name",
            Level::Chapter | Level::Session => "title",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level of the children held by a parent; `None` stands for the tree root.
pub fn child_level_of(parent: Option<Level>) -> Option<Level> {
    match parent {
        None => Some(Level::Board),
        Some(level) => level.child(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Upcoming,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct BoardAttrs {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct GradeAttrs {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SubjectAttrs {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub is_free: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ChapterAttrs {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Planned number of sessions. Independent of the sessions actually
    /// scheduled under the chapter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_sessions: Option<i64>,
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionAttrs {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    pub status: SessionStatus,
    pub is_free: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attributes {
    Board(BoardAttrs),
    Grade(GradeAttrs),
    Subject(SubjectAttrs),
    Chapter(ChapterAttrs),
    Session(SessionAttrs),
}

macro_rules! with_attrs {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            Attributes::Board($a) => $body,
            Attributes::Grade($a) => $body,
            Attributes::Subject($a) => $body,
            Attributes::Chapter($a) => $body,
            Attributes::Session($a) => $body,
        }
    };
}

impl Attributes {
    pub fn level(&self) -> Level {
        match self {
            Attributes::Board(_) => Level::Board,
            Attributes::Grade(_) => Level::Grade,
            Attributes::Subject(_) => Level::Subject,
            Attributes::Chapter(_) => Level::Chapter,
            Attributes::Session(_) => Level::Session,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Attributes::Board(a) => &a.name,
            Attributes::Grade(a) => &a.name,
            Attributes::Subject(a) => &a.name,
            Attributes::Chapter(a) => &a.title,
            Attributes::Session(a) => &a.title,
        }
    }

    pub fn set_display_name(&mut self, value: String) {
        match self {
            Attributes::Board(a) => a.name = value,
            Attributes::Grade(a) => a.name = value,
            Attributes::Subject(a) => a.name = value,
            Attributes::Chapter(a) => a.title = value,
            Attributes::Session(a) => a.title = value,
        }
    }

    pub fn order(&self) -> Option<i64> {
        with_attrs!(self, a => a.order)
    }

    pub fn set_order(&mut self, order: Option<i64>) {
        with_attrs!(self, a => a.order = order)
    }

    pub fn as_session(&self) -> Option<&SessionAttrs> {
        match self {
            Attributes::Session(a) => Some(a),
            _ => None,
        }
    }

    /// Decode a camelCase JSON payload into the attribute set of `level`.
    pub fn from_json(level: Level, input: &Map<String, JsonValue>) -> Result<Self, ValidationErrors> {
        Ok(match level {
            Level::Board => Attributes::Board(decode(input)?),
            Level::Grade => Attributes::Grade(decode(input)?),
            Level::Subject => Attributes::Subject(decode(input)?),
            Level::Chapter => Attributes::Chapter(decode(input)?),
            Level::Session => Attributes::Session(decode(input)?),
        })
    }

    pub fn to_json(&self) -> Map<String, JsonValue> {
        let value = with_attrs!(self, a => serde_json::to_value(a));
        match value {
            Ok(JsonValue::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Overlay `patch` on the current values. Keys not named in the patch keep
    /// their value; `null` clears an optional field.
    pub fn apply_patch(&self, patch: &Map<String, JsonValue>) -> Result<Self, ValidationErrors> {
        let mut merged = self.to_json();
        for (k, v) in patch {
            if v.is_null() {
                merged.remove(k);
                // Required fields still see the null so the decoder reports them.
                if !is_optional_key(self.level(), k) {
                    merged.insert(k.clone(), JsonValue::Null);
                }
            } else {
                merged.insert(k.clone(), v.clone());
            }
        }
        Attributes::from_json(self.level(), &merged)
    }
}

fn is_optional_key(level: Level, key: &str) -> bool {
    let defaults = match level {
        Level::Board => serde_json::to_value(BoardAttrs::default()),
        Level::Grade => serde_json::to_value(GradeAttrs::default()),
        Level::Subject => serde_json::to_value(SubjectAttrs::default()),
        Level::Chapter => serde_json::to_value(ChapterAttrs::default()),
        Level::Session => serde_json::to_value(SessionAttrs::default()),
    };
    // Always-serialized keys are the non-optional ones.
    !matches!(defaults, Ok(JsonValue::Object(ref m)) if m.contains_key(key))
}

fn decode<T: DeserializeOwned>(input: &Map<String, JsonValue>) -> Result<T, ValidationErrors> {
    match serde_json::from_value::<T>(JsonValue::Object(input.clone())) {
        Ok(v) => Ok(v),
        Err(whole) => {
            // Decode key by key to name the offending fields.
            let mut errors = ValidationErrors::new();
            for (k, v) in input {
                let mut single = Map::new();
                single.insert(k.clone(), v.clone());
                if let Err(e) = serde_json::from_value::<T>(JsonValue::Object(single)) {
                    let reason = e.to_string();
                    if reason.starts_with("unknown field") {
                        errors.push(k, "unknown field");
                    } else {
                        errors.push(k, reason);
                    }
                }
            }
            if errors.is_empty() {
                errors.push("input", whole.to_string());
            }
            Err(errors)
        }
    }
}

/// One entry of the content tree. Values are immutable once built; edits
/// produce new nodes and share untouched children through `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    attributes: Attributes,
    children: Vec<Arc<Node>>,
    aggregates: Aggregates,
}

impl Node {
    pub(crate) fn new(id: NodeId, attributes: Attributes, children: Vec<Arc<Node>>) -> Self {
        let aggregates = aggregate::recompute(Some(attributes.level()), &children);
        Self {
            id,
            attributes,
            children,
            aggregates,
        }
    }

    pub(crate) fn with_children(&self, children: Vec<Arc<Node>>) -> Self {
        Node::new(self.id.clone(), self.attributes.clone(), children)
    }

    /// Children and aggregates carry over unchanged.
    pub(crate) fn with_attributes(&self, attributes: Attributes) -> Self {
        Self {
            id: self.id.clone(),
            attributes,
            children: self.children.clone(),
            aggregates: self.aggregates,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn level(&self) -> Level {
        self.attributes.level()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn display_name(&self) -> &str {
        self.attributes.display_name()
    }

    pub fn children(&self) -> &[Arc<Node>] {
        &self.children
    }

    pub fn aggregates(&self) -> &Aggregates {
        &self.aggregates
    }

    /// Own id followed by every descendant id, pre-order.
    pub fn subtree_ids(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        collect_ids(self, &mut out);
        out
    }
}

fn collect_ids(node: &Node, out: &mut Vec<NodeId>) {
    out.push(node.id.clone());
    for c in &node.children {
        collect_ids(c, out);
    }
}
