use chrono::NaiveDateTime;
use log::{debug, warn};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::{EditError, ValidationErrors, ValidationWarning};
use crate::ident::IdGenerator;
use crate::model::{child_level_of, Attributes, Level, Node, NodeId, SessionStatus};
use crate::selection::SelectionState;
use crate::settings::Settings;
use crate::snapshot::{self, TreeRecord};
use crate::tree::TreeHandle;
use crate::validate;

#[derive(Debug, Clone)]
pub struct Inserted {
    pub tree: TreeHandle,
    pub id: NodeId,
    pub warnings: Vec<ValidationWarning>,
}

#[derive(Debug, Clone)]
pub struct Updated {
    pub tree: TreeHandle,
    pub warnings: Vec<ValidationWarning>,
}

#[derive(Debug, Clone)]
pub struct Removed {
    pub tree: TreeHandle,
    /// The removed node first, then its descendants in pre-order.
    pub removed_ids: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TitleMode {
    #[default]
    Same,
    AppendCopy,
}

impl TitleMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "same" => Some(TitleMode::Same),
            "appendcopy" => Some(TitleMode::AppendCopy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateOptions {
    pub title_mode: TitleMode,
    /// Days added to every session date in the copy.
    pub day_offset: i64,
}

fn describe(level: Option<Level>) -> String {
    match level {
        None => "the tree root".to_string(),
        Some(l) => format!("a {}", l),
    }
}

/// Walk `path` from `children` down, rebuilding each node on the way with the
/// list returned by `edit` at the bottom. Nodes off the path are reused.
fn rebuild<F>(
    children: &[Arc<Node>],
    parent: Option<Level>,
    path: &[NodeId],
    walked: usize,
    full: &[NodeId],
    edit: F,
) -> Result<Vec<Arc<Node>>, EditError>
where
    F: FnOnce(Option<Level>, &[Arc<Node>]) -> Result<Vec<Arc<Node>>, EditError>,
{
    let Some((head, rest)) = path.split_first() else {
        return edit(parent, children);
    };
    let Some(idx) = children.iter().position(|c| c.id() == head) else {
        return Err(EditError::not_found(&full[..=walked], head));
    };
    let node = &children[idx];
    let grandchildren = rebuild(node.children(), Some(node.level()), rest, walked + 1, full, edit)?;
    let mut out = children.to_vec();
    out[idx] = Arc::new(node.with_children(grandchildren));
    Ok(out)
}

fn edit_at<F>(tree: &TreeHandle, path: &[NodeId], edit: F) -> Result<Vec<Arc<Node>>, EditError>
where
    F: FnOnce(Option<Level>, &[Arc<Node>]) -> Result<Vec<Arc<Node>>, EditError>,
{
    rebuild(tree.boards(), None, path, 0, path, edit)
}

/// Stable sort by explicit `order`; entries without one keep their place
/// after all ordered entries.
fn sort_by_order(children: &mut [Arc<Node>]) {
    if children.iter().any(|c| c.attributes().order().is_some()) {
        children.sort_by_key(|c| match c.attributes().order() {
            Some(o) => (0, o),
            None => (1, 0),
        });
    }
}

/// After an explicit repositioning, rewrite `order` to match positions when the
/// siblings use explicit ordering at all.
fn renumber_orders(children: &mut [Arc<Node>]) {
    if !children.iter().any(|c| c.attributes().order().is_some()) {
        return;
    }
    for (i, slot) in children.iter_mut().enumerate() {
        let want = Some(i as i64);
        if slot.attributes().order() != want {
            let mut attributes = slot.attributes().clone();
            attributes.set_order(want);
            *slot = Arc::new(slot.with_attributes(attributes));
        }
    }
}

/// Copies take fresh ids. Shifted sessions are reclassified against `now`
/// unless cancelled.
fn copy_subtree(
    source: &Node,
    mut attributes: Attributes,
    ids: &mut IdGenerator,
    day_offset: i64,
    now: NaiveDateTime,
) -> Node {
    if let Attributes::Session(s) = &mut attributes {
        s.date = validate::shift_iso_date(s.date.take(), day_offset);
        if s.status != SessionStatus::Cancelled && validate::session_schedule(s).is_some() {
            s.status = validate::classify_session(s, now);
        }
    }
    let id = ids.new_id(source.level());
    let children = source
        .children()
        .iter()
        .map(|c| Arc::new(copy_subtree(c, c.attributes().clone(), ids, day_offset, now)))
        .collect();
    Node::new(id, attributes, children)
}

fn refresh_children(
    children: &[Arc<Node>],
    now: NaiveDateTime,
    changed: &mut usize,
) -> Option<Vec<Arc<Node>>> {
    let mut out: Option<Vec<Arc<Node>>> = None;
    for (i, c) in children.iter().enumerate() {
        let replacement = match c.attributes() {
            Attributes::Session(s) => {
                if s.status == SessionStatus::Cancelled || validate::session_schedule(s).is_none() {
                    None
                } else {
                    let next = validate::classify_session(s, now);
                    if next == s.status {
                        None
                    } else {
                        *changed += 1;
                        let mut a = s.clone();
                        a.status = next;
                        Some(Arc::new(c.with_attributes(Attributes::Session(a))))
                    }
                }
            }
            _ => refresh_children(c.children(), now, changed).map(|kids| Arc::new(c.with_children(kids))),
        };
        if let Some(r) = replacement {
            let list = out.get_or_insert_with(|| children.to_vec());
            list[i] = r;
        }
    }
    out
}

fn log_warnings(op: &str, id: &NodeId, warnings: &[ValidationWarning]) {
    for w in warnings {
        warn!("{} {}: {} {}", op, id, w.field, w.reason);
    }
}

/// Owns the current tree value and the selection for one editing session.
///
/// Each mutation either fully succeeds, replacing the current tree and
/// reconciling the selection, or returns an error and changes nothing.
/// Handles returned earlier stay valid and unchanged.
#[derive(Debug)]
pub struct TreeEditor {
    tree: TreeHandle,
    selection: SelectionState,
    ids: IdGenerator,
    clock: Box<dyn Clock>,
    settings: Settings,
}

impl TreeEditor {
    pub fn new(settings: Settings, clock: Box<dyn Clock>) -> Self {
        Self {
            tree: TreeHandle::empty(),
            selection: SelectionState::new(),
            ids: IdGenerator::new(settings.id_strategy),
            clock,
            settings,
        }
    }

    pub fn with_system_clock(settings: Settings) -> Self {
        TreeEditor::new(settings, Box::new(SystemClock))
    }

    /// Replace the current tree with one built from `record`. Selection and
    /// id counters start over.
    pub fn load(&mut self, record: &TreeRecord) -> Result<TreeHandle, EditError> {
        let mut ids = self.ids.clone();
        ids.reset();
        let tree = snapshot::load_tree(record, &mut ids)?;
        self.ids = ids;
        self.tree = tree.clone();
        self.selection = SelectionState::new();
        debug!("loaded tree {} with {} nodes", tree.root_id(), tree.len());
        Ok(tree)
    }

    pub fn export(&self) -> TreeRecord {
        snapshot::export_tree(&self.tree)
    }

    pub fn tree(&self) -> &TreeHandle {
        &self.tree
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.ids.set_strategy(settings.id_strategy);
        self.settings = settings;
    }

    pub fn node(&self, path: &[NodeId]) -> Result<Arc<Node>, EditError> {
        let path = self.tree.strip_root(path);
        let Some((target, parent)) = path.split_last() else {
            return Err(EditError::invalid("the tree root is not a content node"));
        };
        let (_, siblings) = self.tree.children_at(parent)?;
        siblings
            .iter()
            .find(|n| n.id() == target)
            .cloned()
            .ok_or_else(|| EditError::not_found(path, target))
    }

    pub fn path_of(&self, id: &NodeId) -> Option<Vec<NodeId>> {
        self.tree.find_path(id)
    }

    fn commit(&mut self, boards: Vec<Arc<Node>>) -> TreeHandle {
        let tree = TreeHandle::from_parts(self.tree.root_id().clone(), boards);
        debug_assert!(tree.inconsistencies().is_empty(), "aggregates out of sync");
        self.tree = tree.clone();
        let dropped = self.selection.reconcile(&self.tree);
        if dropped > 0 {
            debug!("selection dropped {} stale entries", dropped);
        }
        tree
    }

    /// Insert a node decoded from a JSON payload under `parent_path`. The level
    /// is the one below the parent.
    pub fn insert(&mut self, parent_path: &[NodeId], input: &Map<String, JsonValue>) -> Result<Inserted, EditError> {
        let path = self.tree.strip_root(parent_path).to_vec();
        let (parent_level, _) = self.tree.children_at(&path)?;
        let level = child_level_of(parent_level)
            .ok_or_else(|| EditError::invalid("sessions cannot have children"))?;
        let mut attributes = Attributes::from_json(level, input)?;
        if let Attributes::Session(s) = &mut attributes {
            if input.get("durationMinutes").map_or(true, |v| v.is_null()) {
                s.duration_minutes = Some(self.settings.default_session_duration_minutes);
            }
            if !input.contains_key("status") {
                s.status = validate::classify_session(s, self.clock.now());
            }
        }
        self.insert_attributes(&path, attributes)
    }

    pub fn insert_attributes(&mut self, parent_path: &[NodeId], mut attributes: Attributes) -> Result<Inserted, EditError> {
        let path = self.tree.strip_root(parent_path).to_vec();
        let (parent_level, siblings) = self.tree.children_at(&path)?;
        let Some(level) = child_level_of(parent_level) else {
            return Err(EditError::invalid("sessions cannot have children"));
        };
        if attributes.level() != level {
            return Err(EditError::invalid(format!(
                "a {} cannot be placed under {}",
                attributes.level(),
                describe(parent_level)
            )));
        }
        validate::normalize(&mut attributes);
        let warnings = validate::validate(&attributes, siblings, None, &self.settings)?;

        let id = self.ids.new_id(level);
        let node = Arc::new(Node::new(id.clone(), attributes, Vec::new()));
        let boards = edit_at(&self.tree, &path, move |_, children| {
            let mut out = children.to_vec();
            out.push(node);
            sort_by_order(&mut out);
            Ok(out)
        })?;
        let tree = self.commit(boards);
        debug!("inserted {} {} under {}", level, id, path.last().map_or("root", |p| p.as_str()));
        log_warnings("insert", &id, &warnings);
        Ok(Inserted { tree, id, warnings })
    }

    /// Apply `patch` to the attributes of the node at `node_path`.
    pub fn update(&mut self, node_path: &[NodeId], patch: &Map<String, JsonValue>) -> Result<Updated, EditError> {
        let path = self.tree.strip_root(node_path).to_vec();
        let Some((target, parent)) = path.split_last() else {
            return Err(EditError::invalid("the tree root cannot be updated"));
        };
        let (_, siblings) = self.tree.children_at(parent)?;
        let Some(node) = siblings.iter().find(|n| n.id() == target) else {
            return Err(EditError::not_found(&path, target));
        };
        let mut attributes = node.attributes().apply_patch(patch)?;
        validate::normalize(&mut attributes);
        let warnings = validate::validate(&attributes, siblings, Some(target), &self.settings)?;
        if attributes == *node.attributes() {
            return Ok(Updated {
                tree: self.tree.clone(),
                warnings,
            });
        }

        let reorder = attributes.order() != node.attributes().order();
        let replacement = Arc::new(node.with_attributes(attributes));
        let boards = edit_at(&self.tree, parent, |_, children| {
            let mut out = children.to_vec();
            if let Some(slot) = out.iter_mut().find(|c| c.id() == target) {
                *slot = replacement;
            }
            if reorder {
                sort_by_order(&mut out);
            }
            Ok(out)
        })?;
        let tree = self.commit(boards);
        debug!("updated {} ({} fields)", target, patch.len());
        log_warnings("update", target, &warnings);
        Ok(Updated { tree, warnings })
    }

    /// Remove the node at `node_path` together with its whole subtree.
    pub fn remove(&mut self, node_path: &[NodeId]) -> Result<Removed, EditError> {
        let path = self.tree.strip_root(node_path).to_vec();
        let Some((target, parent)) = path.split_last() else {
            return Err(EditError::invalid("the tree root cannot be removed"));
        };
        let (_, siblings) = self.tree.children_at(parent)?;
        let Some(node) = siblings.iter().find(|n| n.id() == target) else {
            return Err(EditError::not_found(&path, target));
        };
        let removed_ids = node.subtree_ids();
        let boards = edit_at(&self.tree, parent, |_, children| {
            Ok(children.iter().filter(|c| c.id() != target).cloned().collect())
        })?;
        let tree = self.commit(boards);
        debug!("removed {} and {} descendants", target, removed_ids.len() - 1);
        Ok(Removed { tree, removed_ids })
    }

    /// Move the node at `node_path` to position `new_index` among the children
    /// of `new_parent_path`. The new parent must sit one level above the node.
    pub fn move_node(
        &mut self,
        node_path: &[NodeId],
        new_parent_path: &[NodeId],
        new_index: usize,
    ) -> Result<Updated, EditError> {
        let path = self.tree.strip_root(node_path).to_vec();
        let dest = self.tree.strip_root(new_parent_path).to_vec();
        let Some((target, parent)) = path.split_last() else {
            return Err(EditError::invalid("the tree root cannot be moved"));
        };
        let (_, siblings) = self.tree.children_at(parent)?;
        let Some(node) = siblings.iter().find(|n| n.id() == target).cloned() else {
            return Err(EditError::not_found(&path, target));
        };
        let (dest_level, dest_children) = self.tree.children_at(&dest)?;
        if child_level_of(dest_level) != Some(node.level()) {
            return Err(EditError::invalid(format!(
                "a {} cannot be moved under {}",
                node.level(),
                describe(dest_level)
            )));
        }

        let same_parent = parent == dest.as_slice();
        let mut warnings = Vec::new();
        let boards = if same_parent {
            edit_at(&self.tree, parent, |_, children| {
                let mut out = children.to_vec();
                let Some(from) = out.iter().position(|c| c.id() == target) else {
                    return Err(EditError::not_found(&path, target));
                };
                let moved = out.remove(from);
                let at = new_index.min(out.len());
                out.insert(at, moved);
                renumber_orders(&mut out);
                Ok(out)
            })?
        } else {
            warnings = validate::validate(node.attributes(), dest_children, Some(target), &self.settings)?;
            let detached = edit_at(&self.tree, parent, |_, children| {
                Ok(children.iter().filter(|c| c.id() != target).cloned().collect())
            })?;
            rebuild(&detached, None, &dest, 0, &dest, move |_, children| {
                let mut out = children.to_vec();
                out.insert(new_index.min(out.len()), node);
                renumber_orders(&mut out);
                Ok(out)
            })?
        };
        let tree = self.commit(boards);
        debug!(
            "moved {} to index {} under {}",
            target,
            new_index,
            dest.last().map_or("root", |p| p.as_str())
        );
        log_warnings("move", target, &warnings);
        Ok(Updated { tree, warnings })
    }

    /// Put the listed children of `parent_path` first, in the given order,
    /// followed by the remaining children in their current order.
    pub fn reorder(&mut self, parent_path: &[NodeId], ordered_ids: &[NodeId]) -> Result<Updated, EditError> {
        let path = self.tree.strip_root(parent_path).to_vec();
        let (_, children) = self.tree.children_at(&path)?;
        let mut provided: Vec<NodeId> = Vec::new();
        let mut seen = HashSet::new();
        for id in ordered_ids {
            if seen.insert(id.clone()) {
                provided.push(id.clone());
            }
        }
        let mut errors = ValidationErrors::new();
        for id in &provided {
            if !children.iter().any(|c| c.id() == id) {
                errors.push("ids", format!("id not found among children: {}", id));
            }
        }
        errors.into_result()?;

        let boards = edit_at(&self.tree, &path, |_, children| {
            let mut out: Vec<Arc<Node>> = provided
                .iter()
                .filter_map(|id| children.iter().find(|c| c.id() == id).cloned())
                .collect();
            out.extend(children.iter().filter(|c| !seen.contains(c.id())).cloned());
            renumber_orders(&mut out);
            Ok(out)
        })?;
        let tree = self.commit(boards);
        debug!("reordered children of {}", path.last().map_or("root", |p| p.as_str()));
        Ok(Updated {
            tree,
            warnings: Vec::new(),
        })
    }

    /// Deep-copy the node at `node_path` with fresh ids and insert the copy
    /// right after the original.
    pub fn duplicate(&mut self, node_path: &[NodeId], options: DuplicateOptions) -> Result<Inserted, EditError> {
        let path = self.tree.strip_root(node_path).to_vec();
        let Some((target, parent)) = path.split_last() else {
            return Err(EditError::invalid("the tree root cannot be duplicated"));
        };
        let (_, siblings) = self.tree.children_at(parent)?;
        let Some(source) = siblings.iter().find(|n| n.id() == target).cloned() else {
            return Err(EditError::not_found(&path, target));
        };
        let mut top = source.attributes().clone();
        if options.title_mode == TitleMode::AppendCopy {
            let name = format!("{} (Copy)", top.display_name());
            top.set_display_name(name);
        }
        let warnings = validate::validate(&top, siblings, None, &self.settings)?;

        let now = self.clock.now();
        let copy = Arc::new(copy_subtree(&source, top, &mut self.ids, options.day_offset, now));
        let id = copy.id().clone();
        let boards = edit_at(&self.tree, parent, move |_, children| {
            let mut out = children.to_vec();
            let at = out
                .iter()
                .position(|c| c.id() == target)
                .map_or(out.len(), |i| i + 1);
            out.insert(at, copy);
            sort_by_order(&mut out);
            Ok(out)
        })?;
        let tree = self.commit(boards);
        debug!("duplicated {} as {}", target, id);
        log_warnings("duplicate", &id, &warnings);
        Ok(Inserted { tree, id, warnings })
    }

    /// Reclassify scheduled, non-cancelled sessions against the clock. Returns
    /// the tree and how many sessions changed status.
    pub fn refresh_session_statuses(&mut self) -> (TreeHandle, usize) {
        let now = self.clock.now();
        let mut changed = 0;
        match refresh_children(self.tree.boards(), now, &mut changed) {
            Some(boards) => {
                let tree = self.commit(boards);
                debug!("refreshed {} session statuses", changed);
                (tree, changed)
            }
            None => (self.tree.clone(), 0),
        }
    }

    /// Expand a live node. Unknown ids are ignored.
    pub fn expand(&mut self, id: &NodeId) -> bool {
        if !self.tree.contains(id) {
            return false;
        }
        self.selection.expand(id.clone());
        true
    }

    pub fn collapse(&mut self, id: &NodeId) -> bool {
        self.selection.collapse(id)
    }

    /// Whether the node is expanded afterwards. Unknown ids stay collapsed.
    pub fn toggle(&mut self, id: &NodeId) -> bool {
        if !self.tree.contains(id) {
            return false;
        }
        self.selection.toggle(id.clone())
    }

    /// Focus `path`, keeping only its longest prefix that exists in the tree.
    pub fn set_focus(&mut self, path: Vec<NodeId>) -> &[NodeId] {
        self.selection.set_focus(path);
        self.selection.reconcile(&self.tree);
        self.selection.focused_path()
    }
}
