use coursetree::{NodeId, SelectionState, Settings, TreeEditor, TreeRecord};
use serde_json::json;

fn ids(raw: &[&str]) -> Vec<NodeId> {
    raw.iter().map(|s| NodeId::from(*s)).collect()
}

fn editor() -> TreeEditor {
    let record: TreeRecord = serde_json::from_value(json!({
        "boards": [
            { "id": "b1", "name": "CBSE", "children": [
                { "id": "g1", "name": "Class 9" },
                { "id": "g2", "name": "Class 10", "children": [
                    { "id": "s1", "name": "Science" }
                ]}
            ]},
            { "id": "b2", "name": "ICSE" }
        ]
    }))
    .expect("record");
    let mut editor = TreeEditor::with_system_clock(Settings::default());
    editor.load(&record).expect("load");
    editor
}

#[test]
fn reconcile_drops_stale_ids_and_truncates_focus() {
    let editor = editor();
    let mut selection = SelectionState::new();
    selection.expand(NodeId::from("b1"));
    selection.expand(NodeId::from("ghost"));
    selection.set_focus(ids(&["root", "b1", "g2", "missing", "s1"]));

    let dropped = selection.reconcile(editor.tree());
    assert_eq!(dropped, 3);
    assert!(selection.is_expanded(&NodeId::from("b1")));
    assert!(!selection.is_expanded(&NodeId::from("ghost")));
    assert_eq!(selection.focused_path(), ids(&["b1", "g2"]).as_slice());
    assert_eq!(selection.focused(), Some(&NodeId::from("g2")));

    // A path whose second step is not a child of the first is cut there.
    selection.set_focus(ids(&["b2", "g1"]));
    selection.reconcile(editor.tree());
    assert_eq!(selection.focused_path(), ids(&["b2"]).as_slice());
}

#[test]
fn editor_ignores_unknown_ids() {
    let mut editor = editor();
    assert!(!editor.expand(&NodeId::from("nope")));
    assert!(!editor.toggle(&NodeId::from("nope")));
    assert!(editor.selection().expanded_ids().is_empty());

    assert!(editor.toggle(&NodeId::from("g2")));
    assert!(editor.selection().is_expanded(&NodeId::from("g2")));
    assert!(!editor.toggle(&NodeId::from("g2")));
    assert!(!editor.collapse(&NodeId::from("g2")));
}

#[test]
fn removing_a_focused_branch_moves_focus_to_the_parent() {
    let mut editor = editor();
    editor.expand(&NodeId::from("g2"));
    let focused = editor.set_focus(ids(&["b1", "g2", "s1"])).to_vec();
    assert_eq!(focused, ids(&["b1", "g2", "s1"]));

    editor.remove(&ids(&["b1", "g2"])).expect("remove");
    assert!(editor.selection().expanded_ids().is_empty());
    assert_eq!(editor.selection().focused_path(), ids(&["b1"]).as_slice());
}

#[test]
fn loading_a_new_tree_resets_selection() {
    let mut editor = editor();
    editor.expand(&NodeId::from("b1"));
    editor.set_focus(ids(&["b1"]));
    let record = editor.export();
    editor.load(&record).expect("reload");
    assert_eq!(editor.selection(), &SelectionState::new());
}

#[test]
fn focus_paths_are_stored_without_the_root() {
    let mut editor = editor();
    let focused = editor.set_focus(ids(&["root", "b1", "g2"])).to_vec();
    assert_eq!(focused, ids(&["b1", "g2"]));
    assert_eq!(editor.selection().focused(), Some(&NodeId::from("g2")));
}
