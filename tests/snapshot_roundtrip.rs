use coursetree::{
    export_tree, load_tree, EditError, IdGenerator, IdStrategy, Level, NodeId, Settings, TreeEditor, TreeRecord,
};
use serde_json::json;

fn record(v: serde_json::Value) -> TreeRecord {
    serde_json::from_value(v).expect("tree record")
}

fn catalogue() -> TreeRecord {
    record(json!({
        "id": "root",
        "boards": [{
            "id": "b1",
            "name": "CBSE",
            "icon": "book-open",
            "children": [{
                "id": "g1",
                "name": "Class 10",
                "children": [{
                    "id": "s1",
                    "name": "Mathematics",
                    "price": 499.0,
                    "children": [{
                        "id": "c1",
                        "title": "Real Numbers",
                        "plannedSessions": 10,
                        "published": true,
                        "children": [
                            { "id": "ss1", "title": "Intro", "date": "2025-10-15", "time": "10:00",
                              "durationMinutes": 60, "status": "completed" },
                            { "id": "ss2", "title": "Euclid", "date": "2025-10-22",
                              "durationMinutes": 45 }
                        ]
                    }]
                }]
            }]
        }]
    }))
}

#[test]
fn export_then_load_reproduces_the_tree() {
    let mut ids = IdGenerator::new(IdStrategy::Counter);
    let tree = load_tree(&catalogue(), &mut ids).expect("load");
    assert_eq!(tree.len(), 6);
    assert_eq!(tree.aggregates().total_child_count, 2);
    assert_eq!(tree.aggregates().completed_child_count, 1);
    assert_eq!(tree.aggregates().total_duration_minutes, 105);

    let exported = export_tree(&tree);
    let text = serde_json::to_string(&exported).expect("serialize");
    let reparsed: TreeRecord = serde_json::from_str(&text).expect("deserialize");

    let mut again = IdGenerator::new(IdStrategy::Counter);
    let reloaded = load_tree(&reparsed, &mut again).expect("reload");
    assert_eq!(reloaded, tree);
    assert_eq!(export_tree(&reloaded), exported);
}

#[test]
fn export_carries_levels_and_aggregates() {
    let mut ids = IdGenerator::new(IdStrategy::Counter);
    let tree = load_tree(&catalogue(), &mut ids).expect("load");
    let value = serde_json::to_value(export_tree(&tree)).expect("json");

    let chapter = &value["boards"][0]["children"][0]["children"][0]["children"][0];
    assert_eq!(chapter["id"], "c1");
    assert_eq!(chapter["level"], "chapter");
    assert_eq!(chapter["plannedSessions"], 10);
    assert_eq!(chapter["aggregates"]["childCount"], 2);
    assert_eq!(chapter["aggregates"]["completedChildCount"], 1);
    assert_eq!(chapter["children"][1]["status"], "upcoming");
    assert!(chapter["children"][1].get("children").is_none());
}

#[test]
fn stale_aggregates_in_a_record_are_recomputed() {
    let mut r = catalogue();
    r.boards[0].aggregates = Some(coursetree::Aggregates {
        child_count: 42,
        completed_child_count: 42,
        total_child_count: 42,
        total_duration_minutes: 42,
    });
    let mut ids = IdGenerator::new(IdStrategy::Counter);
    let tree = load_tree(&r, &mut ids).expect("load");
    let board = tree.get(&[NodeId::from("b1")]).expect("b1");
    assert_eq!(board.aggregates().child_count, 1);
    assert_eq!(board.aggregates().total_child_count, 2);
}

#[test]
fn duplicate_ids_are_rejected_with_location() {
    let r = record(json!({
        "boards": [
            { "id": "b1", "name": "CBSE" },
            { "id": "b1", "name": "ICSE" }
        ]
    }));
    let mut ids = IdGenerator::new(IdStrategy::Counter);
    let err = load_tree(&r, &mut ids).expect_err("duplicate id");
    let EditError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert!(errors.has_field("boards[1].id"));
}

#[test]
fn declared_level_must_match_depth() {
    let r = record(json!({
        "boards": [{ "name": "CBSE", "children": [{ "level": "subject", "name": "Maths" }] }]
    }));
    let mut ids = IdGenerator::new(IdStrategy::Counter);
    let err = load_tree(&r, &mut ids).expect_err("wrong level");
    let EditError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert!(errors.has_field("boards[0].children[0].level"));
}

#[test]
fn loaded_editor_continues_counters_past_snapshot_ids() {
    let mut editor = TreeEditor::with_system_clock(Settings::default());
    editor.load(&catalogue()).expect("load");
    let inserted = editor
        .insert(
            &[NodeId::from("b1"), NodeId::from("g1"), NodeId::from("s1"), NodeId::from("c1")],
            json!({ "title": "Lemma" }).as_object().expect("object"),
        )
        .expect("insert");
    assert_eq!(inserted.id.as_str(), "ss3");

    let chapter = editor
        .node(&[NodeId::from("b1"), NodeId::from("g1"), NodeId::from("s1"), NodeId::from("c1")])
        .expect("chapter");
    assert_eq!(chapter.level(), Level::Chapter);
    assert_eq!(chapter.children().len(), 3);
}

#[test]
fn failed_load_keeps_the_current_tree() {
    let mut editor = TreeEditor::with_system_clock(Settings::default());
    editor.load(&catalogue()).expect("load");
    let before = editor.tree().clone();

    let bad = record(json!({ "boards": [{ "name": "   " }] }));
    assert!(editor.load(&bad).is_err());
    assert!(editor.tree().ptr_eq(&before));
}

#[test]
fn loading_restarts_id_counters() {
    let mut editor = TreeEditor::with_system_clock(Settings::default());
    for name in ["CBSE", "ICSE", "IB"] {
        editor
            .insert(&[], json!({ "name": name }).as_object().expect("object"))
            .expect("insert");
    }
    editor.load(&record(json!({ "boards": [] }))).expect("load empty");
    let inserted = editor
        .insert(&[], json!({ "name": "NIOS" }).as_object().expect("object"))
        .expect("insert");
    assert_eq!(inserted.id.as_str(), "b1");
}
