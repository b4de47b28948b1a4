//! Integration tests for the editor crate
//!
//! Drives a [`Document`] through the scenarios the engine promises:
//! - Metadata for two roots, the second with a three-input multi-port
//! - Insert at a collection index, commit, undo
//! - Undo/redo restoring serialized state for both recording modes
//! - One metadata entry per reachable node after structural edits
//! - Save/load through a temporary file

use anyhow::Result;
use nodegraph_editor::model::{
    format, AccessError, FieldType, Node, Path, RootSet, TypeDecl, TypeShapeRegistry, Value,
};
use nodegraph_editor::{AtomicOperation, Document, EditorError, HistoryError};
use std::collections::HashMap;
use std::rc::Rc;

fn registry() -> Rc<TypeShapeRegistry> {
    Rc::new(
        TypeShapeRegistry::from_decls([
            TypeDecl::node("Constant").field("value", FieldType::Float),
            TypeDecl::node("Sum")
                .field("label", FieldType::Text)
                .multi_port("inputs"),
            TypeDecl::node("Negate").child("input"),
            TypeDecl::record("Holder").child("node"),
            TypeDecl::node("Output").field("source", FieldType::record("Holder")),
        ])
        .unwrap(),
    )
}

const TWO_ROOTS: &str = r#"{"roots":[
    {"$type":"Constant","value":1.0},
    {"$type":"Sum","label":"total","inputs":[
        {"$type":"Constant","value":1.0},
        {"$type":"Constant","value":2.0},
        {"$type":"Constant","value":3.0}
    ]}
]}"#;

fn constant(value: f64) -> Node {
    Node::new("Constant").with("value", value)
}

fn path(s: &str) -> Path {
    s.parse().unwrap()
}

/// Every cached node appears once, and its parent lists it exactly once
fn assert_metadata_consistent(doc: &mut Document) {
    let live = doc.roots().node_count();
    let cache = doc.metadata();
    assert_eq!(cache.len(), live);

    let mut seen = HashMap::new();
    for (id, meta) in cache.iter() {
        assert!(seen.insert(meta.path.clone(), id).is_none(), "duplicate {}", meta.path);
        if let Some(parent) = meta.parent {
            let links = cache.children(parent).iter().filter(|&&c| c == id).count();
            assert_eq!(links, 1, "parent of {} links it {} times", meta.path, links);
        }
    }
    let report = doc.validate();
    assert!(report.is_consistent(), "{:?}", report.issues);
}

#[test]
fn test_two_roots_three_children() -> Result<()> {
    let mut doc = Document::from_json(TWO_ROOTS, registry())?;

    let paths: Vec<String> = doc
        .metadata()
        .all_node_paths()
        .iter()
        .map(|p| p.to_string())
        .collect();
    assert_eq!(
        paths,
        ["[0]", "[1]", "[1].inputs[0]", "[1].inputs[1]", "[1].inputs[2]"]
    );

    let expected = "\
[0] Constant
[1] Sum
├─ inputs[0]: Constant
├─ inputs[1]: Constant
└─ inputs[2]: Constant
";
    assert_eq!(doc.tree_view(None), expected);
    assert_eq!(doc.metadata().render_tree(None), expected);
    Ok(())
}

#[test]
fn test_insert_at_index_one_then_undo() -> Result<()> {
    let mut doc = Document::from_json(TWO_ROOTS, registry())?;
    let before = doc.to_json()?;
    let inputs = path("[1].inputs");

    doc.apply(AtomicOperation::insert(path("[1].inputs[1]"), constant(9.0)))?;
    assert!(doc.commit("insert"));
    assert_eq!(doc.get_value::<Vec<Value>>(&inputs)?.len(), 4);
    assert_eq!(doc.get_value::<f64>(&path("[1].inputs[1].value"))?, 9.0);
    assert_eq!(doc.history().undo_description(), Some("insert"));

    assert!(doc.undo()?);
    let values: Vec<f64> = (0..3)
        .map(|i| doc.get_value::<f64>(&inputs.child_index(i).child_member("value")))
        .collect::<Result<_, _>>()?;
    assert_eq!(values, vec![1.0, 2.0, 3.0]);
    assert_eq!(doc.get_value::<Vec<Value>>(&inputs)?.len(), 3);
    assert_eq!(doc.to_json()?, before);
    Ok(())
}

#[test]
fn test_operation_steps_restore_serialized_state() -> Result<()> {
    let mut doc = Document::from_json(TWO_ROOTS, registry())?;
    let before = doc.to_json()?;

    doc.apply(AtomicOperation::set(path("[1].label"), "renamed"))?;
    doc.apply(AtomicOperation::remove(path("[1].inputs[0]")))?;
    doc.apply(AtomicOperation::replace(
        Path::index(0),
        Node::new("Negate").with("input", constant(5.0)),
    ))?;
    doc.commit("rework");
    let after = doc.to_json()?;

    doc.undo()?;
    assert_eq!(doc.to_json()?, before);
    doc.redo()?;
    assert_eq!(doc.to_json()?, after);
    assert_metadata_consistent(&mut doc);
    Ok(())
}

#[test]
fn test_snapshot_steps_restore_serialized_state() -> Result<()> {
    let mut doc = Document::from_json(TWO_ROOTS, registry())?;
    let before = doc.to_json()?;

    doc.begin_snapshot_edit()?;
    {
        let roots = doc.edit_roots()?;
        roots.nodes_mut().reverse();
        roots.push(
            Node::new("Output").with("source", Value::Null),
        );
    }
    doc.commit("shuffle");
    let after = doc.to_json()?;

    doc.undo()?;
    assert_eq!(doc.to_json()?, before);
    doc.redo()?;
    assert_eq!(doc.to_json()?, after);
    assert_metadata_consistent(&mut doc);
    Ok(())
}

#[test]
fn test_mixed_steps_undo_in_order() -> Result<()> {
    let mut doc = Document::from_json(TWO_ROOTS, registry())?;
    let mut states = vec![doc.to_json()?];

    doc.apply(AtomicOperation::set(path("[0].value"), 10.0))?;
    doc.commit("ops 1");
    states.push(doc.to_json()?);

    doc.begin_snapshot_edit()?;
    doc.edit_roots()?.remove_at(&path("[1].inputs[2]"))?;
    doc.commit("snapshot");
    states.push(doc.to_json()?);

    doc.apply(AtomicOperation::insert(Path::index(2), constant(7.0)))?;
    doc.commit("ops 2");
    states.push(doc.to_json()?);

    for expected in states.iter().rev().skip(1) {
        assert!(doc.undo()?);
        assert_eq!(&doc.to_json()?, expected);
    }
    assert!(!doc.undo()?);

    for expected in states.iter().skip(1) {
        assert!(doc.redo()?);
        assert_eq!(&doc.to_json()?, expected);
    }
    Ok(())
}

#[test]
fn test_metadata_after_structural_mutations() -> Result<()> {
    let mut doc = Document::from_json(TWO_ROOTS, registry())?;
    assert_metadata_consistent(&mut doc);

    doc.apply(AtomicOperation::insert(
        path("[1].inputs[0]"),
        Node::new("Negate").with("input", constant(4.0)),
    ))?;
    doc.apply(AtomicOperation::insert(
        Path::index(0),
        Node::new("Output").with(
            "source",
            nodegraph_editor::model::Record::new("Holder").with("node", constant(2.0)),
        ),
    ))?;
    doc.apply(AtomicOperation::remove(path("[2].inputs[3]")))?;
    doc.commit("restructure");
    assert_metadata_consistent(&mut doc);

    let meta = doc.metadata().by_path(&path("[0].source.node")).unwrap();
    assert_eq!(meta.port_name.as_deref(), Some("source.node"));
    assert_eq!(meta.depth, 1);

    doc.undo()?;
    assert_metadata_consistent(&mut doc);
    Ok(())
}

#[test]
fn test_refresh_without_changes_does_not_rebuild() -> Result<()> {
    let mut doc = Document::from_json(TWO_ROOTS, registry())?;
    let first = doc.metadata().rebuild_count();
    let second = doc.metadata().rebuild_count();
    assert_eq!(first, 1);
    assert_eq!(second, 1);

    doc.apply(AtomicOperation::insert(Path::index(2), constant(0.0)))?;
    doc.commit("append");
    assert_eq!(doc.metadata().rebuild_count(), 2);
    Ok(())
}

#[test]
fn test_unknown_type_in_document() {
    let json = r#"{"roots":[{"$type":"Sum","inputs":[{"$type":"Wormhole"}]}]}"#;
    let err = Document::from_json(json, registry()).unwrap_err();
    assert!(matches!(err, EditorError::Document(_)));
    assert!(err.to_string().contains("Wormhole"));
    assert!(err.to_string().contains("[0].inputs[0]"));
}

#[test]
fn test_failed_operation_records_nothing() -> Result<()> {
    let mut doc = Document::from_json(TWO_ROOTS, registry())?;
    let err = doc
        .apply(AtomicOperation::set(path("[1].label"), 3.0))
        .unwrap_err();
    assert!(matches!(err, EditorError::History(HistoryError::Operation(_))));
    assert_eq!(doc.version, 0);
    assert!(!doc.commit("nothing"));
    Ok(())
}

#[test]
fn test_writes_off_declaration_are_refused() -> Result<()> {
    let mut doc = Document::from_json(TWO_ROOTS, registry())?;
    let refused = |err: EditorError| match err {
        EditorError::History(HistoryError::Operation(access)) => access,
        other => panic!("unexpected error: {}", other),
    };

    let value = path("[1].inputs[0].value");
    let err = refused(doc.apply(AtomicOperation::set(value.clone(), Value::Null)).unwrap_err());
    assert!(matches!(err, AccessError::TypeMismatch { .. }));
    let err = refused(doc.apply(AtomicOperation::set(value, "high")).unwrap_err());
    assert!(matches!(err, AccessError::TypeMismatch { .. }));

    let slot = path("[1].inputs[1]");
    let err = refused(doc.apply(AtomicOperation::insert(slot.clone(), 5i64)).unwrap_err());
    assert!(matches!(err, AccessError::TypeMismatch { .. }));
    let err = refused(doc.apply(AtomicOperation::insert(slot.clone(), Node::new("Ghost"))).unwrap_err());
    assert!(matches!(err, AccessError::Undeclared { .. }));
    let nested = Node::new("Negate").with("input", Node::new("Ghost"));
    let err = refused(doc.apply(AtomicOperation::insert(slot.clone(), nested)).unwrap_err());
    assert!(matches!(err, AccessError::Undeclared { .. }));

    assert_eq!(doc.version, 0);
    doc.apply(AtomicOperation::insert(slot, constant(9.0)))?;
    doc.apply(AtomicOperation::set(path("[1].inputs[0]"), Value::Null))?;
    doc.commit("declared edits");

    let reloaded = Document::from_json(&doc.to_json()?, registry())?;
    assert_eq!(reloaded.roots(), doc.roots());
    Ok(())
}

#[test]
fn test_save_and_reload() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("graph.json");
    std::fs::write(&file, TWO_ROOTS)?;

    let mut doc = Document::load(&file, registry())?;
    doc.apply(AtomicOperation::set(path("[1].inputs[2].value"), 30.0))?;
    doc.commit("edit");
    assert!(doc.is_dirty());
    doc.save()?;
    assert!(!doc.is_dirty());

    let reloaded = Document::load(&file, registry())?;
    assert_eq!(reloaded.get_value::<f64>(&path("[1].inputs[2].value"))?, 30.0);
    assert_eq!(reloaded.roots(), doc.roots());

    let roots: RootSet = format::from_json_str(&std::fs::read_to_string(&file)?, &registry())?;
    assert_eq!(&roots, doc.roots());
    Ok(())
}
