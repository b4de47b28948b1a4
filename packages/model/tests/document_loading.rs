//! # Document Loading
//!
//! Loads serialized documents against a registry and checks:
//! - Unknown type tags fail the load with the tag and its location
//! - A known document resolves paths the way the tree view shows them
//! - Writes through the accessor survive a save/load round trip

use anyhow::Result;
use nodegraph_model::{
    format, AccessError, DocumentError, FieldType, Node, Path, RootSet, TypeDecl,
    TypeShapeRegistry, Value,
};

fn registry() -> TypeShapeRegistry {
    TypeShapeRegistry::from_decls([
        TypeDecl::node("Constant").field("value", FieldType::Float),
        TypeDecl::node("Sum")
            .field("label", FieldType::Text)
            .multi_port("inputs"),
        TypeDecl::record("Holder").child("node"),
        TypeDecl::node("Output").field("source", FieldType::record("Holder")),
    ])
    .unwrap()
}

const TWO_ROOTS: &str = r#"{
    "roots": [
        { "$type": "Constant", "value": 1.0 },
        { "$type": "Sum", "label": "total", "inputs": [
            { "$type": "Constant", "value": 1.0 },
            { "$type": "Constant", "value": 2.0 },
            { "$type": "Constant", "value": 3.0 }
        ] }
    ]
}"#;

#[test]
fn test_unknown_type_fails_with_identifiable_error() {
    let json = r#"{"roots":[{"$type":"Output","source":{"$type":"Holder","node":{"$type":"Teleport"}}}]}"#;
    let err = format::from_json_str(json, &registry()).unwrap_err();

    match &err {
        DocumentError::UnresolvedTypes(issues) => {
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].tag.as_deref(), Some("Teleport"));
            assert_eq!(issues[0].path.to_string(), "[0].source.node");
        }
        other => panic!("expected unresolved types, got {other}"),
    }
    assert!(err.to_string().contains("Teleport"));
    println!("✓ {}", err);
}

#[test]
fn test_two_roots_three_children_scenario() -> Result<()> {
    let roots = format::from_json_str(TWO_ROOTS, &registry())?;

    let paths: Vec<String> = roots
        .collect_nodes(None)
        .into_iter()
        .map(|(path, _)| path.to_string())
        .collect();
    assert_eq!(
        paths,
        ["[0]", "[1]", "[1].inputs[0]", "[1].inputs[1]", "[1].inputs[2]"]
    );

    let view = roots.tree_view(None);
    assert!(view.starts_with("[0] Constant\n[1] Sum\n"));
    assert_eq!(view.matches("├─ ").count(), 2);
    assert_eq!(view.matches("└─ ").count(), 1);
    Ok(())
}

#[test]
fn test_set_value_survives_round_trip() -> Result<()> {
    let registry = registry();
    let mut roots = format::from_json_str(TWO_ROOTS, &registry)?;
    let path: Path = "[1].inputs[2].value".parse()?;

    roots.set_value(&path, 42.5)?;
    assert_eq!(roots.get_value::<f64>(&path)?, 42.5);

    let reloaded = format::from_json_str(&format::to_json_string(&roots)?, &registry)?;
    assert_eq!(reloaded.get_value::<f64>(&path)?, 42.5);
    assert_eq!(reloaded, roots);
    Ok(())
}

#[test]
fn test_addressing_errors_are_distinct() -> Result<()> {
    let mut roots = format::from_json_str(TWO_ROOTS, &registry())?;

    let missing = roots.get_value::<f64>(&"[0].weight".parse()?).unwrap_err();
    assert!(matches!(missing, AccessError::PathNotFound { ref type_tag, .. } if type_tag == "Constant"));

    let out_of_range = roots.get_value::<Node>(&"[1].inputs[3]".parse()?).unwrap_err();
    assert!(matches!(out_of_range, AccessError::IndexOutOfRange { index: 3, len: 3, .. }));

    let mismatch = roots
        .set_value(&"[1].label".parse()?, Value::Int(3))
        .unwrap_err();
    assert!(matches!(mismatch, AccessError::TypeMismatch { .. }));
    Ok(())
}

#[test]
fn test_empty_document() -> Result<()> {
    let roots = format::from_json_str(r#"{"roots":[]}"#, &registry())?;
    assert_eq!(roots, RootSet::new());
    assert_eq!(roots.tree_view(None), "");
    assert_eq!(format::to_json_string(&roots)?, r#"{"roots":[]}"#);
    Ok(())
}
