//! Integration tests for snapshot extraction and diffing over the
//! testdata fixtures.

use std::path::PathBuf;

use pydrift::diff::{ComplexityTrend, StructuralDiff};
use pydrift::{summarize, StructuralSnapshot, MODULE_DOC_KEY};

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name);
    std::fs::read_to_string(path).expect("fixture should exist")
}

fn snapshot(name: &str) -> StructuralSnapshot {
    summarize(&fixture(name)).expect("fixture should parse")
}

#[test]
fn test_clean_fixture_summary() {
    let snap = snapshot("clean.py");

    for func in ["load_settings", "merge", "__init__", "get"] {
        assert!(snap.functions.contains(func), "missing function {}", func);
    }
    assert!(snap.classes.contains("Settings"));

    let methods = snap.class_methods.get("Settings").unwrap();
    assert!(methods.contains("__init__"));
    assert!(methods.contains("get"));
    assert!(!methods.contains("load_settings"));

    assert!(snap.imports.contains("json"));
    assert!(snap.imports.contains("pathlib.Path"));

    assert!(snap.docstring(MODULE_DOC_KEY).is_some());
    assert_eq!(
        snap.docstring("load_settings"),
        Some("Read settings from a JSON file.")
    );
    assert_eq!(snap.docstring("merge"), None);

    // load_settings enters one context manager
    assert_eq!(*snap.complexity.get("load_settings").unwrap(), 2);
    assert_eq!(*snap.complexity.get("merge").unwrap(), 1);

    assert_eq!(*snap.annotation_coverage.get("load_settings").unwrap(), 100.0);
    assert_eq!(*snap.annotation_coverage.get("get").unwrap(), 33.3);
}

#[test]
fn test_drift_fixture_diff() {
    let old = snapshot("drift_old.py");
    let new = snapshot("drift_new.py");
    let diff = StructuralDiff::between(&old, &new);

    // methods share the flat function namespace with top-level functions
    for added in ["world", "update_head", "reset"] {
        assert!(diff.functions.added.contains(added), "missing {}", added);
    }
    assert!(diff.functions.removed.is_empty());
    assert!(diff.functions.modified.contains("hello"));

    assert!(diff.imports.added.contains("sys"));
    assert!(diff.imports.removed.is_empty());

    let watcher = diff.method_changes.get("WatcherState").unwrap();
    assert!(watcher.added.contains("update_head"));
    assert!(watcher.added.contains("reset"));
    assert!(watcher.removed.is_empty());

    // hello gained a docstring, the module docstring changed
    let hello_doc = diff.docstring_changes.get("hello").unwrap();
    assert_eq!(hello_doc.old, None);
    assert_eq!(hello_doc.new.as_deref(), Some("Say hello."));
    assert!(diff.docstring_changes.contains_key(MODULE_DOC_KEY));

    let update_head = diff.complexity_changes.get("update_head").unwrap();
    assert_eq!(update_head.trend, ComplexityTrend::NewSymbol);
    assert_eq!(update_head.new, Some(2));

    assert!(!diff.complexity_changes.contains_key("hello"));
    assert!(!diff.complexity_changes.contains_key("check"));
}

#[test]
fn test_diff_against_self_is_empty_for_all_fixtures() {
    for name in ["clean.py", "smelly.py", "risky.py", "drift_new.py"] {
        let snap = snapshot(name);
        let diff = StructuralDiff::between(&snap, &snap);
        assert!(diff.is_empty(), "self-diff of {} not empty", name);
    }
}

#[test]
fn test_added_equals_reverse_removed() {
    let old = snapshot("drift_old.py");
    let new = snapshot("drift_new.py");

    let forward = StructuralDiff::between(&old, &new);
    let backward = StructuralDiff::between(&new, &old);

    assert_eq!(forward.functions.added, backward.functions.removed);
    assert_eq!(forward.functions.removed, backward.functions.added);
    assert_eq!(forward.imports.added, backward.imports.removed);
    assert_eq!(forward.classes.added, backward.classes.removed);
}

#[test]
fn test_extraction_is_deterministic_across_parses() {
    let source = fixture("drift_new.py");
    let a = summarize(&source).unwrap();
    let b = summarize(&source).unwrap();
    assert_eq!(a, b);
}
