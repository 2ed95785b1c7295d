//! Structural diffing between two snapshots of the same source unit.
//!
//! All comparisons are set-algebraic over symbol names. "Modified" is the
//! literal intersection of names present in both snapshots - it does NOT
//! verify that the body changed. A renamed or moved symbol shows up as one
//! removal plus one unrelated addition; there is no rename detection.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::analysis::{ComplexityLevel, SourceTree, StructuralSnapshot};
use crate::Error;

/// Added/removed/modified name sets for one symbol category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    /// Names present in both snapshots. This is intersection only, not a
    /// body-change check; callers must not read it as "definitely edited".
    pub modified: BTreeSet<String>,
}

impl SetDiff {
    fn between(old: &BTreeSet<String>, new: &BTreeSet<String>) -> Self {
        Self {
            added: new.difference(old).cloned().collect(),
            removed: old.difference(new).cloned().collect(),
            modified: old.intersection(new).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Method-set delta for one class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MethodDelta {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

/// Decorator-set delta for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecoratorChange {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

/// Docstring change for one symbol; `None` marks the side where the symbol
/// (or its docstring) does not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocstringChange {
    pub old: Option<String>,
    pub new: Option<String>,
}

/// How a function's complexity moved between versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTrend {
    Increased,
    Decreased,
    Unchanged,
    NewSymbol,
    RemovedSymbol,
}

impl ComplexityTrend {
    /// Tag a pair of scores.
    pub fn of(old: Option<u32>, new: Option<u32>) -> Self {
        match (old, new) {
            (Some(o), Some(n)) => match n.cmp(&o) {
                std::cmp::Ordering::Greater => ComplexityTrend::Increased,
                std::cmp::Ordering::Less => ComplexityTrend::Decreased,
                std::cmp::Ordering::Equal => ComplexityTrend::Unchanged,
            },
            (None, Some(_)) => ComplexityTrend::NewSymbol,
            (Some(_), None) => ComplexityTrend::RemovedSymbol,
            (None, None) => ComplexityTrend::Unchanged,
        }
    }
}

/// Complexity change for one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplexityChange {
    pub old: Option<u32>,
    pub new: Option<u32>,
    /// `new - old` when the symbol exists on both sides.
    pub delta: Option<i64>,
    pub trend: ComplexityTrend,
    /// Severity band of the new score (low when the symbol was removed).
    pub level: ComplexityLevel,
}

/// Annotation-coverage change for one function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationChange {
    pub old: Option<f64>,
    pub new: Option<f64>,
    pub delta: Option<f64>,
}

/// Full structural diff between two source versions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuralDiff {
    pub functions: SetDiff,
    pub classes: SetDiff,
    pub imports: SetDiff,
    /// Per-class method deltas; only classes with a non-empty delta appear.
    pub method_changes: BTreeMap<String, MethodDelta>,
    pub decorator_changes: BTreeMap<String, DecoratorChange>,
    pub docstring_changes: BTreeMap<String, DocstringChange>,
    pub complexity_changes: BTreeMap<String, ComplexityChange>,
    pub annotation_changes: BTreeMap<String, AnnotationChange>,
}

impl StructuralDiff {
    /// Diff two snapshots.
    pub fn between(old: &StructuralSnapshot, new: &StructuralSnapshot) -> Self {
        Self {
            functions: SetDiff::between(&old.functions, &new.functions),
            classes: SetDiff::between(&old.classes, &new.classes),
            imports: SetDiff::between(&old.imports, &new.imports),
            method_changes: method_changes(&old.class_methods, &new.class_methods),
            decorator_changes: decorator_changes(&old.decorators, &new.decorators),
            docstring_changes: docstring_changes(&old.docstrings, &new.docstrings),
            complexity_changes: complexity_changes(&old.complexity, &new.complexity),
            annotation_changes: annotation_changes(
                &old.annotation_coverage,
                &new.annotation_coverage,
            ),
        }
    }

    /// True when nothing was added, removed or changed in any category.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
            && self.classes.is_empty()
            && self.imports.is_empty()
            && self.method_changes.is_empty()
            && self.decorator_changes.is_empty()
            && self.docstring_changes.is_empty()
            && self.complexity_changes.is_empty()
            && self.annotation_changes.is_empty()
    }
}

/// Parse and diff two versions of one source unit.
pub fn diff_sources(old: &str, new: &str) -> Result<StructuralDiff, Error> {
    let old_tree = SourceTree::parse(old)?;
    let new_tree = SourceTree::parse(new)?;
    let old_snap = StructuralSnapshot::extract(&old_tree)?;
    let new_snap = StructuralSnapshot::extract(&new_tree)?;
    Ok(StructuralDiff::between(&old_snap, &new_snap))
}

fn method_changes(
    old: &BTreeMap<String, BTreeSet<String>>,
    new: &BTreeMap<String, BTreeSet<String>>,
) -> BTreeMap<String, MethodDelta> {
    let mut changes = BTreeMap::new();
    let empty = BTreeSet::new();

    for class in old.keys().chain(new.keys()) {
        if changes.contains_key(class) {
            continue;
        }
        let old_m = old.get(class).unwrap_or(&empty);
        let new_m = new.get(class).unwrap_or(&empty);
        let added: BTreeSet<String> = new_m.difference(old_m).cloned().collect();
        let removed: BTreeSet<String> = old_m.difference(new_m).cloned().collect();
        if !added.is_empty() || !removed.is_empty() {
            changes.insert(class.clone(), MethodDelta { added, removed });
        }
    }
    changes
}

fn decorator_changes(
    old: &BTreeMap<String, Vec<String>>,
    new: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, DecoratorChange> {
    let mut changes = BTreeMap::new();

    for symbol in old.keys().chain(new.keys()) {
        if changes.contains_key(symbol) {
            continue;
        }
        let old_d: BTreeSet<String> = old.get(symbol).into_iter().flatten().cloned().collect();
        let new_d: BTreeSet<String> = new.get(symbol).into_iter().flatten().cloned().collect();
        let added: BTreeSet<String> = new_d.difference(&old_d).cloned().collect();
        let removed: BTreeSet<String> = old_d.difference(&new_d).cloned().collect();
        if !added.is_empty() || !removed.is_empty() {
            changes.insert(symbol.clone(), DecoratorChange { added, removed });
        }
    }
    changes
}

fn docstring_changes(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> BTreeMap<String, DocstringChange> {
    let mut changes = BTreeMap::new();

    for symbol in old.keys().chain(new.keys()) {
        if changes.contains_key(symbol) {
            continue;
        }
        let old_doc = old.get(symbol);
        let new_doc = new.get(symbol);
        if old_doc != new_doc {
            changes.insert(
                symbol.clone(),
                DocstringChange {
                    old: old_doc.cloned(),
                    new: new_doc.cloned(),
                },
            );
        }
    }
    changes
}

fn complexity_changes(
    old: &BTreeMap<String, u32>,
    new: &BTreeMap<String, u32>,
) -> BTreeMap<String, ComplexityChange> {
    let mut changes = BTreeMap::new();

    for symbol in old.keys().chain(new.keys()) {
        if changes.contains_key(symbol) {
            continue;
        }
        let old_c = old.get(symbol).copied();
        let new_c = new.get(symbol).copied();
        if old_c != new_c {
            let delta = match (old_c, new_c) {
                (Some(o), Some(n)) => Some(i64::from(n) - i64::from(o)),
                _ => None,
            };
            changes.insert(
                symbol.clone(),
                ComplexityChange {
                    old: old_c,
                    new: new_c,
                    delta,
                    trend: ComplexityTrend::of(old_c, new_c),
                    level: ComplexityLevel::from_score(new_c.unwrap_or(0)),
                },
            );
        }
    }
    changes
}

fn annotation_changes(
    old: &BTreeMap<String, f64>,
    new: &BTreeMap<String, f64>,
) -> BTreeMap<String, AnnotationChange> {
    let mut changes = BTreeMap::new();

    for symbol in old.keys().chain(new.keys()) {
        if changes.contains_key(symbol) {
            continue;
        }
        let old_v = old.get(symbol).copied();
        let new_v = new.get(symbol).copied();
        if old_v != new_v {
            let delta = match (old_v, new_v) {
                (Some(o), Some(n)) => Some(n - o),
                _ => None,
            };
            changes.insert(
                symbol.clone(),
                AnnotationChange {
                    old: old_v,
                    new: new_v,
                    delta,
                },
            );
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(source: &str) -> StructuralSnapshot {
        let tree = SourceTree::parse(source).unwrap();
        StructuralSnapshot::extract(&tree).unwrap()
    }

    #[test]
    fn test_diff_with_self_is_empty() {
        let source = "\
import os

class Hello:
    \"\"\"doc\"\"\"
    def greet(self):
        if True:
            pass

def hello(): pass
";
        let a = snap(source);
        let diff = StructuralDiff::between(&a, &a);
        assert!(diff.is_empty());
        assert!(diff.functions.added.is_empty());
        assert!(diff.functions.removed.is_empty());
        // modified is intersection-of-names, so it is populated even here
        assert!(diff.functions.modified.contains("hello"));
    }

    #[test]
    fn test_added_function_scenario() {
        let old = snap("def hello(): pass\n");
        let new = snap("def hello(): pass\ndef world(): pass\n");
        let diff = StructuralDiff::between(&old, &new);

        assert_eq!(
            diff.functions.added,
            ["world".to_string()].into_iter().collect()
        );
        assert!(diff.functions.removed.is_empty());
        assert!(diff.functions.modified.contains("hello"));
    }

    #[test]
    fn test_diff_is_antisymmetric() {
        let a = snap("import os\ndef alpha(): pass\nclass A:\n    def m(self): pass\n");
        let b = snap("import sys\ndef beta(): pass\nclass B:\n    def m(self): pass\n");

        let ab = StructuralDiff::between(&a, &b);
        let ba = StructuralDiff::between(&b, &a);

        assert_eq!(ab.functions.added, ba.functions.removed);
        assert_eq!(ab.functions.removed, ba.functions.added);
        assert_eq!(ab.classes.added, ba.classes.removed);
        assert_eq!(ab.imports.added, ba.imports.removed);
    }

    #[test]
    fn test_method_changes_only_for_changed_classes() {
        let old = snap("\
class WatcherState:
    def __init__(self): pass
    def check(self): pass

class Stable:
    def same(self): pass
");
        let new = snap("\
class WatcherState:
    def __init__(self): pass
    def check(self): pass
    def update_head(self): pass
    def reset(self): pass

class Stable:
    def same(self): pass
");
        let diff = StructuralDiff::between(&old, &new);
        let delta = diff.method_changes.get("WatcherState").unwrap();
        assert!(delta.added.contains("update_head"));
        assert!(delta.added.contains("reset"));
        assert!(delta.removed.is_empty());
        assert!(!diff.method_changes.contains_key("Stable"));
    }

    #[test]
    fn test_decorator_change() {
        let old = snap("def foo(): pass\n");
        let new = snap("@property\ndef foo(): pass\n");
        let diff = StructuralDiff::between(&old, &new);

        let change = diff.decorator_changes.get("foo").unwrap();
        assert!(change.added.contains("@property"));
        assert!(change.removed.is_empty());
    }

    #[test]
    fn test_docstring_change_handles_missing_side() {
        let old = snap("def foo(): pass\n");
        let new = snap("def foo():\n    \"\"\"Now documented.\"\"\"\n    pass\n");
        let diff = StructuralDiff::between(&old, &new);

        let change = diff.docstring_changes.get("foo").unwrap();
        assert_eq!(change.old, None);
        assert_eq!(change.new.as_deref(), Some("Now documented."));
    }

    #[test]
    fn test_complexity_change_tags() {
        let old = snap("def f(x):\n    if x:\n        pass\n");
        let new = snap("\
def f(x):
    if x:
        pass
    if x > 1:
        pass

def g(): pass
");
        let diff = StructuralDiff::between(&old, &new);

        let f = diff.complexity_changes.get("f").unwrap();
        assert_eq!(f.old, Some(2));
        assert_eq!(f.new, Some(3));
        assert_eq!(f.delta, Some(1));
        assert_eq!(f.trend, ComplexityTrend::Increased);

        let g = diff.complexity_changes.get("g").unwrap();
        assert_eq!(g.old, None);
        assert_eq!(g.new, Some(1));
        assert_eq!(g.delta, None);
        assert_eq!(g.trend, ComplexityTrend::NewSymbol);
    }

    #[test]
    fn test_removed_symbol_complexity() {
        let old = snap("def gone(x):\n    if x:\n        pass\n");
        let new = snap("");
        let diff = StructuralDiff::between(&old, &new);

        let change = diff.complexity_changes.get("gone").unwrap();
        assert_eq!(change.trend, ComplexityTrend::RemovedSymbol);
        assert_eq!(change.new, None);
        assert_eq!(change.level, ComplexityLevel::Low);
    }

    #[test]
    fn test_annotation_change() {
        let old = snap("def f(a, b): pass\n");
        let new = snap("def f(a: int, b: str) -> None: pass\n");
        let diff = StructuralDiff::between(&old, &new);

        let change = diff.annotation_changes.get("f").unwrap();
        assert_eq!(change.old, Some(0.0));
        assert_eq!(change.new, Some(100.0));
        assert_eq!(change.delta, Some(100.0));
    }

    #[test]
    fn test_diff_sources_surfaces_parse_errors() {
        let err = diff_sources("def ok(): pass\n", "def broken(\n").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
