//! Structural snapshot extraction.
//!
//! A [`StructuralSnapshot`] is an immutable record of the structural facts
//! of one source version: function and class names, direct methods per
//! class, normalized imports, rendered decorators, docstrings, per-function
//! complexity and annotation coverage. It is a pure function of the parse
//! tree; extracting the same tree twice yields identical snapshots.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor};

use crate::analysis::complexity::function_complexity;
use crate::analysis::SourceTree;
use crate::Error;

/// Placeholder for a decorator whose expression cannot be rendered.
const UNRENDERABLE_DECORATOR: &str = "@<unknown>";

/// Key under which the module-level docstring is recorded.
pub const MODULE_DOC_KEY: &str = "__module__";

const DECLARATION_QUERY: &str = r#"
(function_definition
  name: (identifier) @func_name
) @function

(class_definition
  name: (identifier) @class_name
) @class
"#;

/// Immutable structural facts of one source version.
///
/// Symbol identity is name-based and flat: nested functions land in the
/// same namespace as top-level ones, and duplicate names collapse
/// last-wins. Both are documented identity simplifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuralSnapshot {
    /// All function names, sync and async, nested included.
    pub functions: BTreeSet<String>,
    /// All class names.
    pub classes: BTreeSet<String>,
    /// Direct method names per class (one level, no inherited methods).
    pub class_methods: BTreeMap<String, BTreeSet<String>>,
    /// Normalized imports: `import X` -> `X`, `from M import X` -> `M.X`,
    /// bare `X` when the module is empty (relative import).
    pub imports: BTreeSet<String>,
    /// Rendered decorator strings per decorated symbol, in source order.
    pub decorators: BTreeMap<String, Vec<String>>,
    /// Docstring text per symbol; the module docstring is keyed by
    /// [`MODULE_DOC_KEY`]. Absent key means no docstring.
    pub docstrings: BTreeMap<String, String>,
    /// Cyclomatic complexity per function.
    pub complexity: BTreeMap<String, u32>,
    /// Annotation coverage percentage per function.
    pub annotation_coverage: BTreeMap<String, f64>,
}

impl StructuralSnapshot {
    /// Extract structural facts from a parsed tree.
    ///
    /// Fails with [`crate::ParseError`] (wrapped in [`Error::Parse`]) when
    /// the tree is the product of invalid source; the caller decides
    /// whether to abort or skip.
    pub fn extract(tree: &SourceTree) -> Result<Self, Error> {
        tree.require_valid()?;

        let mut snapshot = Self::default();
        let language = tree_sitter_python::LANGUAGE.into();
        let query = Query::new(&language, DECLARATION_QUERY)
            .map_err(|e| Error::Grammar(e.to_string()))?;

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root(), tree.source());

        while let Some(m) = matches.next() {
            let mut name = "";
            let mut decl_node = None;
            let mut is_class = false;

            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "func_name" => name = tree.node_text(capture.node),
                    "class_name" => {
                        name = tree.node_text(capture.node);
                        is_class = true;
                    }
                    "function" | "class" => decl_node = Some(capture.node),
                    _ => {}
                }
            }

            let node = match decl_node {
                Some(n) if !name.is_empty() => n,
                _ => continue,
            };

            if is_class {
                snapshot.record_class(tree, node, name);
            } else {
                snapshot.record_function(tree, node, name);
            }
        }

        collect_imports(tree, tree.root(), &mut snapshot.imports);

        if let Some(doc) = module_docstring(tree) {
            snapshot.docstrings.insert(MODULE_DOC_KEY.to_string(), doc);
        }

        Ok(snapshot)
    }

    /// Docstring for a symbol, if one was recorded.
    pub fn docstring(&self, name: &str) -> Option<&str> {
        self.docstrings.get(name).map(String::as_str)
    }

    fn record_function(&mut self, tree: &SourceTree, node: Node, name: &str) {
        self.functions.insert(name.to_string());
        self.complexity
            .insert(name.to_string(), function_complexity(node));
        self.annotation_coverage
            .insert(name.to_string(), annotation_coverage(tree, node));

        let decs = decorators_of(tree, node);
        if !decs.is_empty() {
            self.decorators.insert(name.to_string(), decs);
        }
        if let Some(doc) = body_docstring(tree, node) {
            self.docstrings.insert(name.to_string(), doc);
        }
    }

    fn record_class(&mut self, tree: &SourceTree, node: Node, name: &str) {
        self.classes.insert(name.to_string());
        self.class_methods
            .insert(name.to_string(), direct_methods(tree, node));

        let decs = decorators_of(tree, node);
        if !decs.is_empty() {
            self.decorators.insert(name.to_string(), decs);
        }
        if let Some(doc) = body_docstring(tree, node) {
            self.docstrings.insert(name.to_string(), doc);
        }
    }
}

/// Direct method names of a class body, one level deep.
pub(crate) fn direct_methods(tree: &SourceTree, class_node: Node) -> BTreeSet<String> {
    let mut methods = BTreeSet::new();
    let Some(body) = class_node.child_by_field_name("body") else {
        return methods;
    };

    let mut cursor = body.walk();
    for stmt in body.named_children(&mut cursor) {
        let func = match stmt.kind() {
            "function_definition" => Some(stmt),
            "decorated_definition" => stmt
                .child_by_field_name("definition")
                .filter(|d| d.kind() == "function_definition"),
            _ => None,
        };
        if let Some(func) = func {
            if let Some(name) = func.child_by_field_name("name") {
                methods.insert(tree.node_text(name).to_string());
            }
        }
    }
    methods
}

/// Rendered decorator strings for a definition, in source order.
fn decorators_of(tree: &SourceTree, def_node: Node) -> Vec<String> {
    let Some(parent) = def_node.parent() else {
        return Vec::new();
    };
    if parent.kind() != "decorated_definition" {
        return Vec::new();
    }

    let mut rendered = Vec::new();
    let mut cursor = parent.walk();
    for child in parent.named_children(&mut cursor) {
        if child.kind() == "decorator" {
            let text = tree.node_text(child);
            if text.is_empty() {
                rendered.push(UNRENDERABLE_DECORATOR.to_string());
            } else {
                rendered.push(text.to_string());
            }
        }
    }
    rendered
}

/// Docstring of a function or class body: the first statement must be a
/// bare string-literal expression. F-strings do not qualify.
fn body_docstring(tree: &SourceTree, def_node: Node) -> Option<String> {
    let body = def_node.child_by_field_name("body")?;
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")?;
    docstring_from_statement(tree, first)
}

/// Module docstring: first statement of the module body.
fn module_docstring(tree: &SourceTree) -> Option<String> {
    let root = tree.root();
    let mut cursor = root.walk();
    let first = root
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")?;
    docstring_from_statement(tree, first)
}

fn docstring_from_statement(tree: &SourceTree, stmt: Node) -> Option<String> {
    if stmt.kind() != "expression_statement" {
        return None;
    }
    let expr = stmt.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    let mut cursor = expr.walk();
    if expr
        .named_children(&mut cursor)
        .any(|n| n.kind() == "interpolation")
    {
        return None;
    }
    Some(clean_docstring(&string_content(tree, expr)))
}

/// Concatenated literal content of a string node, quotes stripped.
pub(crate) fn string_content(tree: &SourceTree, string_node: Node) -> String {
    let mut content = String::new();
    let mut cursor = string_node.walk();
    for child in string_node.named_children(&mut cursor) {
        match child.kind() {
            "string_content" | "escape_sequence" => content.push_str(tree.node_text(child)),
            _ => {}
        }
    }
    content
}

/// Normalize a docstring the way Python tooling renders it: the first line
/// keeps its text, the remaining lines lose their common indentation, and
/// surrounding blank lines are dropped.
fn clean_docstring(raw: &str) -> String {
    let mut lines = raw.lines();
    let first = lines.next().unwrap_or("").trim_start();
    let rest: Vec<&str> = lines.collect();

    let indent = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = Vec::with_capacity(rest.len() + 1);
    cleaned.push(first.trim_end().to_string());
    for line in rest {
        if line.len() >= indent {
            cleaned.push(line[indent..].trim_end().to_string());
        } else {
            cleaned.push(line.trim().to_string());
        }
    }

    while cleaned.first().map_or(false, |l| l.is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().map_or(false, |l| l.is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

/// Collect normalized import entries from the whole tree.
fn collect_imports(tree: &SourceTree, node: Node, imports: &mut BTreeSet<String>) {
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for name_node in node.children_by_field_name("name", &mut cursor) {
                match name_node.kind() {
                    "dotted_name" => {
                        imports.insert(tree.node_text(name_node).to_string());
                    }
                    "aliased_import" => {
                        if let Some(real) = name_node.child_by_field_name("name") {
                            imports.insert(tree.node_text(real).to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
        "import_from_statement" => {
            let module = node
                .child_by_field_name("module_name")
                .map(|m| tree.node_text(m).trim_start_matches('.').to_string())
                .unwrap_or_default();

            let mut cursor = node.walk();
            for name_node in node.children_by_field_name("name", &mut cursor) {
                let real = match name_node.kind() {
                    "dotted_name" => Some(tree.node_text(name_node)),
                    "aliased_import" => name_node
                        .child_by_field_name("name")
                        .map(|n| tree.node_text(n)),
                    _ => None,
                };
                if let Some(real) = real {
                    imports.insert(qualify_import(&module, real));
                }
            }

            let mut cursor = node.walk();
            if node
                .named_children(&mut cursor)
                .any(|n| n.kind() == "wildcard_import")
            {
                imports.insert(qualify_import(&module, "*"));
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_imports(tree, child, imports);
    }
}

fn qualify_import(module: &str, name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", module, name)
    }
}

/// Named parameters of a function, excluding the literal receiver `self`
/// and `*`/`**` splats.
pub(crate) fn named_parameters(tree: &SourceTree, func_node: Node) -> Vec<String> {
    let mut params = Vec::new();
    let Some(parameters) = func_node.child_by_field_name("parameters") else {
        return params;
    };

    let mut cursor = parameters.walk();
    for param in parameters.named_children(&mut cursor) {
        let name = match param.kind() {
            "identifier" => Some(tree.node_text(param)),
            "typed_parameter" => param
                .named_child(0)
                .filter(|n| n.kind() == "identifier")
                .map(|n| tree.node_text(n)),
            "default_parameter" | "typed_default_parameter" => param
                .child_by_field_name("name")
                .filter(|n| n.kind() == "identifier")
                .map(|n| tree.node_text(n)),
            _ => None,
        };
        if let Some(name) = name {
            if name != "self" {
                params.push(name.to_string());
            }
        }
    }
    params
}

/// Annotation coverage of a function: annotated slots over total slots,
/// where slots are the named parameters (receiver excluded) plus the
/// return slot. Rounded to one decimal.
fn annotation_coverage(tree: &SourceTree, func_node: Node) -> f64 {
    let mut slots = 1usize;
    let mut annotated = 0usize;

    if func_node.child_by_field_name("return_type").is_some() {
        annotated += 1;
    }

    if let Some(parameters) = func_node.child_by_field_name("parameters") {
        let mut cursor = parameters.walk();
        for param in parameters.named_children(&mut cursor) {
            let (name, has_annotation) = match param.kind() {
                "identifier" => (Some(tree.node_text(param)), false),
                "typed_parameter" => (
                    param
                        .named_child(0)
                        .filter(|n| n.kind() == "identifier")
                        .map(|n| tree.node_text(n)),
                    true,
                ),
                "default_parameter" => (
                    param
                        .child_by_field_name("name")
                        .filter(|n| n.kind() == "identifier")
                        .map(|n| tree.node_text(n)),
                    false,
                ),
                "typed_default_parameter" => (
                    param
                        .child_by_field_name("name")
                        .filter(|n| n.kind() == "identifier")
                        .map(|n| tree.node_text(n)),
                    true,
                ),
                _ => (None, false),
            };
            match name {
                Some(name) if name != "self" => {
                    slots += 1;
                    if has_annotation {
                        annotated += 1;
                    }
                }
                _ => {}
            }
        }
    }

    let pct = annotated as f64 / slots as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_of(source: &str) -> StructuralSnapshot {
        let tree = SourceTree::parse(source).unwrap();
        StructuralSnapshot::extract(&tree).unwrap()
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let source = "\
import os
class Hello:
    def greet(self): pass
def hello(): pass
";
        let tree = SourceTree::parse(source).unwrap();
        let a = StructuralSnapshot::extract(&tree).unwrap();
        let b = StructuralSnapshot::extract(&tree).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_functions_sync_async_and_nested() {
        let source = "\
def sync_func(): pass

async def async_func(): pass

def outer():
    def inner():
        pass
    return inner
";
        let snap = snapshot_of(source);
        for name in ["sync_func", "async_func", "outer", "inner"] {
            assert!(snap.functions.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_class_methods_are_direct_only() {
        let source = "\
class Agent:
    def run(self): pass
    async def stop(self): pass
    def helper(self):
        def local(): pass
";
        let snap = snapshot_of(source);
        let methods = snap.class_methods.get("Agent").unwrap();
        assert_eq!(
            methods.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["helper", "run", "stop"]
        );
        // the local function is still visible in the flat namespace
        assert!(snap.functions.contains("local"));
    }

    #[test]
    fn test_import_normalization() {
        let source = "\
import os
import os.path
import pickle as pk
from pathlib import Path
from typing import Dict, List
from . import sibling
from .models import Record
from collections import *
";
        let snap = snapshot_of(source);
        for expected in [
            "os",
            "os.path",
            "pickle",
            "pathlib.Path",
            "typing.Dict",
            "typing.List",
            "sibling",
            "models.Record",
            "collections.*",
        ] {
            assert!(snap.imports.contains(expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_decorators_rendered_in_order() {
        let source = "\
@property
def value(self): pass

@staticmethod
@app.route(\"/x\")
def handler(): pass

def plain(): pass
";
        let snap = snapshot_of(source);
        assert_eq!(snap.decorators.get("value").unwrap(), &vec!["@property"]);
        assert_eq!(
            snap.decorators.get("handler").unwrap(),
            &vec!["@staticmethod", "@app.route(\"/x\")"]
        );
        assert!(!snap.decorators.contains_key("plain"));
    }

    #[test]
    fn test_docstrings() {
        let source = "\
\"\"\"Module doc.\"\"\"

def documented():
    \"\"\"Does a thing.\"\"\"
    return 1

def undocumented():
    x = \"not a docstring\"
    return x

class Widget:
    \"\"\"A widget.\"\"\"
";
        let snap = snapshot_of(source);
        assert_eq!(snap.docstring(MODULE_DOC_KEY), Some("Module doc."));
        assert_eq!(snap.docstring("documented"), Some("Does a thing."));
        assert_eq!(snap.docstring("undocumented"), None);
        assert_eq!(snap.docstring("Widget"), Some("A widget."));
    }

    #[test]
    fn test_multiline_docstring_is_dedented() {
        let source = "\
def f():
    \"\"\"First line.

    Indented body line.
    \"\"\"
    pass
";
        let snap = snapshot_of(source);
        assert_eq!(
            snap.docstring("f"),
            Some("First line.\n\nIndented body line.")
        );
    }

    #[test]
    fn test_annotation_coverage() {
        let source = "\
def untyped(a, b): pass

def typed(a: int, b: str) -> bool: pass

def half(a: int, b) -> None: pass

class C:
    def method(self, x: int) -> int: pass
";
        let snap = snapshot_of(source);
        // 0 of 3 slots
        assert_eq!(*snap.annotation_coverage.get("untyped").unwrap(), 0.0);
        // 3 of 3 slots
        assert_eq!(*snap.annotation_coverage.get("typed").unwrap(), 100.0);
        // 2 of 3 slots
        assert_eq!(*snap.annotation_coverage.get("half").unwrap(), 66.7);
        // self is excluded: 2 of 2 slots
        assert_eq!(*snap.annotation_coverage.get("method").unwrap(), 100.0);
    }

    #[test]
    fn test_duplicate_names_collapse_last_wins() {
        let source = "\
def shadowed():
    \"\"\"old\"\"\"
    pass

def shadowed():
    if True:
        pass
";
        let snap = snapshot_of(source);
        assert_eq!(snap.functions.len(), 1);
        // last definition wins for complexity
        assert_eq!(*snap.complexity.get("shadowed").unwrap(), 2);
    }

    #[test]
    fn test_extract_rejects_broken_source() {
        let tree = SourceTree::parse("def broken(:\n").unwrap();
        let err = StructuralSnapshot::extract(&tree).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_named_parameters_excludes_self_and_splats() {
        let source = "def f(self, a, b: int, c=1, *args, **kwargs): pass\n";
        let tree = SourceTree::parse(source).unwrap();
        let root = tree.root();
        let func = root.named_child(0).unwrap();
        let params = named_parameters(&tree, func);
        assert_eq!(params, vec!["a", "b", "c"]);
    }
}
