//! Detection of structural code smells.
//!
//! Four detectors run against every function and class in a source unit:
//! long functions, parameter-heavy functions, deeply nested control flow
//! and god classes. All thresholds come from an explicit
//! [`SmellThresholds`] value.

use tree_sitter::Node;

use crate::analysis::{direct_methods, named_parameters, SourceTree};
use crate::config::SmellThresholds;

use super::{Severity, SmellFinding, SmellKind, SmellScan};

/// Node kinds that deepen nesting. `try` and its handlers both count,
/// as does each `elif` in a chain; the count is pinned by tests.
const NESTING_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "try_statement",
    "except_clause",
    "with_statement",
];

/// Scan one source unit for structural smells.
///
/// Never panics on malformed input: a syntax error yields a scan whose
/// `error` marker is set and whose finding lists are empty.
pub fn scan_smells(source: &str, thresholds: &SmellThresholds) -> SmellScan {
    let tree = match SourceTree::parse(source) {
        Ok(tree) => tree,
        Err(e) => return SmellScan::parse_failure(e.to_string()),
    };
    if let Err(e) = tree.require_valid() {
        return SmellScan::parse_failure(e.to_string());
    }

    let mut scan = SmellScan::default();
    visit(&tree, tree.root(), thresholds, &mut scan);
    scan
}

fn visit(tree: &SourceTree, node: Node, thresholds: &SmellThresholds, scan: &mut SmellScan) {
    match node.kind() {
        "function_definition" => check_function(tree, node, thresholds, scan),
        "class_definition" => check_class(tree, node, thresholds, scan),
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        visit(tree, child, thresholds, scan);
    }
}

fn check_function(tree: &SourceTree, func: Node, thresholds: &SmellThresholds, scan: &mut SmellScan) {
    let name = match func.child_by_field_name("name") {
        Some(n) => tree.node_text(n).to_string(),
        None => return,
    };

    let lines = function_lines(func);
    if lines > thresholds.long_function_lines {
        let severity = if lines <= thresholds.long_function_lines * 2 {
            Severity::Warning
        } else {
            Severity::Error
        };
        scan.long_functions.push(SmellFinding {
            kind: SmellKind::LongFunction,
            name: name.clone(),
            value: lines,
            threshold: thresholds.long_function_lines,
            severity,
            message: format!(
                "function '{}' spans {} lines, exceeds threshold of {}",
                name, lines, thresholds.long_function_lines
            ),
        });
    }

    let params = named_parameters(tree, func);
    if params.len() > thresholds.too_many_params {
        scan.too_many_params.push(SmellFinding {
            kind: SmellKind::TooManyParams,
            name: name.clone(),
            value: params.len(),
            threshold: thresholds.too_many_params,
            severity: Severity::Warning,
            message: format!(
                "function '{}' takes {} parameters, exceeds threshold of {}",
                name,
                params.len(),
                thresholds.too_many_params
            ),
        });
    }

    let depth = nesting_depth(func);
    if depth > thresholds.deep_nesting_level {
        let severity = if depth <= thresholds.deep_nesting_level + 2 {
            Severity::Warning
        } else {
            Severity::Error
        };
        scan.deep_nesting.push(SmellFinding {
            kind: SmellKind::DeepNesting,
            name: name.clone(),
            value: depth,
            threshold: thresholds.deep_nesting_level,
            severity,
            message: format!(
                "function '{}' nests {} levels deep, exceeds threshold of {}",
                name, depth, thresholds.deep_nesting_level
            ),
        });
    }
}

fn check_class(tree: &SourceTree, class: Node, thresholds: &SmellThresholds, scan: &mut SmellScan) {
    let name = match class.child_by_field_name("name") {
        Some(n) => tree.node_text(n).to_string(),
        None => return,
    };

    let method_count = direct_methods(tree, class).len();
    if method_count > thresholds.god_class_methods {
        scan.god_classes.push(SmellFinding {
            kind: SmellKind::GodClass,
            name: name.clone(),
            value: method_count,
            threshold: thresholds.god_class_methods,
            severity: Severity::Error,
            message: format!(
                "class '{}' has {} methods, exceeds threshold of {}",
                name, method_count, thresholds.god_class_methods
            ),
        });
    }
}

/// Function length: last line minus first line plus one. Decorators sit
/// outside the `function_definition` node and are not counted.
fn function_lines(func: Node) -> usize {
    func.end_position().row - func.start_position().row + 1
}

/// Maximum nesting depth of control-flow constructs inside a function.
/// The walk deliberately descends into nested functions, matching the
/// original recursive counting rule.
fn nesting_depth(func: Node) -> usize {
    fn walk(node: Node, depth: usize, max: &mut usize) {
        let entered = NESTING_KINDS.contains(&node.kind());
        let depth = if entered { depth + 1 } else { depth };
        if depth > *max {
            *max = depth;
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            walk(child, depth, max);
        }
    }

    let mut max = 0;
    let mut cursor = func.walk();
    for child in func.named_children(&mut cursor) {
        walk(child, 0, &mut max);
    }
    max
}
