//! Cyclomatic complexity scoring for Python functions.
//!
//! Complexity starts at 1 and adds one decision point for each branch
//! construct: if/elif, a terminal else, loops, exception handlers, context
//! managers, assertions, comprehension clauses and conditional expressions.
//! Each `and`/`or` join adds one, so a boolean chain of N operands
//! contributes N-1.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

/// Fixed severity bands for a complexity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ComplexityLevel {
    /// Band a score: 1-10 low, 11-20 medium, 21-50 high, >50 critical.
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=10 => ComplexityLevel::Low,
            11..=20 => ComplexityLevel::Medium,
            21..=50 => ComplexityLevel::High,
            _ => ComplexityLevel::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLevel::Low => "low",
            ComplexityLevel::Medium => "medium",
            ComplexityLevel::High => "high",
            ComplexityLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Score a single `function_definition` node.
///
/// The walk clips at nested `function_definition` boundaries: an inner
/// function's branches never count against the enclosing function. The
/// inner function is scored separately when the snapshot visits it.
pub fn function_complexity(func: Node) -> u32 {
    let mut score = 1;
    let mut cursor = func.walk();
    for child in func.named_children(&mut cursor) {
        count_branches(child, false, &mut score);
    }
    score
}

fn count_branches(node: Node, parent_is_if: bool, score: &mut u32) {
    match node.kind() {
        // Nested function bodies are scored on their own.
        "function_definition" => return,
        "if_statement"
        | "elif_clause"
        | "for_statement"
        | "while_statement"
        | "except_clause"
        | "with_statement"
        | "assert_statement"
        | "conditional_expression"
        | "for_in_clause"
        | "boolean_operator" => *score += 1,
        // A terminal else adds one, but only under an if: for/while/try
        // carry else clauses of their own that are not decision points.
        "else_clause" if parent_is_if => *score += 1,
        _ => {}
    }

    let is_if = node.kind() == "if_statement";
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        count_branches(child, is_if, score);
    }
}
