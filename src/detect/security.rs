//! Detection of security anti-patterns.
//!
//! A single forward traversal walks the tree in document order, building an
//! import alias table as it goes and matching calls, imports and
//! assignments against a [`CompiledSecurityPatterns`] set. An alias used
//! before its defining import statement does not resolve; the original
//! analyzer had the same order dependence and it is kept here.

use std::collections::HashMap;

use tree_sitter::Node;

use crate::analysis::{string_content, SourceTree};
use crate::config::{CompiledSecurityPatterns, SecurityPatterns};
use crate::Error;

use super::{RiskKind, RiskLevel, SecurityFinding, SecurityScan};

/// Minimum cooked length of a string literal before it is treated as a
/// credential value. Shorter strings are almost always placeholders.
const MIN_SECRET_LEN: usize = 5;

/// Scan one source unit against a compiled pattern set.
///
/// Never panics on malformed input: a syntax error yields a scan whose
/// `error` marker is set and whose finding lists are empty.
pub fn scan_security(source: &str, patterns: &CompiledSecurityPatterns) -> SecurityScan {
    let tree = match SourceTree::parse(source) {
        Ok(tree) => tree,
        Err(e) => return SecurityScan::parse_failure(e.to_string()),
    };
    if let Err(e) = tree.require_valid() {
        return SecurityScan::parse_failure(e.to_string());
    }

    let mut visitor = SecurityVisitor {
        tree: &tree,
        patterns,
        aliases: HashMap::new(),
        scan: SecurityScan::default(),
    };
    visitor.visit(tree.root());
    visitor.scan
}

/// Scan with a pattern set that still needs compiling. Fails only on an
/// invalid pattern, which is a configuration error rather than a scan
/// result.
pub fn scan_security_with(source: &str, patterns: &SecurityPatterns) -> Result<SecurityScan, Error> {
    let compiled = patterns.compile()?;
    Ok(scan_security(source, &compiled))
}

struct SecurityVisitor<'a> {
    tree: &'a SourceTree,
    patterns: &'a CompiledSecurityPatterns,
    /// local name -> imported path, filled during the forward walk.
    aliases: HashMap<String, String>,
    scan: SecurityScan,
}

impl<'a> SecurityVisitor<'a> {
    fn visit(&mut self, node: Node) {
        match node.kind() {
            "import_statement" => self.track_import(node),
            "import_from_statement" => self.track_import_from(node),
            "call" => self.check_call(node),
            "assignment" => self.check_assignment(node),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child);
        }
    }

    /// `import M` / `import M as A`: record the local binding.
    fn track_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        for name_node in node.children_by_field_name("name", &mut cursor) {
            match name_node.kind() {
                "dotted_name" => {
                    let module = self.tree.node_text(name_node).to_string();
                    self.aliases.insert(module.clone(), module);
                }
                "aliased_import" => {
                    let real = name_node
                        .child_by_field_name("name")
                        .map(|n| self.tree.node_text(n).to_string());
                    let alias = name_node
                        .child_by_field_name("alias")
                        .map(|n| self.tree.node_text(n).to_string());
                    if let (Some(real), Some(alias)) = (real, alias) {
                        self.aliases.insert(alias, real);
                    }
                }
                _ => {}
            }
        }
    }

    /// `from M import N [as A]`: record bindings and flag risky imports.
    fn track_import_from(&mut self, node: Node) {
        let module = match node.child_by_field_name("module_name") {
            Some(m) => self
                .tree
                .node_text(m)
                .trim_start_matches('.')
                .to_string(),
            None => return,
        };
        // Relative imports with no explicit module carry no risk mapping.
        if module.is_empty() {
            return;
        }

        let line = node.start_position().row + 1;
        let risky = self.patterns.risky_functions(&module);

        let mut imported: Vec<(String, Option<String>)> = Vec::new();
        let mut cursor = node.walk();
        for name_node in node.children_by_field_name("name", &mut cursor) {
            match name_node.kind() {
                "dotted_name" => {
                    imported.push((self.tree.node_text(name_node).to_string(), None));
                }
                "aliased_import" => {
                    let real = name_node
                        .child_by_field_name("name")
                        .map(|n| self.tree.node_text(n).to_string());
                    let alias = name_node
                        .child_by_field_name("alias")
                        .map(|n| self.tree.node_text(n).to_string());
                    if let Some(real) = real {
                        imported.push((real, alias));
                    }
                }
                _ => {}
            }
        }

        let mut cursor = node.walk();
        if node
            .named_children(&mut cursor)
            .any(|n| n.kind() == "wildcard_import")
        {
            imported.push(("*".to_string(), None));
        }

        for (real, alias) in imported {
            let local = alias.unwrap_or_else(|| real.clone());
            self.aliases
                .insert(local, format!("{}.{}", module, real));

            if let Some(risky_funcs) = risky {
                if risky_funcs.contains(&real) || real == "*" {
                    self.scan.push(SecurityFinding {
                        kind: RiskKind::RiskyImport,
                        subject: format!("{}.{}", module, real),
                        line,
                        severity: RiskLevel::High,
                        message: format!(
                            "risky import {}.{}: deserialization or process-spawn entry point",
                            module, real
                        ),
                    });
                }
            }
        }
    }

    fn check_call(&mut self, node: Node) {
        let callee = match node.child_by_field_name("function") {
            Some(f) => dotted_name(self.tree, f),
            None => return,
        };
        if callee.is_empty() {
            return;
        }
        let line = node.start_position().row + 1;

        if !callee.contains('.') && self.patterns.is_dangerous_call(&callee) {
            self.scan.push(SecurityFinding {
                kind: RiskKind::DangerousCall,
                subject: callee.clone(),
                line,
                severity: RiskLevel::Critical,
                message: format!("call to {}() allows dynamic code execution", callee),
            });
        }

        if let Some((module, method)) = split_dotted(&callee) {
            let resolved = self
                .aliases
                .get(module)
                .map(String::as_str)
                .unwrap_or(module);
            let root = resolved.split('.').next().unwrap_or(resolved);
            if let Some(risky_funcs) = self.patterns.risky_functions(root) {
                if risky_funcs.contains(method) {
                    self.scan.push(SecurityFinding {
                        kind: RiskKind::RiskyCall,
                        subject: callee.clone(),
                        line,
                        severity: RiskLevel::High,
                        message: format!("risky call to {}()", callee),
                    });
                }
            }
        }

        if self.patterns.is_shell_callee(&callee) && self.has_truthy_shell_flag(node) {
            self.scan.push(SecurityFinding {
                kind: RiskKind::ShellInjection,
                subject: callee.clone(),
                line,
                severity: RiskLevel::Critical,
                message: format!(
                    "call to {}() with {}=True enables command injection",
                    callee,
                    self.patterns.shell_keyword()
                ),
            });
        }
    }

    fn has_truthy_shell_flag(&self, call: Node) -> bool {
        let Some(args) = call.child_by_field_name("arguments") else {
            return false;
        };
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            if arg.kind() != "keyword_argument" {
                continue;
            }
            let name = arg
                .child_by_field_name("name")
                .map(|n| self.tree.node_text(n))
                .unwrap_or("");
            if name != self.patterns.shell_keyword() {
                continue;
            }
            if let Some(value) = arg.child_by_field_name("value") {
                return value.kind() == "true";
            }
        }
        false
    }

    /// `NAME = "literal"`: flag identifiers that look like secret names.
    /// Computed and formatted values are a known false negative.
    fn check_assignment(&mut self, node: Node) {
        // Annotated assignments carry a type field; the original analyzer
        // only looked at plain assignments.
        if node.child_by_field_name("type").is_some() {
            return;
        }
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = self.tree.node_text(left);
        if !self.patterns.matches_secret_name(name) {
            return;
        }

        let Some(right) = node.child_by_field_name("right") else {
            return;
        };
        if right.kind() != "string" {
            return;
        }
        let mut cursor = right.walk();
        if right
            .named_children(&mut cursor)
            .any(|n| n.kind() == "interpolation")
        {
            return;
        }
        if string_content(self.tree, right).chars().count() <= MIN_SECRET_LEN {
            return;
        }

        self.scan.push(SecurityFinding {
            kind: RiskKind::HardcodedSecret,
            subject: name.to_string(),
            line: node.start_position().row + 1,
            severity: RiskLevel::Critical,
            message: format!("hardcoded secret assigned to '{}'", name),
        });
    }
}

/// Render a callee expression as a dotted name. Unresolvable segments
/// (calls, subscripts) collapse: `foo().bar` renders as `bar`, matching
/// the original resolver.
fn dotted_name(tree: &SourceTree, node: Node) -> String {
    match node.kind() {
        "identifier" => tree.node_text(node).to_string(),
        "attribute" => {
            let attr = node
                .child_by_field_name("attribute")
                .map(|n| tree.node_text(n))
                .unwrap_or("");
            let base = node
                .child_by_field_name("object")
                .map(|o| dotted_name(tree, o))
                .unwrap_or_default();
            if base.is_empty() {
                attr.to_string()
            } else {
                format!("{}.{}", base, attr)
            }
        }
        _ => String::new(),
    }
}

/// Split a dotted callee into its first component and final attribute.
fn split_dotted(callee: &str) -> Option<(&str, &str)> {
    let first = callee.split('.').next()?;
    let last = callee.rsplit('.').next()?;
    if first == callee {
        None
    } else {
        Some((first, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityPatterns;

    fn scan(source: &str) -> SecurityScan {
        let compiled = SecurityPatterns::default().compile().unwrap();
        scan_security(source, &compiled)
    }

    #[test]
    fn test_eval_and_exec_are_critical() {
        let src = "\
def vulnerable(user_input):
    result = eval(user_input)
    exec(user_input)
    return result
";
        let result = scan(src);
        assert_eq!(result.dangerous_calls.len(), 2);
        for finding in &result.dangerous_calls {
            assert_eq!(finding.severity, RiskLevel::Critical);
            assert_eq!(finding.kind, RiskKind::DangerousCall);
        }
        assert_eq!(result.dangerous_calls[0].subject, "eval");
        assert_eq!(result.dangerous_calls[0].line, 2);
    }

    #[test]
    fn test_risky_import_flagged_high() {
        let src = "from subprocess import call\n";
        let result = scan(src);
        assert_eq!(result.risky_imports.len(), 1);
        assert_eq!(result.risky_imports[0].subject, "subprocess.call");
        assert_eq!(result.risky_imports[0].severity, RiskLevel::High);
    }

    #[test]
    fn test_plain_import_not_flagged() {
        let result = scan("import pickle\n");
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_risky_call_via_module() {
        let src = "\
import pickle

def load(data):
    return pickle.loads(data)
";
        let result = scan(src);
        assert_eq!(result.risky_calls.len(), 1);
        assert_eq!(result.risky_calls[0].subject, "pickle.loads");
        assert_eq!(result.risky_calls[0].severity, RiskLevel::High);
    }

    #[test]
    fn test_risky_call_via_alias() {
        let src = "\
import pickle as pk

def deserialize(data):
    return pk.loads(data)
";
        let result = scan(src);
        assert_eq!(result.risky_calls.len(), 1);
        assert_eq!(result.risky_calls[0].subject, "pk.loads");
    }

    #[test]
    fn test_alias_used_before_import_does_not_resolve() {
        let src = "\
def early(data):
    return pk.loads(data)

import pickle as pk
";
        let result = scan(src);
        assert!(result.risky_calls.is_empty());
    }

    #[test]
    fn test_shell_injection_exactly_one_finding() {
        let src = "\
import subprocess

def run_it(cmd):
    subprocess.call(cmd, shell=True)
";
        let result = scan(src);
        assert_eq!(result.shell_injections.len(), 1);
        let finding = &result.shell_injections[0];
        assert_eq!(finding.kind, RiskKind::ShellInjection);
        assert_eq!(finding.severity, RiskLevel::Critical);
        assert_eq!(finding.line, 4);
        // the call itself is also a risky subprocess entry point
        assert_eq!(result.risky_calls.len(), 1);
    }

    #[test]
    fn test_shell_false_and_default_are_safe() {
        let src = "\
import subprocess

def safe():
    subprocess.run([\"ls\", \"-la\"], shell=False)
    subprocess.call([\"echo\", \"hello\"])
";
        let result = scan(src);
        assert!(result.shell_injections.is_empty());
    }

    #[test]
    fn test_hardcoded_secrets() {
        let src = "\
API_KEY = \"sk-1234567890abcdef\"
PASSWORD = \"super_secret_123\"
short_pwd = \"abc\"
hostname = \"db.internal.example\"
";
        let result = scan(src);
        assert_eq!(result.hardcoded_secrets.len(), 2);
        let subjects: Vec<&str> = result
            .hardcoded_secrets
            .iter()
            .map(|f| f.subject.as_str())
            .collect();
        assert!(subjects.contains(&"API_KEY"));
        assert!(subjects.contains(&"PASSWORD"));
        for finding in &result.hardcoded_secrets {
            assert_eq!(finding.severity, RiskLevel::Critical);
        }
    }

    #[test]
    fn test_f_string_secret_is_a_known_false_negative() {
        let src = "api_key = f\"sk-{env}-abc123def456\"\n";
        let result = scan(src);
        assert!(result.hardcoded_secrets.is_empty());
    }

    #[test]
    fn test_empty_source() {
        let result = scan("");
        assert_eq!(result.total(), 0);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_syntax_error_yields_marker() {
        let result = scan("def broken(\n");
        assert!(result.error.is_some());
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_comprehensive_scan_counts() {
        let src = "\
import pickle
from subprocess import call
import os

API_KEY = \"sk-1234567890abcdef\"

def vulnerable(user_input):
    result = eval(user_input)
    data = pickle.loads(user_input)
    os.system(user_input)
    call(user_input, shell=True)
    return result, data
";
        let result = scan(src);
        assert_eq!(result.dangerous_calls.len(), 1);
        assert_eq!(result.risky_imports.len(), 1);
        // pickle.loads and os.system; bare call() has no module part
        assert_eq!(result.risky_calls.len(), 2);
        assert_eq!(result.hardcoded_secrets.len(), 1);
        assert_eq!(result.shell_injections.len(), 1);
        assert_eq!(result.total(), 6);
        assert_eq!(result.count_by_severity(RiskLevel::Critical), 3);
        assert_eq!(result.count_by_severity(RiskLevel::High), 3);
        assert!(result.has_critical());
    }

    #[test]
    fn test_safe_code_zero_issues() {
        let src = "\
import json

def safe_function(data):
    \"\"\"Completely safe code\"\"\"
    return json.loads(data)
";
        let result = scan(src);
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_chained_attribute_with_call_base() {
        // foo().run resolves to bare `run`, which is in the shell callee
        // set but carries no shell flag here
        let src = "def f(x):\n    return x.factory().run(x)\n";
        let result = scan(src);
        assert_eq!(result.total(), 0);
    }
}
