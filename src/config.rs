//! Analyzer configuration.
//!
//! All thresholds and pattern sets live in explicit, strongly-typed values
//! that are constructed once and passed into every detector. Nothing is
//! read from ambient or global state, and unrecognized keys in a config
//! file are rejected at load time.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Thresholds for the structural smell detectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmellThresholds {
    /// Maximum function length in lines before flagging.
    pub long_function_lines: usize,
    /// Maximum named parameters (receiver excluded) before flagging.
    pub too_many_params: usize,
    /// Maximum nesting depth before flagging.
    pub deep_nesting_level: usize,
    /// Maximum direct methods per class before flagging.
    pub god_class_methods: usize,
}

impl Default for SmellThresholds {
    fn default() -> Self {
        Self {
            long_function_lines: 50,
            too_many_params: 5,
            deep_nesting_level: 4,
            god_class_methods: 20,
        }
    }
}

/// Pattern sets for the security scanner.
///
/// `secret_patterns` are regexes matched case-insensitively against the
/// start of assignment target identifiers (the patterns themselves carry
/// `(?i)`). They are validated by [`SecurityPatterns::compile`]; a bad
/// pattern fails configuration loading, never a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityPatterns {
    /// Bare callee names that enable dynamic evaluation or dynamic
    /// attribute access.
    pub dangerous_calls: BTreeSet<String>,
    /// Risky module -> function-name sets (deserialization and process
    /// spawning entry points).
    pub risky_modules: BTreeMap<String, BTreeSet<String>>,
    /// Secret-name regexes for hardcoded-credential detection.
    pub secret_patterns: Vec<String>,
    /// Callee names subject to the shell-flag rule.
    pub shell_callees: BTreeSet<String>,
    /// Keyword argument that switches a spawn call to shell interpretation.
    pub shell_keyword: String,
}

impl Default for SecurityPatterns {
    fn default() -> Self {
        let dangerous_calls = [
            "eval",
            "exec",
            "compile",
            "__import__",
            "getattr",
            "setattr",
            "delattr",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let risky_modules = [
            ("pickle", &["load", "loads", "Unpickler"][..]),
            ("marshal", &["load", "loads"][..]),
            ("shelve", &["open"][..]),
            (
                "subprocess",
                &["call", "run", "Popen", "check_output", "check_call"][..],
            ),
            ("os", &["system", "popen", "spawn", "exec"][..]),
            ("commands", &["getoutput", "getstatusoutput"][..]),
        ]
        .into_iter()
        .map(|(module, funcs)| {
            (
                module.to_string(),
                funcs.iter().map(|f| f.to_string()).collect(),
            )
        })
        .collect();

        let secret_patterns = [
            r"(?i)(api[_-]?key|apikey)",
            r"(?i)(secret[_-]?key|secretkey)",
            r"(?i)(password|passwd|pwd)",
            r"(?i)(token|auth[_-]?token)",
            r"(?i)(private[_-]?key)",
            r"(?i)(access[_-]?key)",
            r"(?i)(credentials?)",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let shell_callees = [
            "subprocess.call",
            "subprocess.run",
            "subprocess.Popen",
            "call",
            "run",
            "Popen",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            dangerous_calls,
            risky_modules,
            secret_patterns,
            shell_callees,
            shell_keyword: "shell".to_string(),
        }
    }
}

impl SecurityPatterns {
    /// Validate and compile the secret regexes.
    pub fn compile(&self) -> Result<CompiledSecurityPatterns, Error> {
        let mut secret_regexes = Vec::with_capacity(self.secret_patterns.len());
        for pattern in &self.secret_patterns {
            let regex = Regex::new(pattern)
                .map_err(|e| Error::Pattern(format!("invalid secret pattern {:?}: {}", pattern, e)))?;
            secret_regexes.push(regex);
        }
        Ok(CompiledSecurityPatterns {
            patterns: self.clone(),
            secret_regexes,
        })
    }
}

/// A [`SecurityPatterns`] value with its secret regexes compiled.
#[derive(Debug, Clone)]
pub struct CompiledSecurityPatterns {
    patterns: SecurityPatterns,
    secret_regexes: Vec<Regex>,
}

impl CompiledSecurityPatterns {
    pub fn is_dangerous_call(&self, name: &str) -> bool {
        self.patterns.dangerous_calls.contains(name)
    }

    pub fn risky_functions(&self, module: &str) -> Option<&BTreeSet<String>> {
        self.patterns.risky_modules.get(module)
    }

    pub fn is_shell_callee(&self, name: &str) -> bool {
        self.patterns.shell_callees.contains(name)
    }

    pub fn shell_keyword(&self) -> &str {
        &self.patterns.shell_keyword
    }

    /// Whether an identifier looks like a secret name. Matches at the start
    /// of the identifier only.
    pub fn matches_secret_name(&self, identifier: &str) -> bool {
        self.secret_regexes
            .iter()
            .any(|re| re.find(identifier).map_or(false, |m| m.start() == 0))
    }
}

/// Full analyzer configuration: smell thresholds plus security patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    pub smells: SmellThresholds,
    pub security: SecurityPatterns,
}

impl AnalyzerConfig {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: AnalyzerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}
