//! Core types for smell and security findings.

use serde::{Deserialize, Serialize};

/// Severity of a structural smell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Severity of a security finding. Fixed per rule, never configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Kinds of structural code smells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmellKind {
    LongFunction,
    TooManyParams,
    DeepNesting,
    GodClass,
}

impl SmellKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmellKind::LongFunction => "long_function",
            SmellKind::TooManyParams => "too_many_params",
            SmellKind::DeepNesting => "deep_nesting",
            SmellKind::GodClass => "god_class",
        }
    }
}

impl std::fmt::Display for SmellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kinds of security findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskKind {
    DangerousCall,
    RiskyImport,
    RiskyCall,
    HardcodedSecret,
    ShellInjection,
}

impl RiskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskKind::DangerousCall => "dangerous_call",
            RiskKind::RiskyImport => "risky_import",
            RiskKind::RiskyCall => "risky_call",
            RiskKind::HardcodedSecret => "hardcoded_secret",
            RiskKind::ShellInjection => "shell_injection",
        }
    }
}

impl std::fmt::Display for RiskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One detected structural smell. Produced fresh per scan, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmellFinding {
    pub kind: SmellKind,
    /// Name of the offending function or class.
    pub name: String,
    /// The measured value (lines, parameters, depth or method count).
    pub value: usize,
    /// The threshold that was exceeded.
    pub threshold: usize,
    pub severity: Severity,
    pub message: String,
}

/// One detected security issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityFinding {
    pub kind: RiskKind,
    /// The offending callee, import or assignment target.
    pub subject: String,
    /// Source line (1-indexed).
    pub line: usize,
    pub severity: RiskLevel,
    pub message: String,
}

/// Result of one smell scan over a single source unit.
///
/// Unparsable input never panics the scan: `error` carries the marker and
/// every finding list stays empty. Batch callers own skip/retry policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SmellScan {
    pub long_functions: Vec<SmellFinding>,
    pub too_many_params: Vec<SmellFinding>,
    pub deep_nesting: Vec<SmellFinding>,
    pub god_classes: Vec<SmellFinding>,
    /// Set when the source could not be parsed; findings are empty then.
    pub error: Option<String>,
}

impl SmellScan {
    pub fn parse_failure(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::default()
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SmellFinding> {
        self.long_functions
            .iter()
            .chain(&self.too_many_params)
            .chain(&self.deep_nesting)
            .chain(&self.god_classes)
    }

    pub fn total(&self) -> usize {
        self.iter().count()
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.iter().filter(|f| f.severity == severity).count()
    }

    /// Whether any finding reached error severity.
    pub fn has_errors(&self) -> bool {
        self.iter().any(|f| f.severity == Severity::Error)
    }
}

/// Result of one security scan over a single source unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SecurityScan {
    pub dangerous_calls: Vec<SecurityFinding>,
    pub risky_imports: Vec<SecurityFinding>,
    pub risky_calls: Vec<SecurityFinding>,
    pub hardcoded_secrets: Vec<SecurityFinding>,
    pub shell_injections: Vec<SecurityFinding>,
    /// Set when the source could not be parsed; findings are empty then.
    pub error: Option<String>,
}

impl SecurityScan {
    pub fn parse_failure(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::default()
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SecurityFinding> {
        self.dangerous_calls
            .iter()
            .chain(&self.risky_imports)
            .chain(&self.risky_calls)
            .chain(&self.hardcoded_secrets)
            .chain(&self.shell_injections)
    }

    pub fn total(&self) -> usize {
        self.iter().count()
    }

    pub fn count_by_severity(&self, level: RiskLevel) -> usize {
        self.iter().filter(|f| f.severity == level).count()
    }

    /// Whether any finding reached critical severity.
    pub fn has_critical(&self) -> bool {
        self.iter().any(|f| f.severity == RiskLevel::Critical)
    }

    pub(crate) fn push(&mut self, finding: SecurityFinding) {
        match finding.kind {
            RiskKind::DangerousCall => self.dangerous_calls.push(finding),
            RiskKind::RiskyImport => self.risky_imports.push(finding),
            RiskKind::RiskyCall => self.risky_calls.push(finding),
            RiskKind::HardcodedSecret => self.hardcoded_secrets.push(finding),
            RiskKind::ShellInjection => self.shell_injections.push(finding),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(SmellKind::GodClass.as_str(), "god_class");
        assert_eq!(RiskKind::ShellInjection.as_str(), "shell_injection");
        assert_eq!(
            serde_json::to_string(&SmellKind::LongFunction).unwrap(),
            "\"long_function\""
        );
        assert_eq!(
            serde_json::to_string(&RiskLevel::Critical).unwrap(),
            "\"critical\""
        );
    }

    #[test]
    fn test_scan_counts() {
        let mut scan = SmellScan::default();
        scan.long_functions.push(SmellFinding {
            kind: SmellKind::LongFunction,
            name: "f".to_string(),
            value: 120,
            threshold: 50,
            severity: Severity::Error,
            message: "too long".to_string(),
        });
        scan.too_many_params.push(SmellFinding {
            kind: SmellKind::TooManyParams,
            name: "g".to_string(),
            value: 7,
            threshold: 5,
            severity: Severity::Warning,
            message: "too many".to_string(),
        });

        assert_eq!(scan.total(), 2);
        assert_eq!(scan.count_by_severity(Severity::Warning), 1);
        assert_eq!(scan.count_by_severity(Severity::Error), 1);
        assert!(scan.has_errors());
    }

    #[test]
    fn test_parse_failure_markers() {
        let scan = SecurityScan::parse_failure("syntax error at line 2".to_string());
        assert_eq!(scan.total(), 0);
        assert!(scan.error.is_some());
    }
}
