//! pydrift - structural drift analysis for Python source.
//!
//! pydrift parses a Python source unit into a syntax tree, extracts an
//! immutable structural snapshot (functions, classes, methods, imports,
//! decorators, docstrings, per-function complexity and annotation
//! coverage), diffs two versions of the same file, detects structural code
//! smells against configurable thresholds, and scans for security
//! anti-patterns.
//!
//! # Architecture
//!
//! - `analysis`: tree-sitter parsing, snapshot extraction, complexity
//! - `diff`: set-algebraic structural diffing between two snapshots
//! - `detect`: smell and security detectors over one source unit
//! - `config`: explicit, strongly-typed thresholds and pattern sets
//! - `report`: stable JSON shapes, pretty rendering, change aggregation
//! - `cli`: thin orchestration over files and directories
//!
//! Every engine operation is a synchronous, pure function over immutable
//! inputs. Identity is name-based: renames show up as an unrelated
//! add/remove pair, and "modified" in a diff means only that a name exists
//! on both sides.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod detect;
pub mod diff;
pub mod report;

pub use analysis::{ComplexityLevel, SourceTree, StructuralSnapshot, MODULE_DOC_KEY};
pub use config::{AnalyzerConfig, CompiledSecurityPatterns, SecurityPatterns, SmellThresholds};
pub use detect::{
    scan_security, scan_security_with, scan_smells, RiskKind, RiskLevel, SecurityFinding,
    SecurityScan, Severity, SmellFinding, SmellKind, SmellScan,
};
pub use diff::{diff_sources, StructuralDiff};
pub use report::ChangeReport;

/// Invalid Python source. Surfaced as a distinct, typed outcome from every
/// snapshot-producing entry point; smell and security scans embed it as an
/// explicit error marker instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("syntax error in Python source at line {line}")]
pub struct ParseError {
    /// Line (1-indexed) of the first syntax error.
    pub line: usize,
}

/// Analysis errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A tree-sitter grammar or query failure.
    #[error("grammar error: {0}")]
    Grammar(String),
    /// An invalid configured pattern, rejected at load time.
    #[error("{0}")]
    Pattern(String),
}

/// Parse one source unit and extract its structural snapshot.
pub fn summarize(source: &str) -> Result<StructuralSnapshot, Error> {
    let tree = SourceTree::parse(source)?;
    StructuralSnapshot::extract(&tree)
}
