//! Report aggregation and output formatting.
//!
//! The JSON shapes here are the stable external contract: field names like
//! `added_functions` and `severity_counts` are what downstream tooling
//! keys on. Pretty output follows the terminal layout conventions used
//! across the codebase (two-space indent, colored severity tags).

use std::collections::{BTreeMap, BTreeSet};

use colored::Colorize;
use serde::Serialize;

use crate::analysis::StructuralSnapshot;
use crate::config::AnalyzerConfig;
use crate::detect::{
    scan_security_with, scan_smells, RiskLevel, SecurityFinding, SecurityScan, Severity,
    SmellFinding, SmellScan,
};
use crate::diff::{
    AnnotationChange, ComplexityChange, DecoratorChange, DocstringChange, MethodDelta,
    StructuralDiff,
};
use crate::Error;

/// Severity counters for a smell scan.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SmellCounts {
    pub warning: usize,
    pub error: usize,
}

/// Severity counters for a security scan.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RiskCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
}

/// Stable JSON shape for a structural diff.
#[derive(Serialize)]
pub struct JsonDiff<'a> {
    pub added_functions: &'a BTreeSet<String>,
    pub removed_functions: &'a BTreeSet<String>,
    pub modified_functions: &'a BTreeSet<String>,
    pub added_classes: &'a BTreeSet<String>,
    pub removed_classes: &'a BTreeSet<String>,
    pub modified_classes: &'a BTreeSet<String>,
    pub added_imports: &'a BTreeSet<String>,
    pub removed_imports: &'a BTreeSet<String>,
    pub modified_imports: &'a BTreeSet<String>,
    pub method_changes: &'a BTreeMap<String, MethodDelta>,
    pub decorator_changes: &'a BTreeMap<String, DecoratorChange>,
    pub docstring_changes: &'a BTreeMap<String, DocstringChange>,
    pub complexity_changes: &'a BTreeMap<String, ComplexityChange>,
    pub annotation_changes: &'a BTreeMap<String, AnnotationChange>,
}

impl<'a> From<&'a StructuralDiff> for JsonDiff<'a> {
    fn from(diff: &'a StructuralDiff) -> Self {
        Self {
            added_functions: &diff.functions.added,
            removed_functions: &diff.functions.removed,
            modified_functions: &diff.functions.modified,
            added_classes: &diff.classes.added,
            removed_classes: &diff.classes.removed,
            modified_classes: &diff.classes.modified,
            added_imports: &diff.imports.added,
            removed_imports: &diff.imports.removed,
            modified_imports: &diff.imports.modified,
            method_changes: &diff.method_changes,
            decorator_changes: &diff.decorator_changes,
            docstring_changes: &diff.docstring_changes,
            complexity_changes: &diff.complexity_changes,
            annotation_changes: &diff.annotation_changes,
        }
    }
}

/// Stable JSON shape for a smell scan.
#[derive(Serialize)]
pub struct JsonSmellScan<'a> {
    pub long_functions: &'a [SmellFinding],
    pub too_many_params: &'a [SmellFinding],
    pub deep_nesting: &'a [SmellFinding],
    pub god_classes: &'a [SmellFinding],
    pub total_smells: usize,
    pub severity_counts: SmellCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

impl<'a> From<&'a SmellScan> for JsonSmellScan<'a> {
    fn from(scan: &'a SmellScan) -> Self {
        Self {
            long_functions: &scan.long_functions,
            too_many_params: &scan.too_many_params,
            deep_nesting: &scan.deep_nesting,
            god_classes: &scan.god_classes,
            total_smells: scan.total(),
            severity_counts: SmellCounts {
                warning: scan.count_by_severity(Severity::Warning),
                error: scan.count_by_severity(Severity::Error),
            },
            error: scan.error.as_deref(),
        }
    }
}

/// Stable JSON shape for a security scan.
#[derive(Serialize)]
pub struct JsonSecurityScan<'a> {
    pub dangerous_calls: &'a [SecurityFinding],
    pub risky_imports: &'a [SecurityFinding],
    pub risky_calls: &'a [SecurityFinding],
    pub hardcoded_secrets: &'a [SecurityFinding],
    pub shell_injections: &'a [SecurityFinding],
    pub total_issues: usize,
    pub severity_counts: RiskCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

impl<'a> From<&'a SecurityScan> for JsonSecurityScan<'a> {
    fn from(scan: &'a SecurityScan) -> Self {
        Self {
            dangerous_calls: &scan.dangerous_calls,
            risky_imports: &scan.risky_imports,
            risky_calls: &scan.risky_calls,
            hardcoded_secrets: &scan.hardcoded_secrets,
            shell_injections: &scan.shell_injections,
            total_issues: scan.total(),
            severity_counts: RiskCounts {
                critical: scan.count_by_severity(RiskLevel::Critical),
                high: scan.count_by_severity(RiskLevel::High),
                medium: scan.count_by_severity(RiskLevel::Medium),
            },
            error: scan.error.as_deref(),
        }
    }
}

/// Aggregated result of analyzing one change: the new version's summary,
/// the structural diff, and smell/security scans of the new version.
#[derive(Debug, Clone)]
pub struct ChangeReport {
    pub summary: StructuralSnapshot,
    pub diff: StructuralDiff,
    pub smells: SmellScan,
    pub security: SecurityScan,
}

impl ChangeReport {
    /// Analyze an old/new pair of source versions.
    ///
    /// Fails with a typed parse error when either side is invalid; the
    /// caller decides whether to abort or skip.
    pub fn assemble(old: &str, new: &str, config: &AnalyzerConfig) -> Result<Self, Error> {
        let diff = crate::diff::diff_sources(old, new)?;
        let summary = crate::summarize(new)?;
        let smells = scan_smells(new, &config.smells);
        let security = scan_security_with(new, &config.security)?;
        Ok(Self {
            summary,
            diff,
            smells,
            security,
        })
    }

    /// Whether the change carries findings that should gate a commit:
    /// error-severity smells or critical security issues.
    pub fn has_blockers(&self) -> bool {
        self.smells.has_errors() || self.security.has_critical()
    }
}

#[derive(Serialize)]
struct JsonChangeReport<'a> {
    summary: &'a StructuralSnapshot,
    diff: JsonDiff<'a>,
    smells: JsonSmellScan<'a>,
    security: JsonSecurityScan<'a>,
}

pub fn render_summary_json(snapshot: &StructuralSnapshot) -> serde_json::Result<String> {
    serde_json::to_string_pretty(snapshot)
}

pub fn render_diff_json(diff: &StructuralDiff) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonDiff::from(diff))
}

pub fn render_smells_json(scan: &SmellScan) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonSmellScan::from(scan))
}

pub fn render_security_json(scan: &SecurityScan) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonSecurityScan::from(scan))
}

pub fn render_report_json(report: &ChangeReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonChangeReport {
        summary: &report.summary,
        diff: JsonDiff::from(&report.diff),
        smells: JsonSmellScan::from(&report.smells),
        security: JsonSecurityScan::from(&report.security),
    })
}

// =============================================================================
// Pretty format
// =============================================================================

/// Print a single-version summary.
pub fn write_summary_pretty(snapshot: &StructuralSnapshot) {
    println!();
    println!("  {}", "Summary".bold());
    println!();
    write_name_list("Functions", &snapshot.functions);
    write_name_list("Classes", &snapshot.classes);
    write_name_list("Imports", &snapshot.imports);

    if !snapshot.complexity.is_empty() {
        println!("  {}:", "Complexity".bold());
        for (name, score) in &snapshot.complexity {
            let level = crate::analysis::ComplexityLevel::from_score(*score);
            println!("    {:<30} {:>3}  {}", name, score, colored_level(level));
        }
        println!();
    }

    if !snapshot.decorators.is_empty() {
        println!("  {}:", "Decorators".bold());
        for (name, decs) in &snapshot.decorators {
            println!("    {:<30} {}", name, decs.join(" ").dimmed());
        }
        println!();
    }
}

/// Print a structural diff.
pub fn write_diff_pretty(diff: &StructuralDiff) {
    println!();
    if diff.is_empty() {
        println!("  {}", "no structural changes".dimmed());
        return;
    }

    write_set_changes("Functions", &diff.functions.added, &diff.functions.removed);
    write_set_changes("Classes", &diff.classes.added, &diff.classes.removed);
    write_set_changes("Imports", &diff.imports.added, &diff.imports.removed);

    if !diff.method_changes.is_empty() {
        println!("  {}:", "Method changes".bold());
        for (class, delta) in &diff.method_changes {
            for m in &delta.added {
                println!("    {} {}.{}", "+".green(), class, m);
            }
            for m in &delta.removed {
                println!("    {} {}.{}", "-".red(), class, m);
            }
        }
        println!();
    }

    if !diff.complexity_changes.is_empty() {
        println!("  {}:", "Complexity changes".bold());
        for (name, change) in &diff.complexity_changes {
            let old = change
                .old
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            let new = change
                .new
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            let delta = match change.delta {
                Some(d) if d > 0 => format!("+{}", d).red().to_string(),
                Some(d) if d < 0 => d.to_string().green().to_string(),
                _ => String::new(),
            };
            println!(
                "    {:<30} {} -> {}  {}  {}",
                name,
                old,
                new,
                delta,
                colored_level(change.level)
            );
        }
        println!();
    }

    if !diff.decorator_changes.is_empty() {
        println!("  {}:", "Decorator changes".bold());
        for (name, change) in &diff.decorator_changes {
            for d in &change.added {
                println!("    {} {} {}", "+".green(), name, d);
            }
            for d in &change.removed {
                println!("    {} {} {}", "-".red(), name, d);
            }
        }
        println!();
    }

    if !diff.docstring_changes.is_empty() {
        println!("  {}:", "Docstring changes".bold());
        for name in diff.docstring_changes.keys() {
            println!("    {}", name);
        }
        println!();
    }

    if !diff.annotation_changes.is_empty() {
        println!("  {}:", "Annotation coverage changes".bold());
        for (name, change) in &diff.annotation_changes {
            let old = change
                .old
                .map(|v| format!("{:.1}%", v))
                .unwrap_or_else(|| "-".to_string());
            let new = change
                .new
                .map(|v| format!("{:.1}%", v))
                .unwrap_or_else(|| "-".to_string());
            println!("    {:<30} {} -> {}", name, old, new);
        }
        println!();
    }
}

/// Print a smell scan.
pub fn write_smells_pretty(scan: &SmellScan) {
    println!();
    if let Some(error) = &scan.error {
        println!("  {} {}", "ERROR".red(), error);
        return;
    }
    if scan.total() == 0 {
        println!("  {}", "no smells detected".green());
        return;
    }

    println!("  {} ({}):", "Smells".bold(), scan.total());
    println!();
    for finding in scan.iter() {
        write_smell_tag(finding.severity);
        print!("   {:<18}", finding.kind.as_str().dimmed());
        println!("{}", finding.message);
    }
    println!();
    println!(
        "  {} {} warnings, {} errors",
        "Totals:".dimmed(),
        scan.count_by_severity(Severity::Warning),
        scan.count_by_severity(Severity::Error)
    );
}

/// Print a security scan.
pub fn write_security_pretty(scan: &SecurityScan) {
    println!();
    if let Some(error) = &scan.error {
        println!("  {} {}", "ERROR".red(), error);
        return;
    }
    if scan.total() == 0 {
        println!("  {}", "no security findings".green());
        return;
    }

    println!("  {} ({}):", "Security findings".bold(), scan.total());
    println!();
    for finding in scan.iter() {
        write_risk_tag(finding.severity);
        print!("   {:<18}", finding.kind.as_str().dimmed());
        print!("{}", format!("line {}", finding.line).blue());
        println!("  {}", finding.message);
    }
    println!();
    println!(
        "  {} {} critical, {} high, {} medium",
        "Totals:".dimmed(),
        scan.count_by_severity(RiskLevel::Critical),
        scan.count_by_severity(RiskLevel::High),
        scan.count_by_severity(RiskLevel::Medium)
    );
}

/// Print a full change report.
pub fn write_report_pretty(report: &ChangeReport) {
    write_diff_pretty(&report.diff);
    write_smells_pretty(&report.smells);
    write_security_pretty(&report.security);

    println!();
    if report.has_blockers() {
        println!("  {}", "BLOCKING FINDINGS PRESENT".red().bold());
    } else {
        println!("  {}", "no blocking findings".green());
    }
}

fn write_name_list(title: &str, names: &BTreeSet<String>) {
    println!("  {} ({}):", title.bold(), names.len());
    for name in names {
        println!("    {}", name);
    }
    println!();
}

fn write_set_changes(title: &str, added: &BTreeSet<String>, removed: &BTreeSet<String>) {
    if added.is_empty() && removed.is_empty() {
        return;
    }
    println!("  {}:", title.bold());
    for name in added {
        println!("    {} {}", "+".green(), name);
    }
    for name in removed {
        println!("    {} {}", "-".red(), name);
    }
    println!();
}

fn write_smell_tag(severity: Severity) {
    match severity {
        Severity::Error => print!("    {} ", "ERROR".red()),
        Severity::Warning => print!("    {} ", "WARN ".yellow()),
    }
}

fn write_risk_tag(level: RiskLevel) {
    match level {
        RiskLevel::Critical => print!("    {} ", "CRIT ".red().bold()),
        RiskLevel::High => print!("    {} ", "HIGH ".red()),
        RiskLevel::Medium => print!("    {} ", "MED  ".yellow()),
    }
}

fn colored_level(level: crate::analysis::ComplexityLevel) -> String {
    use crate::analysis::ComplexityLevel;
    match level {
        ComplexityLevel::Low => "low".green().to_string(),
        ComplexityLevel::Medium => "medium".yellow().to_string(),
        ComplexityLevel::High => "high".red().to_string(),
        ComplexityLevel::Critical => "critical".red().bold().to_string(),
    }
}
