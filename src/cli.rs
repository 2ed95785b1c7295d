//! Command-line interface for pydrift.
//!
//! The CLI is a thin orchestration layer: it reads source text from disk,
//! routes it through the analysis engine and renders the structured result.
//! Exit codes: 0 = clean, 1 = findings present, 2 = operational error.

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::AnalyzerConfig;
use crate::detect::{scan_security, scan_smells, SecurityScan, SmellScan};
use crate::report;

/// Exit codes.
pub const EXIT_CLEAN: i32 = 0;
pub const EXIT_FINDINGS: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Structural drift analyzer for Python source.
///
/// pydrift extracts structural snapshots from Python files, diffs two
/// versions of a file, scores cyclomatic complexity, and scans for code
/// smells and security anti-patterns.
#[derive(Parser)]
#[command(name = "pydrift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize the structure of one Python file
    Summary(SummaryArgs),
    /// Diff two versions of a Python file
    Diff(PairArgs),
    /// Scan a file or directory for structural code smells
    Smells(ScanArgs),
    /// Scan a file or directory for security anti-patterns
    Security(ScanArgs),
    /// Full change report: diff plus smell and security scans
    Report(PairArgs),
}

#[derive(Parser)]
pub struct SummaryArgs {
    /// Python file to summarize
    pub file: PathBuf,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

#[derive(Parser)]
pub struct PairArgs {
    /// Old version of the file
    pub old: PathBuf,
    /// New version of the file
    pub new: PathBuf,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Path to an analyzer configuration YAML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Parser)]
pub struct ScanArgs {
    /// Python file or directory to scan
    pub path: PathBuf,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Path to an analyzer configuration YAML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

fn validate_format(format: &str) -> Option<i32> {
    if format != "pretty" && format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            format
        );
        return Some(EXIT_ERROR);
    }
    None
}

fn load_config(path: &Option<PathBuf>) -> anyhow::Result<AnalyzerConfig> {
    match path {
        Some(p) => AnalyzerConfig::parse_file(p),
        None => Ok(AnalyzerConfig::default()),
    }
}

/// Collect Python files under a root, skipping hidden directories.
fn collect_py_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(e.file_type().is_dir() && name.starts_with('.'))
        })
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("py") {
                files.push(path.to_path_buf());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Resolve a scan target into the list of files to analyze.
fn scan_targets(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(path)?;
    if metadata.is_dir() {
        collect_py_files(path)
    } else {
        Ok(vec![path.to_path_buf()])
    }
}

/// Run the summary command.
pub fn run_summary(args: &SummaryArgs) -> anyhow::Result<i32> {
    if let Some(code) = validate_format(&args.format) {
        return Ok(code);
    }

    let source = std::fs::read_to_string(&args.file)?;
    let snapshot = match crate::summarize(&source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}: {}", args.file.display(), e);
            return Ok(EXIT_ERROR);
        }
    };

    if args.format == "json" {
        println!("{}", report::render_summary_json(&snapshot)?);
    } else {
        report::write_summary_pretty(&snapshot);
    }
    Ok(EXIT_CLEAN)
}

/// Run the diff command.
pub fn run_diff(args: &PairArgs) -> anyhow::Result<i32> {
    if let Some(code) = validate_format(&args.format) {
        return Ok(code);
    }

    let old = std::fs::read_to_string(&args.old)?;
    let new = std::fs::read_to_string(&args.new)?;
    let diff = match crate::diff::diff_sources(&old, &new) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if args.format == "json" {
        println!("{}", report::render_diff_json(&diff)?);
    } else {
        report::write_diff_pretty(&diff);
    }
    Ok(EXIT_CLEAN)
}

/// Run the smells command over a file or directory.
///
/// Files are analyzed independently; one file's parse error is reported
/// inline and never blocks the rest of the batch.
pub fn run_smells(args: &ScanArgs) -> anyhow::Result<i32> {
    if let Some(code) = validate_format(&args.format) {
        return Ok(code);
    }
    let config = load_config(&args.config)?;
    let files = scan_targets(&args.path)?;

    let scans: Vec<(PathBuf, SmellScan)> = files
        .par_iter()
        .map(|path| {
            log::debug!("scanning {} for smells", path.display());
            let scan = match std::fs::read_to_string(path) {
                Ok(source) => scan_smells(&source, &config.smells),
                Err(e) => SmellScan::parse_failure(format!("cannot read file: {}", e)),
            };
            (path.clone(), scan)
        })
        .collect();

    let any_findings = scans.iter().any(|(_, scan)| scan.total() > 0);

    if args.format == "json" {
        let mut by_file = serde_json::Map::new();
        for (path, scan) in &scans {
            by_file.insert(
                path.display().to_string(),
                serde_json::to_value(report::JsonSmellScan::from(scan))?,
            );
        }
        println!("{}", serde_json::to_string_pretty(&by_file)?);
    } else {
        for (path, scan) in &scans {
            println!("{}", path.display());
            report::write_smells_pretty(scan);
        }
    }

    Ok(if any_findings { EXIT_FINDINGS } else { EXIT_CLEAN })
}

/// Run the security command over a file or directory.
pub fn run_security(args: &ScanArgs) -> anyhow::Result<i32> {
    if let Some(code) = validate_format(&args.format) {
        return Ok(code);
    }
    let config = load_config(&args.config)?;
    // Pattern problems are configuration errors and fail up front,
    // before any file is touched.
    let compiled = config.security.compile()?;
    let files = scan_targets(&args.path)?;

    let scans: Vec<(PathBuf, SecurityScan)> = files
        .par_iter()
        .map(|path| {
            log::debug!("scanning {} for security findings", path.display());
            let scan = match std::fs::read_to_string(path) {
                Ok(source) => scan_security(&source, &compiled),
                Err(e) => SecurityScan::parse_failure(format!("cannot read file: {}", e)),
            };
            (path.clone(), scan)
        })
        .collect();

    let any_findings = scans.iter().any(|(_, scan)| scan.total() > 0);

    if args.format == "json" {
        let mut by_file = serde_json::Map::new();
        for (path, scan) in &scans {
            by_file.insert(
                path.display().to_string(),
                serde_json::to_value(report::JsonSecurityScan::from(scan))?,
            );
        }
        println!("{}", serde_json::to_string_pretty(&by_file)?);
    } else {
        for (path, scan) in &scans {
            println!("{}", path.display());
            report::write_security_pretty(scan);
        }
    }

    Ok(if any_findings { EXIT_FINDINGS } else { EXIT_CLEAN })
}

/// Run the full change report.
pub fn run_report(args: &PairArgs) -> anyhow::Result<i32> {
    if let Some(code) = validate_format(&args.format) {
        return Ok(code);
    }
    let config = load_config(&args.config)?;

    let old = std::fs::read_to_string(&args.old)?;
    let new = std::fs::read_to_string(&args.new)?;

    let change = match report::ChangeReport::assemble(&old, &new, &config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if args.format == "json" {
        println!("{}", report::render_report_json(&change)?);
    } else {
        report::write_report_pretty(&change);
    }

    Ok(if change.has_blockers() {
        EXIT_FINDINGS
    } else {
        EXIT_CLEAN
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_py_files_skips_hidden_dirs() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.py"), "x = 1\n").unwrap();
        fs::write(temp.path().join("notes.txt"), "ignore\n").unwrap();
        fs::create_dir(temp.path().join(".venv")).unwrap();
        fs::write(temp.path().join(".venv").join("b.py"), "x = 2\n").unwrap();

        let files = collect_py_files(temp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.py"));
    }

    #[test]
    fn test_batch_smell_scan_survives_broken_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("good.py"), "def ok(): pass\n").unwrap();
        fs::write(temp.path().join("bad.py"), "def broken(\n").unwrap();

        let args = ScanArgs {
            path: temp.path().to_path_buf(),
            format: "json".to_string(),
            config: None,
        };
        // the batch completes despite the parse error in bad.py
        let code = run_smells(&args).unwrap();
        assert_eq!(code, EXIT_CLEAN);
    }

    #[test]
    fn test_security_scan_exit_code_on_findings() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("risky.py"),
            "import subprocess\nsubprocess.run(cmd, shell=True)\n",
        )
        .unwrap();

        let args = ScanArgs {
            path: temp.path().to_path_buf(),
            format: "json".to_string(),
            config: None,
        };
        let code = run_security(&args).unwrap();
        assert_eq!(code, EXIT_FINDINGS);
    }

    #[test]
    fn test_invalid_format_rejected() {
        let args = SummaryArgs {
            file: PathBuf::from("whatever.py"),
            format: "xml".to_string(),
        };
        assert_eq!(run_summary(&args).unwrap(), EXIT_ERROR);
    }
}
