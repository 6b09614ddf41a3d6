//! # Report Generation Module
//!
//! @title Annotation Report Generator
//! @author Ramprasad
//!
//! Classifies raw model output into line findings and renders the results of
//! a scan as terminal output, JSON, Markdown or GitHub annotations.
//!
//! ## Key Types
//!
//! - [`Report`] - Results of one scan over one or more files
//! - [`LineFinding`] - One annotation on one source line
//! - [`Severity`] - Severity bucket of a finding

mod finding;
mod formatter;
mod merge;

pub use finding::{example_findings, LineFinding, Severity};
pub use formatter::{to_github_annotations, to_markdown};
pub use merge::{build_candidates, classify, classify_findings, merge};

use crate::parser::Language;
use colored::*;
use serde::Serialize;
use std::path::PathBuf;

/// Results of one scan.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Metadata about the scan operation.
    pub metadata: ReportMetadata,

    /// Per-file findings, in scan order.
    pub files: Vec<FileReport>,

    /// Files that could not be annotated.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFile>,

    /// Finding counts by severity.
    pub summary: ReportSummary,
}

/// Metadata about the scan operation.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Tool version used for the scan.
    pub version: String,

    /// Seconds since the Unix epoch when the report was built.
    pub timestamp: String,

    /// Label of the model that produced the findings.
    pub model: String,

    /// Path that was scanned.
    pub scanned_path: String,

    /// Number of files annotated successfully.
    pub files_analyzed: usize,
}

/// Annotations of one source file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub language: Language,

    /// Number of function units the file was split into.
    pub functions: usize,

    pub findings: Vec<LineFinding>,

    #[serde(skip)]
    lines: Vec<String>,
}

impl FileReport {
    pub fn new(
        path: String,
        language: Language,
        source: &str,
        functions: usize,
        findings: Vec<LineFinding>,
    ) -> Self {
        Self {
            path,
            language,
            functions,
            findings,
            lines: source.lines().map(str::to_string).collect(),
        }
    }

    /// Returns the source text of a 0-based line.
    pub fn source_line(&self, line_index: usize) -> Option<&str> {
        self.lines.get(line_index).map(String::as_str)
    }
}

/// A file left out of the report and the reason why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Finding counts by severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub safe: usize,
    pub total: usize,
}

impl Report {
    /// Creates a report and computes its summary.
    pub fn new(
        files: Vec<FileReport>,
        skipped: Vec<SkippedFile>,
        scanned_path: PathBuf,
        model: &str,
    ) -> Self {
        let summary = ReportSummary::from_findings(files.iter().flat_map(|f| f.findings.iter()));

        let metadata = ReportMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: unix_timestamp(),
            model: model.to_string(),
            scanned_path: scanned_path.display().to_string(),
            files_analyzed: files.len(),
        };

        Self {
            metadata,
            files,
            skipped,
            summary,
        }
    }

    /// Prints colorized findings to the terminal, grouped by file.
    pub fn print_terminal(&self) {
        if self.files.is_empty() {
            println!("\n{}", "[-] No files were annotated.".yellow().bold());
        }

        for file in &self.files {
            println!();
            println!(
                "{} {} {}",
                "[*]".cyan().bold(),
                file.path.blue().bold(),
                format!("({}, {} function(s))", file.language, file.functions).dimmed()
            );
            println!("{}", "-".repeat(60).dimmed());

            for finding in &file.findings {
                finding.print_terminal(file.source_line(finding.line_index));
            }
        }

        for skipped in &self.skipped {
            println!(
                "{} {} {}",
                "[-]".yellow(),
                skipped.path.dimmed(),
                format!("skipped: {}", skipped.reason).dimmed()
            );
        }
    }

    /// Prints summary statistics to the terminal.
    pub fn print_summary(&self) {
        println!();
        println!(
            "{}",
            format!(
                "[*] Summary: {} Critical | {} Warning | {} Info | {} Safe",
                self.summary.critical, self.summary.warning, self.summary.info, self.summary.safe
            )
            .bold()
        );

        let flagged = self.summary.critical + self.summary.warning;
        let message = format!("[!] {} line(s) flagged in {} file(s)", flagged, self.files.len());

        if self.summary.critical > 0 {
            println!("{}", message.red().bold());
        } else if self.summary.warning > 0 {
            println!("{}", message.yellow().bold());
        } else {
            println!("{}", "[+] Nothing flagged.".green().bold());
        }
    }

    /// Converts the report to Markdown format.
    pub fn to_markdown(&self) -> anyhow::Result<String> {
        formatter::to_markdown(self)
    }

    /// Converts the report to GitHub workflow annotations.
    pub fn to_github_annotations(&self) -> String {
        formatter::to_github_annotations(self)
    }

    /// Returns `true` if any finding is critical or a warning.
    pub fn has_flagged_lines(&self) -> bool {
        self.summary.critical + self.summary.warning > 0
    }
}

impl ReportSummary {
    fn from_findings<'a>(findings: impl Iterator<Item = &'a LineFinding>) -> Self {
        let mut summary = ReportSummary::default();

        for finding in findings {
            match finding.severity {
                Some(Severity::Critical) => summary.critical += 1,
                Some(Severity::Warning) => summary.warning += 1,
                Some(Severity::Info) => summary.info += 1,
                Some(Severity::Safe) => summary.safe += 1,
                None => continue,
            }
            summary.total += 1;
        }

        summary
    }
}

fn unix_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    duration.as_secs().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_summary() {
        let files = vec![
            FileReport::new(
                "a.c".to_string(),
                Language::C,
                "int a() { return 0; }\n",
                1,
                vec![LineFinding::classified(0, Severity::Safe, "fine")],
            ),
            FileReport::new(
                "b.cpp".to_string(),
                Language::Cpp,
                "void b()\n{\n    gets(x);\n}\n",
                1,
                vec![
                    LineFinding::classified(0, Severity::Critical, "bad"),
                    LineFinding::classified(2, Severity::Critical, "gets"),
                ],
            ),
        ];

        let report = Report::new(files, Vec::new(), PathBuf::from("."), "FlawFinder");

        assert_eq!(report.metadata.files_analyzed, 2);
        assert_eq!(report.summary.critical, 2);
        assert_eq!(report.summary.safe, 1);
        assert_eq!(report.summary.total, 3);
        assert!(report.has_flagged_lines());
    }

    #[test]
    fn test_json_shape() {
        let file = FileReport::new(
            "a.c".to_string(),
            Language::C,
            "int a() { return 0; }\n",
            1,
            vec![LineFinding::classified(0, Severity::Safe, "fine")],
        );
        let report = Report::new(vec![file], Vec::new(), PathBuf::from("a.c"), "TokenRisk");
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["metadata"]["model"], "TokenRisk");
        assert_eq!(json["files"][0]["language"], "c");
        assert_eq!(
            json["files"][0]["findings"],
            serde_json::json!([{ "line_index": 0, "severity": 3, "text": "fine" }])
        );
        assert!(json.get("skipped").is_none());
        assert!(json["files"][0].get("lines").is_none());
    }
}
