//! # Report Formatters
//!
//! Renders a [`Report`] as Markdown (through a Handlebars template) or as
//! GitHub Actions workflow commands that show up as inline annotations on
//! pull requests.

use super::{FileReport, Report};
use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;

const MARKDOWN_TEMPLATE: &str = r#"# imdbug Vulnerability Annotations

| | |
|---|---|
| Scanned path | `{{metadata.scanned_path}}` |
| Model | {{metadata.model}} |
| Files analyzed | {{metadata.files_analyzed}} |
| imdbug version | {{metadata.version}} |

## Summary

| Critical | Warning | Info | Safe | Total |
|---|---|---|---|---|
| {{summary.critical}} | {{summary.warning}} | {{summary.info}} | {{summary.safe}} | {{summary.total}} |
{{#each files}}

## `{{path}}` ({{language}}, {{functions}} function(s))

{{#if rows}}
| Line | Severity | Finding | Code |
|---|---|---|---|
{{#each rows}}
| {{line}} | {{severity}} | {{text}} | {{#if code}}`{{code}}`{{/if}} |
{{/each}}
{{else}}
No findings.
{{/if}}
{{/each}}
{{#if skipped}}

## Skipped Files

{{#each skipped}}
- `{{path}}`: {{reason}}
{{/each}}
{{/if}}
"#;

#[derive(Serialize)]
struct MarkdownRow {
    line: usize,
    severity: String,
    text: String,
    code: String,
}

#[derive(Serialize)]
struct MarkdownFile<'a> {
    path: &'a str,
    language: &'a str,
    functions: usize,
    rows: Vec<MarkdownRow>,
}

#[derive(Serialize)]
struct MarkdownData<'a> {
    metadata: &'a super::ReportMetadata,
    summary: &'a super::ReportSummary,
    files: Vec<MarkdownFile<'a>>,
    skipped: &'a [super::SkippedFile],
}

/// Renders the report as a Markdown document.
pub fn to_markdown(report: &Report) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(false);
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
        .register_template_string("report", MARKDOWN_TEMPLATE)
        .context("Invalid markdown template")?;

    let data = MarkdownData {
        metadata: &report.metadata,
        summary: &report.summary,
        files: report.files.iter().map(markdown_file).collect(),
        skipped: &report.skipped,
    };

    handlebars
        .render("report", &data)
        .context("Failed to render markdown report")
}

fn markdown_file(file: &FileReport) -> MarkdownFile<'_> {
    let rows = file
        .findings
        .iter()
        .map(|finding| MarkdownRow {
            line: finding.line_index + 1,
            severity: finding
                .severity
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            text: escape_cell(&finding.text),
            code: file
                .source_line(finding.line_index)
                .map(|line| escape_cell(line.trim()))
                .unwrap_or_default(),
        })
        .collect();

    MarkdownFile {
        path: &file.path,
        language: file.language.as_str(),
        functions: file.functions,
        rows,
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('`', "'")
}

/// Renders one `::level file=...,line=...::message` command per finding.
///
/// Safe findings are omitted; they are noise in a pull request.
pub fn to_github_annotations(report: &Report) -> String {
    let mut out = String::new();

    for file in &report.files {
        for finding in &file.findings {
            let Some(severity) = finding.severity else {
                continue;
            };
            if severity == super::Severity::Safe {
                continue;
            }

            out.push_str(&format!(
                "::{} file={},line={},title=imdbug {}::{}\n",
                severity.github_level(),
                escape_property(&file.path),
                finding.line_index + 1,
                severity,
                escape_data(&finding.text)
            ));
        }
    }

    out
}

fn escape_data(text: &str) -> String {
    text.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(text: &str) -> String {
    escape_data(text).replace(':', "%3A").replace(',', "%2C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Language;
    use crate::report::{LineFinding, Severity};
    use std::path::PathBuf;

    fn sample_report() -> Report {
        let file = FileReport::new(
            "src/copy.c".to_string(),
            Language::C,
            "void copy(char *s)\n{\n    char b[4]; strcpy(b, s); // a|b\n}\n",
            1,
            vec![
                LineFinding::classified(0, Severity::Warning, "This function has a 80% chance of being exploitable"),
                LineFinding::classified(2, Severity::Critical, "strcpy (level 4): 100% bad"),
                LineFinding::classified(3, Severity::Safe, "fine"),
            ],
        );
        Report::new(vec![file], Vec::new(), PathBuf::from("src"), "FlawFinder")
    }

    #[test]
    fn test_markdown_contains_rows() {
        let markdown = to_markdown(&sample_report()).unwrap();

        assert!(markdown.contains("# imdbug Vulnerability Annotations"));
        assert!(markdown.contains("| Model | FlawFinder |"));
        assert!(markdown.contains("## `src/copy.c` (c, 1 function(s))"));
        assert!(markdown.contains("| 3 | Critical | strcpy (level 4): 100% bad |"));
        assert!(markdown.contains("a\\|b"));
        assert!(!markdown.contains("Skipped Files"));
    }

    #[test]
    fn test_github_annotations() {
        let annotations = to_github_annotations(&sample_report());
        let lines: Vec<&str> = annotations.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "::warning file=src/copy.c,line=1,title=imdbug Warning::This function has a 80%25 chance of being exploitable"
        );
        assert!(lines[1].starts_with("::error file=src/copy.c,line=3,"));
    }
}
