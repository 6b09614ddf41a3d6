//! # Finding and Severity Definitions
//!
//! @title Line Annotation Data Structures
//! @author Ramprasad
//!
//! Defines the line-level annotations produced by the pipeline and the
//! discrete severity buckets they are classified into.

use colored::*;
use serde::{Deserialize, Serialize};

/// Severity bucket of a finding.
///
/// Serialized as its number, lower meaning more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Severity {
    /// Very likely vulnerable.
    Critical = 0,

    /// Possibly vulnerable.
    Warning = 1,

    /// Informational. Not produced by the current threshold table.
    Info = 2,

    /// The model considers the function fine.
    Safe = 3,
}

impl Severity {
    /// All buckets, most severe first.
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::Warning,
        Severity::Info,
        Severity::Safe,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns a colored label for terminal output.
    pub fn colored_label(&self) -> ColoredString {
        match self {
            Severity::Critical => "CRITICAL".white().on_red().bold(),
            Severity::Warning => "WARNING".black().on_yellow().bold(),
            Severity::Info => "INFO".white().on_bright_blue().bold(),
            Severity::Safe => "SAFE".black().on_green(),
        }
    }

    /// Annotation level understood by GitHub workflow commands.
    pub fn github_level(&self) -> &'static str {
        match self {
            Severity::Critical => "error",
            Severity::Warning => "warning",
            Severity::Info | Severity::Safe => "notice",
        }
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.as_u8()
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Severity::ALL
            .into_iter()
            .find(|severity| severity.as_u8() == value)
            .ok_or_else(|| format!("invalid severity {}, expected 0-3", value))
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "Critical"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Info => write!(f, "Info"),
            Severity::Safe => write!(f, "Safe"),
        }
    }
}

/// One annotation on one source line.
///
/// Before classification a finding carries either a raw `probability` or a
/// fixed `severity`; afterwards only `severity` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineFinding {
    /// Absolute, 0-based line of the analyzed file.
    pub line_index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    /// Explanation shown to the user.
    pub text: String,
}

impl LineFinding {
    /// A finding still waiting for classification.
    pub fn scored(line_index: usize, probability: f64, text: impl Into<String>) -> Self {
        Self {
            line_index,
            probability: Some(probability),
            severity: None,
            text: text.into(),
        }
    }

    /// A finding whose severity is already decided.
    pub fn classified(line_index: usize, severity: Severity, text: impl Into<String>) -> Self {
        Self {
            line_index,
            probability: None,
            severity: Some(severity),
            text: text.into(),
        }
    }

    /// Prints the finding to terminal with color formatting.
    ///
    /// `source_line` is the annotated line of the file, if available.
    pub fn print_terminal(&self, source_line: Option<&str>) {
        let label = match self.severity {
            Some(severity) => severity.colored_label(),
            None => "UNCLASSIFIED".dimmed(),
        };

        println!(
            "  {} {} {}",
            format!("L{}", self.line_index + 1).cyan().bold(),
            label,
            self.text.white()
        );

        if let Some(line) = source_line {
            println!("      {}", line.trim_end().bright_white().dimmed());
        }
    }
}

/// Fixed annotation list covering every severity once, on lines 0-3.
///
/// Editor integrations use it to check their rendering without running a model.
pub fn example_findings() -> Vec<LineFinding> {
    Severity::ALL
        .into_iter()
        .enumerate()
        .map(|(line, severity)| {
            LineFinding::classified(line, severity, format!("{} example annotation", severity))
        })
        .collect()
}
