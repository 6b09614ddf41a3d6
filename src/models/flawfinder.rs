//! # FlawFinder - Rule-Based Static Analyzer
//!
//! Flags calls to C/C++ library functions with a long history of memory
//! safety, injection and race bugs. Each hit carries a risk level from 1 to 5
//! and becomes a line note; the function-level call is driven by the highest
//! level found.

use super::{DetectionModel, LineNote, RawDetectionResult};
use crate::parser::Language;
use anyhow::Result;
use regex::Regex;

/// One dangerous-call rule.
struct Rule {
    name: &'static str,
    level: u8,
    cwe: &'static str,
    message: &'static str,
    /// Only report when the line also contains this text.
    requires: Option<&'static str>,
}

const RULES: &[Rule] = &[
    Rule { name: "gets", level: 5, cwe: "CWE-120, CWE-20", message: "Does not check for buffer overflows. Use fgets() instead.", requires: None },
    Rule { name: "strcpy", level: 4, cwe: "CWE-120", message: "Does not check for buffer overflows when copying to destination. Consider using snprintf, strcpy_s, or strlcpy.", requires: None },
    Rule { name: "strcat", level: 4, cwe: "CWE-120", message: "Does not check for buffer overflows when concatenating to destination. Consider using strcat_s, strncat, or strlcat.", requires: None },
    Rule { name: "sprintf", level: 4, cwe: "CWE-120", message: "Does not check for buffer overflows. Use snprintf or vsnprintf.", requires: None },
    Rule { name: "vsprintf", level: 4, cwe: "CWE-120", message: "Does not check for buffer overflows. Use vsnprintf.", requires: None },
    Rule { name: "scanf", level: 4, cwe: "CWE-120, CWE-20", message: "The %s operation without a limit specification permits buffer overflows. Specify a limit to %s.", requires: Some("%s") },
    Rule { name: "sscanf", level: 4, cwe: "CWE-120, CWE-20", message: "The %s operation without a limit specification permits buffer overflows. Specify a limit to %s.", requires: Some("%s") },
    Rule { name: "fscanf", level: 4, cwe: "CWE-120, CWE-20", message: "The %s operation without a limit specification permits buffer overflows. Specify a limit to %s.", requires: Some("%s") },
    Rule { name: "system", level: 4, cwe: "CWE-78", message: "This causes a new program to execute and is difficult to use safely. Try using a library call that implements the same functionality.", requires: None },
    Rule { name: "popen", level: 4, cwe: "CWE-78", message: "This causes a new program to execute and is difficult to use safely.", requires: None },
    Rule { name: "execlp", level: 4, cwe: "CWE-78", message: "This causes a new program to execute and is difficult to use safely.", requires: None },
    Rule { name: "execvp", level: 4, cwe: "CWE-78", message: "This causes a new program to execute and is difficult to use safely.", requires: None },
    Rule { name: "access", level: 4, cwe: "CWE-362, CWE-367", message: "This usually indicates a race condition (TOCTOU). Set up the correct permissions and try to open the file directly.", requires: None },
    Rule { name: "tmpnam", level: 3, cwe: "CWE-377", message: "Temporary file race condition. Use mkstemp instead.", requires: None },
    Rule { name: "mktemp", level: 3, cwe: "CWE-377", message: "Temporary file race condition. Use mkstemp instead.", requires: None },
    Rule { name: "getenv", level: 3, cwe: "CWE-807, CWE-20", message: "Environment variables are untrustable input if they can be set by an attacker. Check environment variables carefully before using them.", requires: None },
    Rule { name: "realpath", level: 3, cwe: "CWE-120, CWE-785", message: "This function does not protect against buffer overflows, and some implementations can overflow internally.", requires: None },
    Rule { name: "rand", level: 3, cwe: "CWE-327", message: "This function is not sufficiently random for security-related functions such as key and nonce creation.", requires: None },
    Rule { name: "memcpy", level: 2, cwe: "CWE-120", message: "Does not check for buffer overflows when copying to destination. Make sure destination can always hold the source data.", requires: None },
    Rule { name: "atoi", level: 2, cwe: "CWE-190", message: "Unless checked, the resulting number can exceed the expected range. Check both minimum and maximum.", requires: None },
    Rule { name: "strncpy", level: 1, cwe: "CWE-120", message: "Easily used incorrectly; doesn't always \\0-terminate or check for invalid pointers.", requires: None },
    Rule { name: "strncat", level: 1, cwe: "CWE-120", message: "Easily used incorrectly; the length argument is often miscalculated.", requires: None },
    Rule { name: "strlen", level: 1, cwe: "CWE-126", message: "Does not handle strings that are not \\0-terminated; it could cause a crash if unprotected.", requires: None },
];

struct CompiledRule {
    rule: &'static Rule,
    pattern: Regex,
}

/// Rule-based model in the spirit of the classic flawfinder tool.
pub struct FlawFinderModel {
    rules: Vec<CompiledRule>,
    format_string: Regex,
    string_literal: Regex,
}

impl FlawFinderModel {
    /// Compiles the rule set.
    pub fn new() -> Result<Self> {
        let rules = RULES
            .iter()
            .map(|rule| -> Result<CompiledRule> {
                let pattern = Regex::new(&format!(r"\b{}\s*\(", regex::escape(rule.name)))?;
                Ok(CompiledRule { rule, pattern })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            format_string: Regex::new(r"\b(?:printf|syslog)\s*\(\s*[A-Za-z_]")?,
            string_literal: Regex::new(r#""(?:[^"\\]|\\.)*""#)?,
        })
    }

    /// Scans one function and returns its line notes.
    fn scan(&self, function: &str) -> Vec<LineNote> {
        let mut notes = Vec::new();
        let mut in_block_comment = false;

        for (index, raw_line) in function.lines().enumerate() {
            let code = strip_comments(raw_line, &mut in_block_comment);
            if code.trim().is_empty() {
                continue;
            }
            // Calls spelled inside string literals are not calls.
            let code_only = self.string_literal.replace_all(&code, "\"\"");

            for compiled in &self.rules {
                if !compiled.pattern.is_match(&code_only) {
                    continue;
                }
                if let Some(required) = compiled.rule.requires {
                    if !code.contains(required) {
                        continue;
                    }
                }
                notes.push(LineNote {
                    line: index,
                    level: compiled.rule.level,
                    text: format!(
                        "{} (level {}, {}): {}",
                        compiled.rule.name, compiled.rule.level, compiled.rule.cwe, compiled.rule.message
                    ),
                });
            }

            if self.format_string.is_match(&code_only) {
                notes.push(LineNote {
                    line: index,
                    level: 4,
                    text: "printf (level 4, CWE-134): If format strings can be influenced by an attacker, they can be exploited. Use a constant for the format specification.".to_string(),
                });
            }
        }

        notes
    }
}

impl DetectionModel for FlawFinderModel {
    fn label(&self) -> &str {
        "FlawFinder"
    }

    fn detail(&self) -> &str {
        "A Classic Static Analyzer for Vulnerability Prediction"
    }

    fn preloaded(&self) -> bool {
        true
    }

    fn load(&self) -> Result<()> {
        Ok(())
    }

    fn infer(&self, functions: &[&str], language: Language) -> Result<Vec<RawDetectionResult>> {
        log::debug!("FlawFinder scanning {} {} function(s)", functions.len(), language);

        Ok(functions
            .iter()
            .map(|function| {
                let notes = self.scan(function);
                match notes.iter().map(|note| note.level).max() {
                    Some(level) => {
                        RawDetectionResult::vulnerable(level_probability(level)).with_line_notes(notes)
                    }
                    None => RawDetectionResult::clean(1.0),
                }
            })
            .collect())
    }
}

/// Maps a risk level to the confidence reported for the function.
fn level_probability(level: u8) -> f64 {
    match level {
        level if level >= 5 => 1.0,
        4 => 0.95,
        3 => 0.85,
        2 => 0.75,
        _ => 0.6,
    }
}

/// Removes `//` and `/* */` comments from one line, tracking block comments
/// that span lines.
fn strip_comments(line: &str, in_block_comment: &mut bool) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    loop {
        if *in_block_comment {
            match rest.find("*/") {
                Some(end) => {
                    *in_block_comment = false;
                    rest = &rest[end + 2..];
                }
                None => return out,
            }
        }

        let line_comment = rest.find("//");
        let block_comment = rest.find("/*");

        match (line_comment, block_comment) {
            (Some(l), Some(b)) if l < b => {
                out.push_str(&rest[..l]);
                return out;
            }
            (Some(l), None) => {
                out.push_str(&rest[..l]);
                return out;
            }
            (_, Some(b)) => {
                out.push_str(&rest[..b]);
                *in_block_comment = true;
                rest = &rest[b + 2..];
            }
            (None, None) => {
                out.push_str(rest);
                return out;
            }
        }
    }
}
