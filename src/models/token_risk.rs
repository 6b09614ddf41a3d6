//! # TokenRisk - Lexicon-Weighted Token Attribution
//!
//! A lightweight attribution model. Each function is split into tokens the
//! way a byte-level BPE tokenizer would present them (line breaks become
//! `Ċ` and blank lines `ĊĊ` markers), every token receives a weight from a
//! risk lexicon, and the summed weight is squashed into a probability:
//!
//! ```text
//! p = 1 - exp(-Σ weight)
//! ```
//!
//! Token weights double as attribution scores, so vulnerable functions come
//! back with per-token explanations the scorer reduces to line scores.

use super::{DetectionModel, RawDetectionResult, TokenWeight};
use crate::config::TokenRiskConfig;
use crate::parser::Language;
use crate::scoring::{DOUBLE_LINE_SEPARATOR, LINE_SEPARATOR};
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Default decision threshold on `p`.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Weight of tokens absent from the lexicon.
const BASELINE_WEIGHT: f64 = 0.001;

/// Built-in risk lexicon. Weights are in "evidence units": a sum of 1.0
/// yields `p ≈ 0.63`.
const BUILTIN_LEXICON: &[(&str, f64)] = &[
    ("gets", 1.6),
    ("strcpy", 1.2),
    ("system", 1.2),
    ("strcat", 1.0),
    ("sprintf", 1.0),
    ("vsprintf", 1.0),
    ("popen", 1.0),
    ("alloca", 0.8),
    ("scanf", 0.6),
    ("sscanf", 0.5),
    ("memcpy", 0.5),
    ("getenv", 0.4),
    ("strncpy", 0.3),
    ("memmove", 0.3),
    ("realloc", 0.3),
    ("atoi", 0.3),
    ("free", 0.2),
    ("rand", 0.2),
    ("malloc", 0.15),
    ("strlen", 0.1),
    ("char", 0.1),
    ("[", 0.05),
    ("printf", 0.05),
];

/// Token pattern: newline runs, then one lexeme with its leading blanks,
/// then trailing blanks at end of input.
const TOKEN_PATTERN: &str = r#"[ \t\r]*\n(?:[ \t\r]*\n)*|[ \t]*(?:[A-Za-z_][A-Za-z0-9_]*|[0-9][A-Za-z0-9_.]*|"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'|->|\+\+|--|<<|>>|[<>=!]=|&&|\|\||\S)|[ \t\r]+"#;

struct LoadedState {
    lexicon: HashMap<String, f64>,
    tokenizer: Regex,
}

/// Lexicon-weighted attribution model.
pub struct TokenRiskModel {
    config: TokenRiskConfig,
    state: OnceLock<LoadedState>,
}

impl TokenRiskModel {
    pub fn new(config: TokenRiskConfig) -> Self {
        Self {
            config,
            state: OnceLock::new(),
        }
    }

    fn build_state(&self) -> Result<LoadedState> {
        let mut lexicon: HashMap<String, f64> = BUILTIN_LEXICON
            .iter()
            .map(|(token, weight)| (token.to_string(), *weight))
            .collect();

        if let Some(path) = &self.config.lexicon {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read lexicon {}", path.display()))?;
            let extra: HashMap<String, f64> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse lexicon {}", path.display()))?;
            log::info!("Merging {} lexicon entries from {}", extra.len(), path.display());
            lexicon.extend(extra);
        }

        Ok(LoadedState {
            lexicon,
            tokenizer: Regex::new(TOKEN_PATTERN)?,
        })
    }

    fn score(&self, state: &LoadedState, function: &str) -> RawDetectionResult {
        let tokens: Vec<TokenWeight> = tokenize(&state.tokenizer, function)
            .into_iter()
            .map(|token| {
                let weight = state
                    .lexicon
                    .get(token.trim())
                    .copied()
                    .unwrap_or(BASELINE_WEIGHT);
                TokenWeight::new(token, weight)
            })
            .collect();

        let evidence: f64 = tokens.iter().map(|t| t.weight).sum();
        let p = 1.0 - (-evidence.max(0.0)).exp();

        if p > self.config.threshold {
            RawDetectionResult::vulnerable(p).with_line_scores(tokens)
        } else {
            RawDetectionResult::clean(1.0 - p)
        }
    }
}

impl DetectionModel for TokenRiskModel {
    fn label(&self) -> &str {
        "TokenRisk"
    }

    fn detail(&self) -> &str {
        "Lexicon-weighted token attribution for C/C++ functions"
    }

    fn load(&self) -> Result<()> {
        if self.state.get().is_none() {
            let state = self.build_state()?;
            // A concurrent loader may have won; either state is equivalent.
            let _ = self.state.set(state);
        }
        Ok(())
    }

    fn infer(&self, functions: &[&str], language: Language) -> Result<Vec<RawDetectionResult>> {
        let state = self
            .state
            .get()
            .ok_or_else(|| anyhow!("TokenRisk used before load()"))?;

        log::debug!("TokenRisk scoring {} {} function(s)", functions.len(), language);
        Ok(functions.iter().map(|f| self.score(state, f)).collect())
    }
}

/// Splits text into lexemes and line-break markers.
///
/// A run of `n` line breaks becomes `n / 2` double markers followed by
/// `n % 2` single markers, so every line break is accounted for.
fn tokenize(tokenizer: &Regex, text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for found in tokenizer.find_iter(text) {
        let lexeme = found.as_str();
        let breaks = lexeme.matches('\n').count();

        if breaks == 0 {
            tokens.push(lexeme.to_string());
            continue;
        }

        for _ in 0..breaks / 2 {
            tokens.push(DOUBLE_LINE_SEPARATOR.to_string());
        }
        if breaks % 2 == 1 {
            tokens.push(LINE_SEPARATOR.to_string());
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::reduce_to_lines;

    fn loaded() -> TokenRiskModel {
        let model = TokenRiskModel::new(TokenRiskConfig::default());
        model.load().unwrap();
        model
    }

    #[test]
    fn test_tokenize_markers() {
        let tokenizer = Regex::new(TOKEN_PATTERN).unwrap();
        let tokens = tokenize(&tokenizer, "int a;\n\nint b;\n");
        assert_eq!(
            tokens,
            vec!["int", " a", ";", "ĊĊ", "int", " b", ";", "Ċ"]
        );
    }

    #[test]
    fn test_tokenize_keeps_text() {
        let tokenizer = Regex::new(TOKEN_PATTERN).unwrap();
        let text = "if (p->n >= 10) { s = \"a\\\"b\"; }";
        assert_eq!(tokenize(&tokenizer, text).concat(), text);
    }

    #[test]
    fn test_infer_requires_load() {
        let model = TokenRiskModel::new(TokenRiskConfig::default());
        assert!(model.infer(&["int f() { return 0; }"], Language::C).is_err());
    }

    #[test]
    fn test_clean_function() {
        let results = loaded()
            .infer(&["int add(int a, int b)\n{\n    return a + b;\n}\n"], Language::C)
            .unwrap();

        assert!(!results[0].predicted);
        assert!(results[0].probability > 0.9);
        assert!(results[0].line_scores.is_none());
    }

    #[test]
    fn test_vulnerable_function_lines_align() {
        let function = "void copy(char *src)\n{\n    char buf[8];\n\n    strcpy(buf, src);\n}\n";
        let results = loaded().infer(&[function], Language::C).unwrap();
        let result = &results[0];

        assert!(result.predicted);
        assert!(result.probability > 0.5);

        let reduced = reduce_to_lines(result.line_scores.as_ref().unwrap());
        assert_eq!(reduced.scores.len(), function.lines().count());

        let hottest = reduced
            .scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(hottest, 4);
        assert_eq!(reduced.scores[3], 0.0);
    }

    #[test]
    fn test_custom_lexicon() {
        let dir = tempfile::tempdir().unwrap();
        let lexicon = dir.path().join("lexicon.json");
        std::fs::write(&lexicon, r#"{ "danger_zone": 5.0 }"#).unwrap();

        let model = TokenRiskModel::new(TokenRiskConfig {
            threshold: DEFAULT_THRESHOLD,
            lexicon: Some(lexicon),
        });
        model.load().unwrap();

        let results = model.infer(&["void f() { danger_zone(); }\n"], Language::C).unwrap();
        assert!(results[0].predicted);
        assert!(results[0].probability > 0.99);
    }

    #[test]
    fn test_missing_lexicon_fails_load() {
        let model = TokenRiskModel::new(TokenRiskConfig {
            threshold: DEFAULT_THRESHOLD,
            lexicon: Some("/nonexistent/lexicon.json".into()),
        });
        assert!(model.load().is_err());
    }
}
