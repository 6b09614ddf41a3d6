//! # Attribution Scoring
//!
//! @title Token Attribution to Line Scores
//! @author Ramprasad
//!
//! Reduces per-token attribution weights returned by a model to one score per
//! source line, and rescales those scores into comparable probabilities.
//!
//! ## Reduction
//!
//! Weights are accumulated token by token and flushed into a line score each
//! time a line-break marker is met (and at the last token). A blank-line
//! marker additionally emits an empty line with score `0`, so the result has
//! one entry per line of the analyzed function.
//!
//! ## Normalization
//!
//! Min-max scaling into `[0, 1]`. When every score is equal the scale is
//! undefined and all lines get `0.0`.

/// Marker for a single line break in token streams.
pub const LINE_SEPARATOR: &str = "Ċ";

/// Marker for two consecutive line breaks (a blank line).
pub const DOUBLE_LINE_SEPARATOR: &str = "ĊĊ";

/// Per-line text and accumulated attribution of one function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineScores {
    pub lines: Vec<String>,
    pub scores: Vec<f64>,
}

impl LineScores {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

fn is_line_separator(token: &str) -> bool {
    token.trim_start_matches(' ') == LINE_SEPARATOR
}

fn is_double_line_separator(token: &str) -> bool {
    token.trim_start_matches(' ') == DOUBLE_LINE_SEPARATOR
}

/// Accumulates token weights into one score per line.
///
/// The last token only contributes its weight before the final flush.
pub fn reduce_to_lines(tokens: &[crate::models::TokenWeight]) -> LineScores {
    let mut reduced = LineScores::default();
    let mut accumulated_weight = 0.0;
    let mut current_line = String::new();

    for (index, token_weight) in tokens.iter().enumerate() {
        let token = token_weight.token.as_str();
        let single = is_line_separator(token);
        let double = is_double_line_separator(token);
        let last = index + 1 == tokens.len();

        if !(single || double || last) {
            current_line.push_str(token);
        }
        accumulated_weight += token_weight.weight;

        if single || double || last {
            reduced.lines.push(std::mem::take(&mut current_line));
            reduced.scores.push(accumulated_weight);
            accumulated_weight = 0.0;

            if double {
                reduced.lines.push(String::new());
                reduced.scores.push(0.0);
            }
        }
    }

    reduced
}

/// Min-max scales `scores` into `[0, 1]`.
///
/// Returns all zeros when the scores are all equal or any score is not
/// finite, never NaN.
pub fn normalize(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    if scores.iter().any(|score| !score.is_finite()) {
        log::warn!("Non-finite line scores, normalizing to zero");
        return vec![0.0; scores.len()];
    }

    let min_score = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max_score - min_score;

    if !range.is_finite() || range <= 0.0 {
        log::debug!(
            "Degenerate line scores (min {}, max {}), normalizing to zero",
            min_score,
            max_score
        );
        return vec![0.0; scores.len()];
    }

    scores
        .iter()
        .map(|score| ((score - min_score) / range).clamp(0.0, 1.0))
        .collect()
}

/// Formats a probability as a percentage rounded to two decimals.
pub fn format_percent(probability: f64) -> String {
    let percent = (probability * 100.0 * 100.0).round() / 100.0;
    format!("{}", percent)
}

/// Explanation attached to a line-level finding.
pub fn line_reason(probability: f64) -> String {
    format!(
        "This line has a {}% chance of being the reason for this",
        format_percent(probability)
    )
}
