//! # Severity Classification and Merging
//!
//! Turns raw model results into the final, ordered list of line findings.
//!
//! | probability | severity |
//! |-------------|----------|
//! | (0.9, 1.0]  | Critical |
//! | (0.7, 0.9]  | Warning  |
//! | otherwise   | dropped  |
//!
//! A "looks fine" call is always [`Severity::Safe`] and line notes carry their
//! own severity; neither goes through the table.

use super::finding::{LineFinding, Severity};
use crate::models::{LineNote, RawDetectionResult};
use crate::parser::FunctionUnit;
use crate::scoring::{format_percent, line_reason, normalize, reduce_to_lines};

const CRITICAL_THRESHOLD: f64 = 0.9;
const WARNING_THRESHOLD: f64 = 0.7;

/// Lowest line-note level reported as critical.
const CRITICAL_NOTE_LEVEL: u8 = 4;

/// Maps a probability to a severity bucket, `None` meaning "do not report".
pub fn classify(probability: f64) -> Option<Severity> {
    if probability > CRITICAL_THRESHOLD && probability <= 1.0 {
        Some(Severity::Critical)
    } else if probability > WARNING_THRESHOLD && probability <= CRITICAL_THRESHOLD {
        Some(Severity::Warning)
    } else {
        None
    }
}

/// Builds and classifies the findings of every function, in function order.
///
/// `results[i]` must belong to `functions[i]`.
pub fn merge(functions: &[FunctionUnit], results: &[RawDetectionResult]) -> Vec<LineFinding> {
    classify_findings(build_candidates(functions, results))
}

/// Builds the unclassified candidate list.
pub fn build_candidates(functions: &[FunctionUnit], results: &[RawDetectionResult]) -> Vec<LineFinding> {
    let mut candidates = Vec::new();

    for (unit, result) in functions.iter().zip(results) {
        if !result.predicted {
            candidates.push(LineFinding::classified(
                unit.start_line,
                Severity::Safe,
                format!(
                    "This function looks fine (with {}% confidence)",
                    format_percent(result.probability)
                ),
            ));
            continue;
        }

        candidates.push(LineFinding::scored(
            unit.start_line,
            result.probability,
            format!(
                "This function has a {}% chance of being exploitable",
                format_percent(result.probability)
            ),
        ));

        if let Some(tokens) = result.line_scores.as_deref() {
            push_line_scores(unit, tokens, &mut candidates);
        }
        push_line_notes(unit, &result.line_notes, &mut candidates);
    }

    candidates
}

/// Classifies every finding without a severity and drops the unreportable ones.
pub fn classify_findings(candidates: Vec<LineFinding>) -> Vec<LineFinding> {
    candidates
        .into_iter()
        .filter_map(|mut finding| {
            if finding.severity.is_none() {
                finding.severity = finding.probability.and_then(classify);
            }
            finding.probability = None;
            finding.severity.map(|_| finding)
        })
        .collect()
}

/// Line findings from token attributions. The declaration line is already
/// covered by the function finding and is skipped.
fn push_line_scores(
    unit: &FunctionUnit,
    tokens: &[crate::models::TokenWeight],
    candidates: &mut Vec<LineFinding>,
) {
    let reduced = reduce_to_lines(tokens);
    if reduced.len() < 2 {
        return;
    }

    let normalized = normalize(&reduced.scores[1..]);

    for (offset, probability) in normalized.into_iter().enumerate() {
        let line_index = unit.start_line + offset + 1;
        if !unit.contains_line(line_index) {
            log::debug!(
                "Dropping attribution beyond function end (line {} > {})",
                line_index,
                unit.end_line
            );
            break;
        }
        candidates.push(LineFinding::scored(line_index, probability, line_reason(probability)));
    }
}

fn push_line_notes(unit: &FunctionUnit, notes: &[LineNote], candidates: &mut Vec<LineFinding>) {
    for note in notes {
        let line_index = unit.start_line + note.line;
        if !unit.contains_line(line_index) {
            log::debug!("Dropping line note outside function: {}", note.text);
            continue;
        }

        let severity = if note.level >= CRITICAL_NOTE_LEVEL {
            Severity::Critical
        } else {
            Severity::Warning
        };
        candidates.push(LineFinding::classified(line_index, severity, note.text.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenWeight;

    fn unit(start_line: usize, end_line: usize) -> FunctionUnit {
        FunctionUnit {
            text: String::new(),
            start_line,
            end_line,
        }
    }

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(classify(1.0), Some(Severity::Critical));
        assert_eq!(classify(0.95), Some(Severity::Critical));
        assert_eq!(classify(0.9), Some(Severity::Warning));
        assert_eq!(classify(0.75), Some(Severity::Warning));
        assert_eq!(classify(0.7), None);
        assert_eq!(classify(0.0), None);
        assert_eq!(classify(f64::NAN), None);
    }

    #[test]
    fn test_classify_monotonic() {
        let mut previous = Severity::Safe;
        for step in 71..=100 {
            let severity = classify(step as f64 / 100.0).unwrap();
            assert!(severity <= previous);
            previous = severity;
        }
    }

    #[test]
    fn test_clean_function_is_safe() {
        let findings = merge(&[unit(0, 0)], &[RawDetectionResult::clean(0.95)]);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line_index, 0);
        assert_eq!(findings[0].severity, Some(Severity::Safe));
        assert_eq!(findings[0].text, "This function looks fine (with 95% confidence)");
    }

    #[test]
    fn test_single_remaining_line_is_dropped() {
        let result = RawDetectionResult::vulnerable(0.92).with_line_scores(vec![
            TokenWeight::new("a", 1.0),
            TokenWeight::new("Ċ", 0.2),
            TokenWeight::new("b", 3.0),
            TokenWeight::new("Ċ", 0.1),
        ]);

        let candidates = build_candidates(&[unit(0, 2)], &[result.clone()]);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].probability, Some(0.0));

        let findings = merge(&[unit(0, 2)], &[result]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Some(Severity::Critical));
        assert_eq!(findings[0].text, "This function has a 92% chance of being exploitable");
        assert!(findings[0].probability.is_none());
    }

    #[test]
    fn test_line_findings_follow_function_finding() {
        let result = RawDetectionResult::vulnerable(0.8).with_line_scores(vec![
            TokenWeight::new("decl", 5.0),
            TokenWeight::new("Ċ", 0.0),
            TokenWeight::new("low", 1.0),
            TokenWeight::new("Ċ", 0.0),
            TokenWeight::new("high", 3.0),
            TokenWeight::new("Ċ", 0.0),
        ]);

        let findings = merge(&[unit(10, 13)], &[result]);
        let lines: Vec<usize> = findings.iter().map(|f| f.line_index).collect();

        assert_eq!(lines, vec![10, 12]);
        assert_eq!(findings[0].severity, Some(Severity::Warning));
        assert_eq!(findings[1].severity, Some(Severity::Critical));
        assert_eq!(
            findings[1].text,
            "This line has a 100% chance of being the reason for this"
        );
    }

    #[test]
    fn test_line_findings_stay_inside_function() {
        let mut tokens = Vec::new();
        for i in 0..6 {
            tokens.push(TokenWeight::new("x", i as f64));
            tokens.push(TokenWeight::new("Ċ", 0.0));
        }
        let result = RawDetectionResult::vulnerable(0.95).with_line_scores(tokens);

        let candidates = build_candidates(&[unit(3, 5)], &[result]);
        assert!(candidates.iter().all(|f| (3..=5).contains(&f.line_index)));
    }

    #[test]
    fn test_line_notes() {
        let result = RawDetectionResult::vulnerable(0.95).with_line_notes(vec![
            LineNote { line: 2, level: 4, text: "strcpy".into() },
            LineNote { line: 3, level: 1, text: "strlen".into() },
            LineNote { line: 9, level: 5, text: "outside".into() },
        ]);

        let findings = merge(&[unit(20, 24)], &[result]);
        let summary: Vec<(usize, Option<Severity>)> =
            findings.iter().map(|f| (f.line_index, f.severity)).collect();

        assert_eq!(
            summary,
            vec![
                (20, Some(Severity::Critical)),
                (22, Some(Severity::Critical)),
                (23, Some(Severity::Warning)),
            ]
        );
    }

    #[test]
    fn test_functions_keep_order() {
        let findings = merge(
            &[unit(0, 3), unit(5, 9), unit(11, 12)],
            &[
                RawDetectionResult::clean(0.6),
                RawDetectionResult::vulnerable(0.5),
                RawDetectionResult::vulnerable(0.99),
            ],
        );
        let lines: Vec<usize> = findings.iter().map(|f| f.line_index).collect();
        assert_eq!(lines, vec![0, 11]);
    }
}
