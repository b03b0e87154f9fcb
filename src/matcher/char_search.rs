//! Character-window fuzzy search for whole multi-line targets.
//!
//! Slides a window of `|target.lines|` over the file and scores each window
//! by mean per-line similarity. Lines are normalized with a relative-indent
//! depth prefix so that `  x` and `    x` score differently unless both sit
//! at their block's baseline. When the strict scoring narrowly misses, a
//! relaxed retry drops the depth prefix.

use crate::matcher::similarity::similarity;
use crate::normalize::{count_leading_whitespace, normalize_for_fuzzy};

/// Floor below which the relaxed retry is not attempted.
const RETRY_FLOOR: f64 = 0.80;
/// Ceiling for the relaxed retry threshold.
const RELAXED_CEILING: f64 = 0.92;

/// A scored window position. `start_line` is 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMatch {
    pub start_line: usize,
    pub line_count: usize,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CharSearchOutcome {
    /// Pattern longer than the file, or empty.
    None,
    /// Exactly one window passed the threshold.
    Accepted(WindowMatch),
    /// Best window did not pass, or more than one did. `passing` is how
    /// many windows passed the threshold (0 when the best fell short).
    Closest { best: WindowMatch, passing: usize },
}

/// Per-line form used for scoring: relative indent depth + normalized text.
/// The depth is relative to the minimum non-blank indent of the slice, so a
/// uniformly shifted block still scores 1.0 against its pattern.
fn depth_prefixed(lines: &[&str], with_depth: bool) -> Vec<String> {
    let base = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| count_leading_whitespace(l))
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| {
            let norm = normalize_for_fuzzy(l);
            if !with_depth || l.trim().is_empty() {
                return norm;
            }
            let depth = count_leading_whitespace(l).saturating_sub(base);
            format!("{depth}\u{1F}{norm}")
        })
        .collect()
}

fn score_windows(
    content_lines: &[&str],
    target_norm: &[String],
    with_depth: bool,
    threshold: f64,
) -> (Option<WindowMatch>, usize) {
    let n = target_norm.len();
    let mut best: Option<WindowMatch> = None;
    let mut passing = 0usize;

    for start in 0..=content_lines.len().saturating_sub(n) {
        let window = &content_lines[start..start + n];
        let window_norm = depth_prefixed(window, with_depth);
        let score: f64 = window_norm
            .iter()
            .zip(target_norm.iter())
            .map(|(a, b)| similarity(a, b))
            .sum::<f64>()
            / n as f64;

        if score >= threshold {
            passing += 1;
        }
        if best.is_none_or(|b| score > b.confidence) {
            best = Some(WindowMatch {
                start_line: start,
                line_count: n,
                confidence: score,
            });
        }
    }
    (best, passing)
}

/// Fuzzy character-window search. Accepts only when exactly one window
/// passes `threshold`; otherwise reports the closest window so the caller
/// can show a similarity-percent diagnostic, plus the number of windows
/// that passed ("N high-confidence matches").
pub fn find_match(content: &str, target: &str, threshold: f64) -> CharSearchOutcome {
    let content_lines: Vec<&str> = content.split('\n').collect();
    let target_lines: Vec<&str> = target.split('\n').collect();
    if target_lines.is_empty() || content_lines.len() < target_lines.len() {
        return CharSearchOutcome::None;
    }

    let target_norm = depth_prefixed(&target_lines, true);
    let (best, passing) = score_windows(&content_lines, &target_norm, true, threshold);
    let Some(best) = best else {
        return CharSearchOutcome::None;
    };

    if passing == 1 && best.confidence >= threshold {
        tracing::debug!(start = best.start_line, confidence = best.confidence, "char window accepted");
        return CharSearchOutcome::Accepted(best);
    }

    // Narrow miss: retry without the depth prefix at a relaxed threshold.
    // This is a deliberate second chance for blocks whose only drift is
    // internal indentation.
    if passing == 0 && best.confidence >= RETRY_FLOOR && best.confidence < threshold {
        let relaxed = threshold.min(RELAXED_CEILING);
        let target_flat = depth_prefixed(&target_lines, false);
        let (flat_best, flat_passing) = score_windows(&content_lines, &target_flat, false, relaxed);
        if let Some(flat_best) = flat_best {
            if flat_passing == 1 && flat_best.confidence >= relaxed {
                tracing::debug!(
                    start = flat_best.start_line,
                    confidence = flat_best.confidence,
                    "char window accepted on relaxed retry"
                );
                return CharSearchOutcome::Accepted(flat_best);
            }
        }
    }

    CharSearchOutcome::Closest { best, passing }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 0.95;

    #[test]
    fn test_exact_block_accepted() {
        let content = "fn a() {\n    one();\n    two();\n}\n";
        let target = "    one();\n    two();";
        match find_match(content, target, THRESHOLD) {
            CharSearchOutcome::Accepted(m) => {
                assert_eq!(m.start_line, 1);
                assert_eq!(m.line_count, 2);
                assert!(m.confidence > 0.99);
            }
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[test]
    fn test_shifted_block_accepted() {
        // Uniformly deeper indentation — relative depth still matches
        let content = "mod m {\n        one();\n        two();\n}\n";
        let target = "    one();\n    two();";
        assert!(matches!(
            find_match(content, target, THRESHOLD),
            CharSearchOutcome::Accepted(_)
        ));
    }

    #[test]
    fn test_relative_depth_distinguishes_nesting() {
        // Pattern has both lines at baseline; the closer window nests the
        // second line, so the flat window must win.
        let content = "if x {\n    a();\n        b();\n}\na();\nb();\n";
        let target = "a();\nb();";
        match find_match(content, target, THRESHOLD) {
            CharSearchOutcome::Accepted(m) => assert_eq!(m.start_line, 4),
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[test]
    fn test_near_miss_reports_closest() {
        let content = "alpha\nbeta\ngamma\n";
        let target = "alphax\nbetax\ngammax";
        match find_match(content, target, THRESHOLD) {
            CharSearchOutcome::Closest { best, passing } => {
                assert_eq!(best.start_line, 0);
                assert_eq!(passing, 0);
                assert!(best.confidence > 0.5 && best.confidence < THRESHOLD);
            }
            other => panic!("expected closest, got {other:?}"),
        }
    }

    #[test]
    fn test_two_passing_windows_not_accepted() {
        let content = "x();\ny();\nmid\nx();\ny();\n";
        let target = "x();\ny();";
        match find_match(content, target, THRESHOLD) {
            CharSearchOutcome::Closest { passing, .. } => assert_eq!(passing, 2),
            other => panic!("expected closest with 2 passing, got {other:?}"),
        }
    }

    #[test]
    fn test_pattern_longer_than_file() {
        assert_eq!(
            find_match("one\n", "a\nb\nc\nd", THRESHOLD),
            CharSearchOutcome::None
        );
    }

    #[test]
    fn test_relaxed_retry_ignores_internal_indent_drift() {
        // Second line reflowed to a different relative depth; strict scoring
        // misses, flat retry lands it.
        let content = "start\nalpha();\n    beta();\nend\n";
        let target = "alpha();\nbeta();";
        match find_match(content, target, THRESHOLD) {
            CharSearchOutcome::Accepted(m) => assert_eq!(m.start_line, 1),
            other => panic!("expected accept via relaxed retry, got {other:?}"),
        }
    }
}
