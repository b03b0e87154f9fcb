//! Line-sequence search with progressive strictness passes.
//!
//! Patch-mode placement runs the passes below in order, strict to lenient,
//! and takes the first pass that finds anything. Confidence is a property of
//! the accepting pass, not just of string similarity, so the order is part
//! of the contract.

use crate::matcher::char_search::{find_match, CharSearchOutcome};
use crate::matcher::similarity::similarity;
use crate::normalize::normalize_for_fuzzy;

/// Minimum normalized pattern length for substring matching (pass 6).
const SUBSTRING_MIN_CHARS: usize = 6;
/// Minimum share of the file line a substring match must cover (pass 6).
const SUBSTRING_MIN_RATIO: f64 = 0.30;
/// Mean-similarity floor for pass 7.
const SIMILARITY_FLOOR: f64 = 0.92;

/// Which pass accepted a match. Ordinals follow the strictness ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPass {
    Exact,
    TrimEnd,
    Trim,
    CommentStripped,
    Unicode,
    Prefix,
    Substring,
    Similarity,
    CharWindow,
}

impl SeekPass {
    /// Fixed confidence for the predicate passes. Similarity passes carry
    /// their own score instead.
    fn confidence(self) -> f64 {
        match self {
            SeekPass::Exact => 1.0,
            SeekPass::TrimEnd => 0.99,
            SeekPass::Trim => 0.98,
            SeekPass::CommentStripped => 0.975,
            SeekPass::Unicode => 0.97,
            SeekPass::Prefix => 0.965,
            SeekPass::Substring => 0.94,
            SeekPass::Similarity | SeekPass::CharWindow => unreachable!("scored pass"),
        }
    }
}

/// A placed pattern. `start` is the 0-indexed line of the first pattern
/// line; `positions` lists every start the accepting pass found in the
/// scanned range, so the caller can detect and resolve ambiguity.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekMatch {
    pub start: usize,
    pub confidence: f64,
    pub pass: SeekPass,
    pub positions: Vec<usize>,
}

impl SeekMatch {
    pub fn match_count(&self) -> usize {
        self.positions.len()
    }
}

/// Strip a leading line-comment marker after trimming. `// x`, `# x`,
/// `-- x`, `* x` and `; x` all compare equal to `x`.
fn strip_comment_prefix(line: &str) -> &str {
    let t = line.trim();
    for marker in ["///", "//!", "//", "#", "--", ";", "*"] {
        if let Some(rest) = t.strip_prefix(marker) {
            return rest.trim();
        }
    }
    t
}

fn window_matches<F>(file_lines: &[String], pattern: &[String], start: usize, eq: &F) -> bool
where
    F: Fn(&str, &str) -> bool,
{
    pattern
        .iter()
        .enumerate()
        .all(|(i, p)| eq(&file_lines[start + i], p))
}

/// Collect every window start in `[from, end]` where all pattern lines
/// satisfy `eq` pairwise.
fn collect<F>(file_lines: &[String], pattern: &[String], from: usize, eq: F) -> Vec<usize>
where
    F: Fn(&str, &str) -> bool,
{
    let n = pattern.len();
    let mut out = Vec::new();
    if n == 0 || file_lines.len() < n {
        return out;
    }
    for start in from..=(file_lines.len() - n) {
        if window_matches(file_lines, pattern, start, &eq) {
            out.push(start);
        }
    }
    out
}

fn predicate_for(pass: SeekPass) -> fn(&str, &str) -> bool {
    match pass {
        SeekPass::Exact => |a, b| a == b,
        SeekPass::TrimEnd => |a, b| a.trim_end() == b.trim_end(),
        SeekPass::Trim => |a, b| a.trim() == b.trim(),
        SeekPass::CommentStripped => |a, b| {
            let a = strip_comment_prefix(a);
            let b = strip_comment_prefix(b);
            !a.is_empty() && a == b
        },
        SeekPass::Unicode => |a, b| normalize_for_fuzzy(a) == normalize_for_fuzzy(b),
        SeekPass::Prefix => |a, b| {
            let a = normalize_for_fuzzy(a);
            let b = normalize_for_fuzzy(b);
            !b.is_empty() && a.starts_with(&b)
        },
        SeekPass::Substring => |a, b| {
            let a = normalize_for_fuzzy(a);
            let b = normalize_for_fuzzy(b);
            let b_chars = b.chars().count();
            b_chars >= SUBSTRING_MIN_CHARS
                && a.contains(&b)
                && b_chars as f64 >= SUBSTRING_MIN_RATIO * a.chars().count() as f64
        },
        SeekPass::Similarity | SeekPass::CharWindow => unreachable!("scored pass"),
    }
}

const PREDICATE_PASSES: [SeekPass; 7] = [
    SeekPass::Exact,
    SeekPass::TrimEnd,
    SeekPass::Trim,
    SeekPass::CommentStripped,
    SeekPass::Unicode,
    SeekPass::Prefix,
    SeekPass::Substring,
];

fn seek_from(
    file_lines: &[String],
    pattern: &[String],
    start: usize,
    allow_fuzzy: bool,
    fuzzy_threshold: f64,
) -> Option<SeekMatch> {
    for pass in PREDICATE_PASSES {
        let positions = collect(file_lines, pattern, start, predicate_for(pass));
        if let Some(&first) = positions.first() {
            tracing::trace!(?pass, first, count = positions.len(), "seek pass matched");
            return Some(SeekMatch {
                start: first,
                confidence: pass.confidence(),
                pass,
                positions,
            });
        }
    }

    if !allow_fuzzy {
        return None;
    }

    // Pass 7: mean normalized-line similarity over a sliding window.
    let pattern_norm: Vec<String> = pattern.iter().map(|l| normalize_for_fuzzy(l)).collect();
    let n = pattern.len();
    if n > 0 && file_lines.len() >= n {
        let mut best: Option<(usize, f64)> = None;
        let mut positions = Vec::new();
        for s in start..=(file_lines.len() - n) {
            let window_norm: Vec<String> = file_lines[s..s + n]
                .iter()
                .map(|l| normalize_for_fuzzy(l))
                .collect();
            let score: f64 = window_norm
                .iter()
                .zip(pattern_norm.iter())
                .map(|(a, b)| similarity(a, b))
                .sum::<f64>()
                / n as f64;
            if score >= SIMILARITY_FLOOR {
                positions.push(s);
                if best.is_none_or(|(_, b)| score > b) {
                    best = Some((s, score));
                }
            }
        }
        if let Some((s, score)) = best {
            tracing::trace!(start = s, score, "seek similarity pass matched");
            return Some(SeekMatch {
                start: s,
                confidence: score,
                pass: SeekPass::Similarity,
                positions,
            });
        }
    }

    // Pass 8: character-window fallback.
    let tail = file_lines[start..].join("\n");
    let target = pattern.join("\n");
    if let CharSearchOutcome::Accepted(m) = find_match(&tail, &target, fuzzy_threshold) {
        return Some(SeekMatch {
            start: start + m.start_line,
            confidence: m.confidence,
            pass: SeekPass::CharWindow,
            positions: vec![start + m.start_line],
        });
    }

    None
}

/// Search for a contiguous match of `pattern` in `file_lines` at or after
/// `start`. When `eof` is set, try the end-of-file position first and fall
/// back to the normal scan.
pub fn seek_sequence(
    file_lines: &[String],
    pattern: &[String],
    start: usize,
    eof: bool,
    allow_fuzzy: bool,
    fuzzy_threshold: f64,
) -> Option<SeekMatch> {
    if pattern.is_empty() {
        return None;
    }
    if eof && file_lines.len() >= pattern.len() {
        let tail_start = file_lines.len() - pattern.len();
        if let Some(m) = seek_from(file_lines, pattern, tail_start, allow_fuzzy, fuzzy_threshold) {
            return Some(m);
        }
    }
    seek_from(file_lines, pattern, start, allow_fuzzy, fuzzy_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &[&str]) -> Vec<String> {
        s.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn test_exact_pass() {
        let file = lines(&["a", "b", "c"]);
        let m = seek_sequence(&file, &lines(&["b", "c"]), 0, false, true, 0.95).unwrap();
        assert_eq!(m.start, 1);
        assert_eq!(m.pass, SeekPass::Exact);
        assert_eq!(m.confidence, 1.0);
    }

    #[test]
    fn test_trim_end_pass() {
        let file = lines(&["fn a() {  ", "}"]);
        let m = seek_sequence(&file, &lines(&["fn a() {"]), 0, false, true, 0.95).unwrap();
        assert_eq!(m.pass, SeekPass::TrimEnd);
        assert_eq!(m.confidence, 0.99);
    }

    #[test]
    fn test_trim_pass() {
        let file = lines(&["    let x = 1;"]);
        let m = seek_sequence(&file, &lines(&["let x = 1;"]), 0, false, true, 0.95).unwrap();
        assert_eq!(m.pass, SeekPass::Trim);
    }

    #[test]
    fn test_comment_stripped_pass() {
        let file = lines(&["# compute totals"]);
        let m = seek_sequence(&file, &lines(&["// compute totals"]), 0, false, true, 0.95).unwrap();
        assert_eq!(m.pass, SeekPass::CommentStripped);
        assert_eq!(m.confidence, 0.975);
    }

    #[test]
    fn test_unicode_pass() {
        let file = lines(&["let s = \u{201C}hi\u{201D};"]);
        let m = seek_sequence(&file, &lines(&["let s = \"hi\";"]), 0, false, true, 0.95).unwrap();
        assert_eq!(m.pass, SeekPass::Unicode);
    }

    #[test]
    fn test_prefix_pass() {
        let file = lines(&["let value = compute(a, b); // trailing note"]);
        let m = seek_sequence(&file, &lines(&["let value = compute(a, b);"]), 0, false, true, 0.95)
            .unwrap();
        assert_eq!(m.pass, SeekPass::Prefix);
        assert_eq!(m.confidence, 0.965);
    }

    #[test]
    fn test_substring_pass_requires_coverage() {
        // Pattern covers well over 30% of the line and is ≥ 6 chars
        let file = lines(&["wrapped(compute_total(x))"]);
        let m = seek_sequence(&file, &lines(&["compute_total(x)"]), 0, false, true, 0.95).unwrap();
        assert_eq!(m.pass, SeekPass::Substring);

        // Too small a share of a long line: predicate passes all fail, and
        // similarity cannot reach the floor either
        let file = lines(&[
            "some_very_long_expression_with_many_parts(alpha, beta, gamma, delta, epsilon)",
        ]);
        let m = seek_sequence(&file, &lines(&["beta"]), 0, false, false, 0.95);
        assert!(m.is_none());
    }

    #[test]
    fn test_substring_coverage_counts_chars_not_bytes() {
        // 12 CJK chars + a 6-char ASCII pattern: 6/18 chars is exactly the
        // 30% floor, while the byte ratio (6/42) would be far below it
        let file = lines(&["漢字漢字漢字漢字漢字漢字foobar"]);
        let m = seek_sequence(&file, &lines(&["foobar"]), 0, false, true, 0.95).unwrap();
        assert_eq!(m.pass, SeekPass::Substring);
        assert_eq!(m.start, 0);
    }

    #[test]
    fn test_similarity_pass() {
        // Mid-line typo: every predicate pass fails, similarity lands it
        let file = lines(&["let totaal = price * quantity;"]);
        let pat = lines(&["let total = price * quantity;"]);
        let m = seek_sequence(&file, &pat, 0, false, true, 0.95).unwrap();
        assert_eq!(m.pass, SeekPass::Similarity);
        assert!(m.confidence >= 0.92 && m.confidence < 1.0);
    }

    #[test]
    fn test_fuzzy_gated() {
        let file = lines(&["let totaal = price * quantity;"]);
        let pat = lines(&["let total = price * quantity;"]);
        assert!(seek_sequence(&file, &pat, 0, false, false, 0.95).is_none());
    }

    #[test]
    fn test_ambiguity_counted() {
        let file = lines(&["x", "y", "x", "y", "x"]);
        let m = seek_sequence(&file, &lines(&["x", "y"]), 0, false, true, 0.95).unwrap();
        assert_eq!(m.start, 0);
        assert_eq!(m.match_count(), 2);
        assert_eq!(m.positions, vec![0, 2]);
    }

    #[test]
    fn test_start_index_respected() {
        let file = lines(&["x", "y", "x", "y"]);
        let m = seek_sequence(&file, &lines(&["x", "y"]), 1, false, true, 0.95).unwrap();
        assert_eq!(m.start, 2);
    }

    #[test]
    fn test_eof_tries_tail_first() {
        let file = lines(&["x", "mid", "x"]);
        let m = seek_sequence(&file, &lines(&["x"]), 0, true, true, 0.95).unwrap();
        assert_eq!(m.start, 2);
    }

    #[test]
    fn test_eof_falls_back_to_scan() {
        let file = lines(&["target", "a", "b"]);
        let m = seek_sequence(&file, &lines(&["target"]), 0, true, true, 0.95).unwrap();
        assert_eq!(m.start, 0);
    }
}
