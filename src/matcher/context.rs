//! `@@` anchor resolution: locate a single context line, possibly through a
//! hierarchical scope chain.

use crate::matcher::similarity::similarity;
use crate::normalize::{normalize_for_fuzzy, normalize_unicode};

/// Minimum share of the file line a substring anchor must cover when the
/// substring pass finds more than one candidate.
const SUBSTRING_MIN_RATIO: f64 = 0.30;
/// Mean-similarity floor for the final context pass.
const CONTEXT_SIMILARITY_FLOOR: f64 = 0.80;

/// A located context line. `line` is 0-indexed; `positions` lists every
/// candidate the accepting pass produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextMatch {
    pub line: usize,
    pub confidence: f64,
    pub positions: Vec<usize>,
}

impl ContextMatch {
    pub fn is_unique(&self) -> bool {
        self.positions.len() == 1
    }
}

/// Outcome of resolving a whole `changeContext` value.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextResolution {
    Found { line: usize, confidence: f64 },
    Ambiguous { positions: Vec<usize> },
    NotFound,
}

fn collect_single<F>(file_lines: &[String], from: usize, pred: F) -> Vec<usize>
where
    F: Fn(&str) -> bool,
{
    (from..file_lines.len())
        .filter(|&i| pred(&file_lines[i]))
        .collect()
}

/// One run of the six-pass ladder for a literal anchor string.
fn find_context_line_once(file_lines: &[String], anchor: &str, from: usize) -> Option<ContextMatch> {
    // 1. Exact
    let positions = collect_single(file_lines, from, |l| l == anchor);
    if !positions.is_empty() {
        return Some(ContextMatch { line: positions[0], confidence: 1.0, positions });
    }

    // 2. Trimmed
    let anchor_trim = anchor.trim();
    let positions = collect_single(file_lines, from, |l| l.trim() == anchor_trim);
    if !positions.is_empty() {
        return Some(ContextMatch { line: positions[0], confidence: 0.98, positions });
    }

    // 3. Unicode-normalized (light fold)
    let anchor_uni = normalize_unicode(anchor_trim);
    let positions = collect_single(file_lines, from, |l| {
        normalize_unicode(l.trim()) == anchor_uni
    });
    if !positions.is_empty() {
        return Some(ContextMatch { line: positions[0], confidence: 0.97, positions });
    }

    // 4. Normalized prefix
    let anchor_norm = normalize_for_fuzzy(anchor);
    if !anchor_norm.is_empty() {
        let positions = collect_single(file_lines, from, |l| {
            normalize_for_fuzzy(l).starts_with(&anchor_norm)
        });
        if !positions.is_empty() {
            return Some(ContextMatch { line: positions[0], confidence: 0.965, positions });
        }

        // 5. Normalized substring, with uniqueness rescue: a single hit is
        // accepted regardless of how little of the line it covers; multiple
        // hits must each cover a meaningful share.
        let loose = collect_single(file_lines, from, |l| {
            normalize_for_fuzzy(l).contains(&anchor_norm)
        });
        if loose.len() == 1 {
            return Some(ContextMatch { line: loose[0], confidence: 0.94, positions: loose });
        }
        if loose.len() > 1 {
            let anchor_chars = anchor_norm.chars().count();
            let filtered: Vec<usize> = loose
                .into_iter()
                .filter(|&i| {
                    let line_chars = normalize_for_fuzzy(&file_lines[i]).chars().count();
                    anchor_chars as f64 >= SUBSTRING_MIN_RATIO * line_chars as f64
                })
                .collect();
            if !filtered.is_empty() {
                return Some(ContextMatch {
                    line: filtered[0],
                    confidence: 0.94,
                    positions: filtered,
                });
            }
        }
    }

    // 6. Similarity
    let mut best: Option<(usize, f64)> = None;
    let mut positions = Vec::new();
    for i in from..file_lines.len() {
        let score = similarity(&normalize_for_fuzzy(&file_lines[i]), &anchor_norm);
        if score >= CONTEXT_SIMILARITY_FLOOR {
            positions.push(i);
            if best.is_none_or(|(_, b)| score > b) {
                best = Some((i, score));
            }
        }
    }
    best.map(|(line, confidence)| ContextMatch { line, confidence, positions })
}

/// Locate a single context line at or after `from`. Function-like anchors
/// ending in `()` get two retries: with a bare `(` and with no parentheses,
/// to survive models quoting a signature differently than the source.
pub fn find_context_line(file_lines: &[String], anchor: &str, from: usize) -> Option<ContextMatch> {
    if let Some(m) = find_context_line_once(file_lines, anchor, from) {
        return Some(m);
    }
    if let Some(stem) = anchor.trim_end().strip_suffix("()") {
        let open = format!("{stem}(");
        if let Some(m) = find_context_line_once(file_lines, &open, from) {
            return Some(m);
        }
        if let Some(m) = find_context_line_once(file_lines, stem, from) {
            return Some(m);
        }
    }
    None
}

fn has_signature_chars(s: &str) -> bool {
    s.contains(['(', ')', '[', ']', '{', '}'])
}

fn disambiguate(m: ContextMatch, line_hint: Option<usize>) -> ContextResolution {
    if m.is_unique() {
        return ContextResolution::Found { line: m.line, confidence: m.confidence };
    }
    match line_hint {
        Some(hint) => {
            // Hint is 1-indexed; pick the candidate closest to it
            let target = hint.saturating_sub(1);
            let line = m
                .positions
                .iter()
                .copied()
                .min_by_key(|&p| p.abs_diff(target))
                .unwrap_or(m.line);
            ContextResolution::Found { line, confidence: m.confidence }
        }
        None => ContextResolution::Ambiguous { positions: m.positions },
    }
}

/// Resolve a `changeContext` value against the file.
///
/// A multi-line anchor is a scope chain: each line is resolved in turn,
/// each subsequent one starting after the previous match. A single-line
/// anchor with more than two space-separated tokens and no signature
/// characters is treated as an `outer inner` pair. Ambiguity in the
/// innermost anchor resolves against `line_hint` when one is given.
pub fn resolve_change_context(
    file_lines: &[String],
    change_context: &str,
    from: usize,
    line_hint: Option<usize>,
) -> ContextResolution {
    if change_context.contains('\n') {
        let chain: Vec<&str> = change_context
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let mut cursor = from;
        let mut last: Option<ContextMatch> = None;
        for (depth, anchor) in chain.iter().enumerate() {
            match find_context_line(file_lines, anchor, cursor) {
                Some(m) => {
                    cursor = m.line + 1;
                    if depth + 1 == chain.len() {
                        return disambiguate(m, line_hint);
                    }
                    last = Some(m);
                }
                None => return ContextResolution::NotFound,
            }
        }
        return match last {
            Some(m) => disambiguate(m, line_hint),
            None => ContextResolution::NotFound,
        };
    }

    let tokens: Vec<&str> = change_context.split_whitespace().collect();
    if tokens.len() > 2 && !has_signature_chars(change_context) {
        let split = tokens.len().div_ceil(2);
        let outer = tokens[..split].join(" ");
        let inner = tokens[split..].join(" ");
        if let Some(outer_match) = find_context_line(file_lines, &outer, from) {
            if let Some(inner_match) = find_context_line(file_lines, &inner, outer_match.line + 1) {
                return disambiguate(inner_match, line_hint);
            }
        }
        // Fall through to treating the whole string as one anchor
    }

    match find_context_line(file_lines, change_context, from) {
        Some(m) => disambiguate(m, line_hint),
        None => ContextResolution::NotFound,
    }
}
