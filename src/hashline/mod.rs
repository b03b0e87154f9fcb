//! Hashline mode: line-addressed edits keyed by `LINE:HASH` references.
//!
//! The hash is a staleness token. Every reference is validated against the
//! current file before anything mutates; a stale reference either relocates
//! silently (when its hash is unique in the file) or fails the whole call
//! atomically with a quick-fix listing.

pub mod hash;
pub mod heuristics;
pub mod parse;

use std::collections::{HashMap, HashSet};

use crate::error::{EditError, HashMismatch, HashlineMismatchError};
use crate::normalize::{fold_confusable_hyphens, has_confusable_hyphens};
use crate::preview::range_preview;
use hash::compute_line_hash;
use heuristics::{
    maybe_expand_merge, preserve_whitespace_only_lines, strip_copied_decoration,
    strip_insert_anchor_echo, strip_range_boundary_echo,
};
use parse::{parse_line_ref, HashlineEdit};

/// Warn when the applied change dwarfs the number of edit operations.
const CHANGE_SIZE_FACTOR: usize = 4;

#[derive(Debug)]
pub struct HashlineResult {
    pub content: String,
    /// 1-indexed first line that differs from the pre-state.
    pub first_changed_line: Option<usize>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Target {
    Line { line: usize, hash: String },
    Range { start: usize, start_hash: String, end: usize, end_hash: String },
    InsertAfter { line: usize, hash: String },
}

impl Target {
    /// Line the bottom-up sort orders by.
    fn sort_line(&self) -> usize {
        match self {
            Target::Line { line, .. } | Target::InsertAfter { line, .. } => *line,
            Target::Range { end, .. } => *end,
        }
    }

    /// Inserts apply after replacements at the same line.
    fn sort_precedence(&self) -> u8 {
        matches!(self, Target::InsertAfter { .. }) as u8
    }

    fn key(&self) -> String {
        match self {
            Target::Line { line, .. } => format!("l:{line}"),
            Target::Range { start, end, .. } => format!("r:{start}:{end}"),
            Target::InsertAfter { line, .. } => format!("i:{line}"),
        }
    }

    fn display(&self) -> String {
        match self {
            Target::Line { line, hash } => format!("{line}:{hash}"),
            Target::Range { start, start_hash, end, end_hash } => {
                format!("{start}:{start_hash}..{end}:{end_hash}")
            }
            Target::InsertAfter { line, hash } => format!("{line}:{hash}"),
        }
    }
}

struct ParsedEdit {
    index: usize,
    target: Target,
    dst_lines: Vec<String>,
}

fn split_content(content: &str) -> Vec<String> {
    if content.is_empty() {
        Vec::new()
    } else {
        content.split('\n').map(|s| s.to_string()).collect()
    }
}

fn parse_edit(index: usize, edit: &HashlineEdit) -> Result<ParsedEdit, EditError> {
    let bad = |msg: String| EditError::Parse { line: index + 1, message: msg };
    let (target, content) = match edit {
        HashlineEdit::ReplaceLine { replace_line } => {
            let r = parse_line_ref(&replace_line.loc).map_err(&bad)?;
            (Target::Line { line: r.line, hash: r.hash }, replace_line.content.clone())
        }
        HashlineEdit::ReplaceLines { replace_lines } => {
            let start = parse_line_ref(&replace_lines.start).map_err(&bad)?;
            let end = parse_line_ref(&replace_lines.end).map_err(&bad)?;
            if start.line == end.line {
                (
                    Target::Line { line: start.line, hash: start.hash },
                    replace_lines.content.clone(),
                )
            } else if start.line > end.line {
                return Err(bad(format!(
                    "range start line {} must be <= end line {}",
                    start.line, end.line
                )));
            } else {
                (
                    Target::Range {
                        start: start.line,
                        start_hash: start.hash,
                        end: end.line,
                        end_hash: end.hash,
                    },
                    replace_lines.content.clone(),
                )
            }
        }
        HashlineEdit::InsertAfter { insert_after } => {
            if insert_after.content.is_empty() {
                return Err(bad("insertAfter content must not be empty".to_string()));
            }
            let r = parse_line_ref(&insert_after.loc).map_err(&bad)?;
            (Target::InsertAfter { line: r.line, hash: r.hash }, insert_after.content.clone())
        }
    };
    let dst_lines = strip_copied_decoration(&split_content(&content));
    Ok(ParsedEdit { index, target, dst_lines })
}

/// Hashes that occur exactly once in the file, usable for relocation.
fn unique_hash_map(file_lines: &[String]) -> HashMap<String, usize> {
    let mut unique: HashMap<String, usize> = HashMap::new();
    let mut duplicates: HashSet<String> = HashSet::new();
    for (i, line) in file_lines.iter().enumerate() {
        let h = compute_line_hash(line);
        if duplicates.contains(&h) {
            continue;
        }
        if unique.remove(&h).is_some() {
            duplicates.insert(h);
            continue;
        }
        unique.insert(h, i + 1);
    }
    unique
}

/// Apply hashline edits to LF-normalized content. Fails atomically: any
/// out-of-range line, unrelocatable stale hash, or all-no-op outcome leaves
/// the caller's content untouched.
pub fn apply_hashline_edits(
    path: &str,
    content: &str,
    edits: &[HashlineEdit],
) -> Result<HashlineResult, EditError> {
    if edits.is_empty() {
        return Err(EditError::Parse {
            line: 1,
            message: "no hashline edits to apply".to_string(),
        });
    }

    let original_file_lines: Vec<String> = content.split('\n').map(|s| s.to_string()).collect();
    let mut file_lines = original_file_lines.clone();

    let mut parsed: Vec<ParsedEdit> = edits
        .iter()
        .enumerate()
        .map(|(i, e)| parse_edit(i, e))
        .collect::<Result<_, _>>()?;

    // Every line must exist before hashes are even considered.
    for p in &parsed {
        let check = |line: usize| -> Result<(), EditError> {
            if line > file_lines.len() {
                return Err(EditError::MatchNotFound(format!(
                    "{path}: line {line} does not exist (file has {} lines)",
                    file_lines.len(),
                )));
            }
            Ok(())
        };
        match &p.target {
            Target::Line { line, .. } | Target::InsertAfter { line, .. } => check(*line)?,
            Target::Range { start, end, .. } => {
                check(*start)?;
                check(*end)?;
            }
        }
    }

    // Validate every reference before any mutation, relocating stale refs
    // whose hash is unique in the file.
    let unique = unique_hash_map(&file_lines);
    let mut mismatches: Vec<HashMismatch> = Vec::new();

    let validate = |line: &mut usize, hash: &str, mismatches: &mut Vec<HashMismatch>| -> bool {
        let actual = compute_line_hash(&file_lines[*line - 1]);
        if actual == hash {
            return true;
        }
        if let Some(&relocated) = unique.get(hash) {
            tracing::debug!(from = *line, to = relocated, hash, "relocated stale line reference");
            *line = relocated;
            return true;
        }
        mismatches.push(HashMismatch { line: *line, expected: hash.to_string(), actual });
        false
    };

    for p in parsed.iter_mut() {
        match &mut p.target {
            Target::Line { line, hash } | Target::InsertAfter { line, hash } => {
                validate(line, hash, &mut mismatches);
            }
            Target::Range { start, start_hash, end, end_hash } => {
                let (orig_start, orig_end) = (*start, *end);
                let orig_count = orig_end - orig_start + 1;
                let start_ok = validate(start, start_hash, &mut mismatches);
                let end_ok = validate(end, end_hash, &mut mismatches);
                if start_ok && end_ok && (*start != orig_start || *end != orig_end) {
                    // Relocation must not change the range's shape; a range
                    // that inverted or resized after relocation is stale.
                    let inverted = *start > *end;
                    let resized = *end - *start + 1 != orig_count;
                    if inverted || resized {
                        *start = orig_start;
                        *end = orig_end;
                        mismatches.push(HashMismatch {
                            line: orig_start,
                            expected: start_hash.clone(),
                            actual: compute_line_hash(&file_lines[orig_start - 1]),
                        });
                        mismatches.push(HashMismatch {
                            line: orig_end,
                            expected: end_hash.clone(),
                            actual: compute_line_hash(&file_lines[orig_end - 1]),
                        });
                    }
                }
            }
        }
    }

    if !mismatches.is_empty() {
        return Err(HashlineMismatchError::new(path, mismatches, &file_lines).into());
    }

    // Relocation may have moved references; the merge heuristics must see
    // the true targets, so the touched set is built after it.
    let touched: HashSet<usize> = parsed
        .iter()
        .flat_map(|p| match &p.target {
            Target::Line { line, .. } | Target::InsertAfter { line, .. } => *line..=*line,
            Target::Range { start, end, .. } => *start..=*end,
        })
        .collect();

    // Identical edits collapse to one application.
    let mut seen: HashSet<String> = HashSet::new();
    parsed.retain(|p| seen.insert(format!("{}|{}", p.target.key(), p.dst_lines.join("\n"))));

    // Bottom-up: highest line first, inserts after replaces at the same
    // line, original order as the tiebreak.
    parsed.sort_by(|a, b| {
        b.target
            .sort_line()
            .cmp(&a.target.sort_line())
            .then(a.target.sort_precedence().cmp(&b.target.sort_precedence()))
            .then(a.index.cmp(&b.index))
    });

    let mut first_changed_line: Option<usize> = None;
    let mut noops: Vec<(usize, String, String)> = Vec::new();
    let track = |first: &mut Option<usize>, line: usize| {
        if first.is_none_or(|f| line < f) {
            *first = Some(line);
        }
    };

    for p in &parsed {
        match &p.target {
            Target::Line { line, .. } => {
                let line = *line;

                if let Some((start, delete_count)) =
                    maybe_expand_merge(line, &p.dst_lines, &file_lines, &touched)
                {
                    let orig: Vec<String> =
                        file_lines[start - 1..start - 1 + delete_count].to_vec();
                    if orig.join("\n") == p.dst_lines.join("\n") {
                        noops.push((p.index, p.target.display(), orig.join("\n")));
                        continue;
                    }
                    tracing::debug!(line, start, "merge expansion absorbed a neighbor line");
                    file_lines.splice(start - 1..start - 1 + delete_count, p.dst_lines.iter().cloned());
                    track(&mut first_changed_line, start);
                    continue;
                }

                let orig = vec![file_lines[line - 1].clone()];
                let mut new_lines =
                    strip_range_boundary_echo(&file_lines, line, line, &p.dst_lines);
                new_lines = preserve_whitespace_only_lines(&orig, &new_lines);
                if orig.join("\n") == new_lines.join("\n")
                    && orig.iter().any(|l| has_confusable_hyphens(l))
                {
                    new_lines = new_lines.iter().map(|l| fold_confusable_hyphens(l)).collect();
                }
                if orig == new_lines {
                    noops.push((p.index, p.target.display(), orig.join("\n")));
                    continue;
                }
                file_lines.splice(line - 1..line, new_lines);
                track(&mut first_changed_line, line);
            }
            Target::Range { start, end, .. } => {
                let (start, end) = (*start, *end);
                let count = end - start + 1;
                let orig: Vec<String> = file_lines[start - 1..start - 1 + count].to_vec();
                let mut new_lines = strip_range_boundary_echo(&file_lines, start, end, &p.dst_lines);
                new_lines = preserve_whitespace_only_lines(&orig, &new_lines);
                if orig.join("\n") == new_lines.join("\n")
                    && orig.iter().any(|l| has_confusable_hyphens(l))
                {
                    new_lines = new_lines.iter().map(|l| fold_confusable_hyphens(l)).collect();
                }
                if orig == new_lines {
                    noops.push((p.index, p.target.display(), orig.join("\n")));
                    continue;
                }
                file_lines.splice(start - 1..start - 1 + count, new_lines);
                track(&mut first_changed_line, start);
            }
            Target::InsertAfter { line, .. } => {
                let line = *line;
                let inserted = strip_insert_anchor_echo(&file_lines[line - 1], &p.dst_lines);
                if inserted.is_empty() {
                    noops.push((p.index, p.target.display(), file_lines[line - 1].clone()));
                    continue;
                }
                file_lines.splice(line..line, inserted);
                track(&mut first_changed_line, line + 1);
            }
        }
    }

    if file_lines == original_file_lines {
        let (lo, hi) = noops
            .first()
            .and_then(|(_, loc, _)| loc.split(':').next()?.parse::<usize>().ok())
            .map(|l| (l, l))
            .unwrap_or((1, 1));
        return Err(EditError::IdenticalResult(format!(
            "hashline edits produced identical content for {path} — the targeted lines already \
             read:\n{}",
            range_preview(&original_file_lines, lo, hi),
        )));
    }

    let mut warnings: Vec<String> = Vec::new();
    for (index, loc, current) in &noops {
        warnings.push(format!(
            "edit {} ({loc}) was a no-op — the line already reads: {current}",
            index + 1,
        ));
    }

    let mut diff_line_count =
        file_lines.len().abs_diff(original_file_lines.len());
    for i in 0..file_lines.len().min(original_file_lines.len()) {
        if file_lines[i] != original_file_lines[i] {
            diff_line_count += 1;
        }
    }
    if diff_line_count > edits.len() * CHANGE_SIZE_FACTOR {
        tracing::warn!(diff_line_count, edits = edits.len(), "oversized hashline change");
        warnings.push(format!(
            "edits changed {diff_line_count} lines across {} operations — double-check for \
             unintended reformatting",
            edits.len(),
        ));
    }

    Ok(HashlineResult {
        content: file_lines.join("\n"),
        first_changed_line,
        warnings,
    })
}
