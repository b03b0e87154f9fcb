//! Patch-mode application: place each hunk, compute non-overlapping
//! replacements, apply them in reverse order.
//!
//! Placement is where all the leniency lives — anchors resolve through the
//! context ladder, patterns through the progressive seek passes, and a
//! pattern that still cannot be placed gets retried through generated
//! fallback variants before the hunk is declared lost.

use crate::config::EditConfig;
use crate::error::EditError;
use crate::hunk::DiffHunk;
use crate::indent::reconcile_indentation;
use crate::matcher::context::ContextResolution;
use crate::matcher::resolve_change_context;
use crate::matcher::seek::{seek_sequence, SeekMatch};
use crate::preview::{format_line, framed_previews};

/// A computed region substitution. `start_index` is a 0-indexed line;
/// `old_len` may be zero for pure insertions.
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub start_index: usize,
    pub old_len: usize,
    pub new_lines: Vec<String>,
}

#[derive(Debug)]
pub struct PatchResult {
    pub content: String,
    /// 1-indexed first line that actually differs from the pre-state.
    pub first_changed_line: Option<usize>,
}

struct Placed {
    replacement: Replacement,
    next_index: usize,
}

/// Apply parsed hunks to LF-normalized content. All hunks place against the
/// original line array; replacements apply descending afterwards so indices
/// stay valid. The call either applies every hunk or fails applying none.
pub fn apply_patch(
    path: &str,
    content: &str,
    hunks: &[DiffHunk],
    config: &EditConfig,
) -> Result<PatchResult, EditError> {
    let had_trailing_newline = content.ends_with('\n');
    let mut file_lines: Vec<String> = content.split('\n').map(|s| s.to_string()).collect();
    // Drop the empty element produced by the final newline so line counts
    // match diff semantics.
    if had_trailing_newline {
        file_lines.pop();
    }

    let mut replacements: Vec<Replacement> = Vec::new();
    let mut line_index = 0usize;

    for (i, hunk) in hunks.iter().enumerate() {
        let placed = place_hunk(path, &file_lines, hunk, line_index, config).map_err(|e| {
            annotate_hunk_failure(e, i, hunks.len())
        })?;
        line_index = placed.next_index;
        replacements.push(placed.replacement);
    }

    // Zero-length insertions sort before a replacement at the same index so
    // the reverse-order application touches the replacement's region first.
    replacements.sort_by_key(|r| (r.start_index, r.old_len));
    for pair in replacements.windows(2) {
        if pair[1].start_index < pair[0].start_index + pair[0].old_len {
            return Err(EditError::MatchNotFound(format!(
                "two hunks resolved to overlapping regions of {path} (lines {} and {}) — \
                 merge them into one hunk",
                pair[0].start_index + 1,
                pair[1].start_index + 1,
            )));
        }
    }

    let first_changed_line = first_changed(&file_lines, &replacements);

    let mut out_lines = file_lines.clone();
    for r in replacements.iter().rev() {
        out_lines.splice(r.start_index..r.start_index + r.old_len, r.new_lines.iter().cloned());
    }

    let mut out = out_lines.join("\n");
    if had_trailing_newline {
        out.push('\n');
    } else {
        while out.ends_with('\n') {
            out.pop();
        }
    }

    if out == content {
        let r = replacements.first();
        let (lo, hi) = r
            .map(|r| (r.start_index + 1, r.start_index + r.old_len.max(1)))
            .unwrap_or((1, 1));
        return Err(EditError::IdenticalResult(format!(
            "patch produced identical content for {path} — the file already looks like this:\n{}",
            crate::preview::range_preview(&file_lines, lo, hi),
        )));
    }

    Ok(PatchResult { content: out, first_changed_line })
}

fn annotate_hunk_failure(e: EditError, index: usize, total: usize) -> EditError {
    if total <= 1 {
        return e;
    }
    let tag = format!("hunk {}/{}: ", index + 1, total);
    match e {
        EditError::MatchNotFound(m) => EditError::MatchNotFound(format!("{tag}{m}")),
        EditError::AmbiguousMatch(m) => EditError::AmbiguousMatch(format!("{tag}{m}")),
        other => other,
    }
}

// ── Hunk placement ────────────────────────────────────────────────────────────

fn place_hunk(
    path: &str,
    file_lines: &[String],
    hunk: &DiffHunk,
    line_index: usize,
    config: &EditConfig,
) -> Result<Placed, EditError> {
    let mut cursor = line_index;
    let mut context_idx: Option<usize> = None;

    if let Some(ctx) = &hunk.change_context {
        match resolve_change_context(file_lines, ctx, cursor, hunk.old_start_line) {
            ContextResolution::Found { line, .. } => {
                context_idx = Some(line);
                let innermost = ctx.lines().last().unwrap_or("").trim();
                let starts_at_context = hunk
                    .old_lines
                    .first()
                    .is_some_and(|l| l.trim() == innermost);
                cursor = if starts_at_context { line } else { line + 1 };
            }
            ContextResolution::Ambiguous { positions } => {
                // The pattern itself may be unique even when the anchor is
                // not; fall back to placing old_lines directly.
                if let Some(p) = unique_direct_match(file_lines, hunk, cursor, config) {
                    return finish_placement(file_lines, &hunk.old_lines, &hunk.new_lines, p);
                }
                return Err(EditError::AmbiguousMatch(format!(
                    "Found {} matches for context '{}' in {path}:\n{}\
                     Add more surrounding context or additional @@ anchors to disambiguate.",
                    positions.len(),
                    ctx.replace('\n', " → "),
                    framed_previews(file_lines, &positions, 1),
                )));
            }
            ContextResolution::NotFound => {
                if let Some(p) = unique_direct_match(file_lines, hunk, cursor, config) {
                    return finish_placement(file_lines, &hunk.old_lines, &hunk.new_lines, p);
                }
                return Err(EditError::MatchNotFound(format!(
                    "Failed to find context '{}' in {path}. \
                     Check the anchor against the current file content.",
                    ctx.replace('\n', " → "),
                )));
            }
        }
    }

    // Pure insertion: no old lines to match.
    if hunk.old_lines.is_empty() {
        let insert_idx = if context_idx.is_some() {
            cursor
        } else if let Some(hint) = hunk.old_start_line {
            hint.saturating_sub(1).min(file_lines.len())
        } else {
            file_lines.len()
        };
        return Ok(Placed {
            replacement: Replacement {
                start_index: insert_idx,
                old_len: 0,
                new_lines: hunk.new_lines.clone(),
            },
            next_index: insert_idx,
        });
    }

    // Pattern placement, through fallback variants when the literal pattern
    // cannot be found.
    for (old_v, new_v) in pattern_variants(&hunk.old_lines, &hunk.new_lines) {
        if old_v.is_empty() {
            continue;
        }
        let Some(m) = seek_sequence(
            file_lines,
            &old_v,
            cursor,
            hunk.is_end_of_file,
            config.fuzzy_enabled,
            config.fuzzy_threshold,
        ) else {
            continue;
        };
        let chosen = choose_position(path, file_lines, hunk, &m, &old_v, &new_v, context_idx)?;
        return finish_placement(file_lines, &old_v, &new_v, chosen);
    }

    Err(EditError::MatchNotFound(not_found_message(path, file_lines, hunk, cursor)))
}

/// Sequence fallback used when the anchor is ambiguous or missing: accept
/// only a unique direct match of the pattern.
fn unique_direct_match(
    file_lines: &[String],
    hunk: &DiffHunk,
    cursor: usize,
    config: &EditConfig,
) -> Option<usize> {
    if hunk.old_lines.is_empty() {
        return None;
    }
    let m = seek_sequence(
        file_lines,
        &hunk.old_lines,
        cursor,
        hunk.is_end_of_file,
        config.fuzzy_enabled,
        config.fuzzy_threshold,
    )?;
    (m.match_count() == 1).then_some(m.start)
}

fn finish_placement(
    file_lines: &[String],
    old_v: &[String],
    new_v: &[String],
    start: usize,
) -> Result<Placed, EditError> {
    let actual = &file_lines[start..start + old_v.len()];
    let adjusted = reconcile_indentation(old_v, actual, new_v);
    Ok(Placed {
        replacement: Replacement {
            start_index: start,
            old_len: old_v.len(),
            new_lines: adjusted,
        },
        next_index: start + old_v.len(),
    })
}

fn not_found_message(
    path: &str,
    file_lines: &[String],
    hunk: &DiffHunk,
    cursor: usize,
) -> String {
    let shown: Vec<String> = hunk
        .old_lines
        .iter()
        .take(8)
        .map(|l| format!("  {l}"))
        .collect();
    let ellipsis = if hunk.old_lines.len() > 8 { "\n  ..." } else { "" };
    let near = hunk.old_start_line.map(|h| h.saturating_sub(1)).unwrap_or(cursor);
    let lo = near.saturating_sub(4);
    let hi = (near + 5).min(file_lines.len());
    let context: String = (lo..hi).map(|i| format_line(i + 1, &file_lines[i])).collect();
    format!(
        "Expected lines not found in {path}:\n{}{ellipsis}\n\
         File content near line {}:\n{context}\
         Check whitespace and exact characters, or add an @@ anchor.",
        shown.join("\n"),
        near + 1,
    )
}

// ── Ambiguity resolution ──────────────────────────────────────────────────────

fn choose_position(
    path: &str,
    file_lines: &[String],
    hunk: &DiffHunk,
    m: &SeekMatch,
    old_v: &[String],
    new_v: &[String],
    context_idx: Option<usize>,
) -> Result<usize, EditError> {
    if m.match_count() <= 1 {
        return Ok(m.start);
    }

    // Single repeated line near a resolved anchor: pick the occurrence
    // adjacent to the anchor, forward first.
    if old_v.len() == 1 {
        if let Some(ctx) = context_idx {
            let forward: Vec<usize> =
                m.positions.iter().copied().filter(|&p| p > ctx).collect();
            let backward: Vec<usize> =
                m.positions.iter().copied().filter(|&p| p < ctx).collect();
            let deleted_reappears = new_v.iter().any(|n| n.trim() == old_v[0].trim())
                && new_v.len() != old_v.len();
            if deleted_reappears && forward.len() >= 2 {
                return Ok(forward[1]);
            }
            if let Some(&first_forward) = forward.first() {
                return Ok(first_forward);
            }
            if let Some(&last_backward) = backward.last() {
                return Ok(last_backward);
            }
        }
    }

    // A line hint disambiguates anything.
    if let Some(hint) = hunk.old_start_line {
        let target = hint.saturating_sub(1);
        return Ok(m
            .positions
            .iter()
            .copied()
            .min_by_key(|&p| p.abs_diff(target))
            .unwrap_or(m.start));
    }

    // No anchor, no context lines, no EOF, no hint: refuse rather than
    // guess.
    if hunk.change_context.is_none()
        && !hunk.has_context_lines
        && !hunk.is_end_of_file
    {
        return Err(EditError::AmbiguousMatch(format!(
            "Pattern matches {} locations in {path}:\n{}\
             Add more context lines to disambiguate.",
            m.match_count(),
            framed_previews(file_lines, &m.positions, old_v.len()),
        )));
    }

    Ok(m.start)
}

// ── Fallback pattern variants ─────────────────────────────────────────────────

/// The pattern/new pairs tried in order. The literal pair always comes
/// first; each variant is a weaker restatement of the same change.
fn pattern_variants(old: &[String], new: &[String]) -> Vec<(Vec<String>, Vec<String>)> {
    let mut variants: Vec<(Vec<String>, Vec<String>)> = vec![(old.to_vec(), new.to_vec())];

    // Without a trailing empty line (the final-newline sentinel models add).
    if old.last().is_some_and(|l| l.is_empty()) {
        let old_t: Vec<String> = old[..old.len() - 1].to_vec();
        let new_t: Vec<String> = if new.last().is_some_and(|l| l.is_empty()) {
            new[..new.len() - 1].to_vec()
        } else {
            new.to_vec()
        };
        push_unique(&mut variants, (old_t, new_t));
    }

    // Trim the shared prefix/suffix of old and new.
    if let Some(v) = trim_shared_affixes(old, new) {
        push_unique(&mut variants, v);
    }

    // Collapse consecutive duplicated shared lines.
    if let Some(v) = collapse_consecutive_duplicates(old, new) {
        push_unique(&mut variants, v);
    }

    // Collapse a repeated block of shared lines.
    if let Some(v) = collapse_repeated_block(old, new) {
        push_unique(&mut variants, v);
    }

    // Reduce to a single-line change when exactly one pair differs.
    if let Some(v) = single_line_reduction(old, new) {
        push_unique(&mut variants, v);
    }

    variants
}

fn push_unique(
    variants: &mut Vec<(Vec<String>, Vec<String>)>,
    candidate: (Vec<String>, Vec<String>),
) {
    if !variants.contains(&candidate) {
        variants.push(candidate);
    }
}

fn trim_shared_affixes(old: &[String], new: &[String]) -> Option<(Vec<String>, Vec<String>)> {
    let mut prefix = 0;
    while prefix < old.len() && prefix < new.len() && old[prefix] == new[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < old.len() - prefix
        && suffix < new.len() - prefix
        && old[old.len() - 1 - suffix] == new[new.len() - 1 - suffix]
    {
        suffix += 1;
    }
    if prefix == 0 && suffix == 0 {
        return None;
    }
    let old_core = old[prefix..old.len() - suffix].to_vec();
    let new_core = new[prefix..new.len() - suffix].to_vec();
    if old_core.is_empty() {
        return None;
    }
    Some((old_core, new_core))
}

fn dedup_consecutive(lines: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for l in lines {
        if out.last() != Some(l) {
            out.push(l.clone());
        }
    }
    out
}

fn collapse_consecutive_duplicates(
    old: &[String],
    new: &[String],
) -> Option<(Vec<String>, Vec<String>)> {
    let old_d = dedup_consecutive(old);
    let new_d = dedup_consecutive(new);
    if old_d.len() == old.len() && new_d.len() == new.len() {
        return None;
    }
    Some((old_d, new_d))
}

/// If the lines are the same block repeated whole, keep one copy.
fn collapse_block(lines: &[String]) -> Option<Vec<String>> {
    let n = lines.len();
    for period in 1..=n / 2 {
        if n % period != 0 {
            continue;
        }
        if (period..n).all(|i| lines[i] == lines[i % period]) {
            return Some(lines[..period].to_vec());
        }
    }
    None
}

fn collapse_repeated_block(old: &[String], new: &[String]) -> Option<(Vec<String>, Vec<String>)> {
    let old_c = collapse_block(old)?;
    let new_c = collapse_block(new).unwrap_or_else(|| new.to_vec());
    Some((old_c, new_c))
}

fn single_line_reduction(old: &[String], new: &[String]) -> Option<(Vec<String>, Vec<String>)> {
    if old.len() != new.len() || old.len() < 2 {
        return None;
    }
    let mut diff_at = None;
    for (i, (o, n)) in old.iter().zip(new.iter()).enumerate() {
        if o != n {
            if diff_at.is_some() {
                return None;
            }
            diff_at = Some(i);
        }
    }
    let i = diff_at?;
    Some((vec![old[i].clone()], vec![new[i].clone()]))
}

// ── First-changed-line computation ────────────────────────────────────────────

fn first_changed(file_lines: &[String], replacements: &[Replacement]) -> Option<usize> {
    let mut first: Option<usize> = None;
    for r in replacements {
        let old = &file_lines[r.start_index..(r.start_index + r.old_len).min(file_lines.len())];
        let mut i = 0;
        while i < old.len() && i < r.new_lines.len() && old[i] == r.new_lines[i] {
            i += 1;
        }
        if i == old.len() && i == r.new_lines.len() {
            continue; // replacement is a no-op
        }
        let line = r.start_index + i + 1;
        if first.is_none_or(|f| line < f) {
            first = Some(line);
        }
    }
    first
}
