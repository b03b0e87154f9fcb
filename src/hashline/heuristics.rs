//! Echo-stripping and merge heuristics for hashline replacement content.
//!
//! Models copy decoration from what they were shown and re-send lines that
//! already exist around the edit site. Each heuristic here removes one
//! specific copying mistake; each is gated so a deliberate edit survives.

use std::collections::HashSet;

/// Whitespace-stripped canonical form used for echo comparison.
pub fn canonical(line: &str) -> String {
    line.chars().filter(|c| !c.is_whitespace()).collect()
}

// ── Copied decoration ─────────────────────────────────────────────────────────

/// Match the `LINE:HASH| ` display prefix, returning the content after it.
fn strip_display_prefix(line: &str) -> Option<&str> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == 0 || bytes.get(i) != Some(&b':') {
        return None;
    }
    i += 1;
    let hash_end = i + 3;
    if bytes.len() < hash_end
        || !bytes[i..hash_end]
            .iter()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
    {
        return None;
    }
    i = hash_end;
    if bytes.get(i) != Some(&b'|') {
        return None;
    }
    i += 1;
    if bytes.get(i) == Some(&b' ') {
        i += 1;
    }
    Some(&line[i..])
}

/// Strip per-line decoration the model copied in. When at least half of the
/// non-empty lines carry the `LINE:HASH| ` display prefix, strip it; failing
/// that, when at least half start with a single `+`, strip that.
pub fn strip_copied_decoration(lines: &[String]) -> Vec<String> {
    let non_empty = lines.iter().filter(|l| !l.is_empty()).count();
    if non_empty == 0 {
        return lines.to_vec();
    }

    let prefixed = lines
        .iter()
        .filter(|l| !l.is_empty() && strip_display_prefix(l).is_some())
        .count();
    if prefixed * 2 >= non_empty {
        return lines
            .iter()
            .map(|l| strip_display_prefix(l).map(str::to_string).unwrap_or_else(|| l.clone()))
            .collect();
    }

    let plussed = lines
        .iter()
        .filter(|l| l.starts_with('+') && !l.starts_with("++"))
        .count();
    if plussed * 2 >= non_empty {
        return lines
            .iter()
            .map(|l| {
                if l.starts_with('+') && !l.starts_with("++") {
                    l[1..].to_string()
                } else {
                    l.clone()
                }
            })
            .collect();
    }

    lines.to_vec()
}

// ── Merge expansion ───────────────────────────────────────────────────────────

/// Detect a two-line merge: the replacement for `line` (1-indexed) absorbs
/// an untouched neighbor. Returns `(start_line, delete_count)` — the
/// 1-indexed first line to delete and how many source lines the replacement
/// now covers.
///
/// Only fires for single-line replacement content, and never absorbs a line
/// another edit in the same call explicitly targets.
pub fn maybe_expand_merge(
    line: usize,
    dst_lines: &[String],
    file_lines: &[String],
    touched: &HashSet<usize>,
) -> Option<(usize, usize)> {
    if dst_lines.len() != 1 {
        return None;
    }
    let new_canon = canonical(&dst_lines[0]);
    let edited_canon = canonical(&file_lines[line - 1]);
    if new_canon.is_empty() || edited_canon.is_empty() {
        return None;
    }

    // Previous neighbor absorbed: new == prev + edited
    if line >= 2 && !touched.contains(&(line - 1)) {
        let prev_canon = canonical(&file_lines[line - 2]);
        if !prev_canon.is_empty()
            && new_canon.len() == prev_canon.len() + edited_canon.len()
            && new_canon.starts_with(&prev_canon)
            && new_canon.ends_with(&edited_canon)
        {
            return Some((line - 1, 2));
        }
    }

    // Following neighbor absorbed: new == edited + next
    if line < file_lines.len() && !touched.contains(&(line + 1)) {
        let next_canon = canonical(&file_lines[line]);
        if !next_canon.is_empty()
            && new_canon.len() == edited_canon.len() + next_canon.len()
            && new_canon.starts_with(&edited_canon)
            && new_canon.ends_with(&next_canon)
        {
            return Some((line, 2));
        }
    }

    None
}

// ── Boundary echoes ───────────────────────────────────────────────────────────

/// Drop replacement lines that merely repeat the lines bordering the target
/// range. Fires only when the replacement grew relative to the range — an
/// N-to-N rewrite that happens to open with the boundary line is kept.
pub fn strip_range_boundary_echo(
    file_lines: &[String],
    start: usize,
    end: usize,
    dst_lines: &[String],
) -> Vec<String> {
    let range_len = end - start + 1;
    if dst_lines.len() <= range_len {
        return dst_lines.to_vec();
    }
    let mut out = dst_lines.to_vec();

    if start >= 2 {
        let before = canonical(&file_lines[start - 2]);
        if !before.is_empty() && out.first().map(|l| canonical(l)) == Some(before) {
            out.remove(0);
        }
    }
    if out.len() > range_len && end < file_lines.len() {
        let after = canonical(&file_lines[end]);
        if !after.is_empty() && out.last().map(|l| canonical(l)) == Some(after) {
            out.pop();
        }
    }
    out
}

/// Drop a leading inserted line that repeats the insertion anchor.
pub fn strip_insert_anchor_echo(anchor_line: &str, dst_lines: &[String]) -> Vec<String> {
    let anchor = canonical(anchor_line);
    match dst_lines.first() {
        Some(first) if !anchor.is_empty() && canonical(first) == anchor => {
            dst_lines[1..].to_vec()
        }
        _ => dst_lines.to_vec(),
    }
}

// ── Whitespace preservation ───────────────────────────────────────────────────

/// For N-to-N replacements, keep the original line wherever the replacement
/// differs only in whitespace. Models reflow indentation they never meant
/// to change.
pub fn preserve_whitespace_only_lines(orig: &[String], dst_lines: &[String]) -> Vec<String> {
    if orig.len() != dst_lines.len() {
        return dst_lines.to_vec();
    }
    orig.iter()
        .zip(dst_lines.iter())
        .map(|(o, d)| {
            if o != d && canonical(o) == canonical(d) {
                o.clone()
            } else {
                d.clone()
            }
        })
        .collect()
}
