//! Indentation reconciliation for placed hunks.
//!
//! When a pattern matched the file at a different indentation than written,
//! the replacement lines need the file's real indentation, not the model's.
//! Context-like lines are copied verbatim from the file; genuinely new lines
//! get a tab-ratio conversion or a uniform delta when one can be inferred.

use crate::normalize::{count_leading_whitespace, get_leading_whitespace};

/// True when both slices have the same trimmed content line by line.
fn same_trimmed(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.trim() == y.trim())
}

/// If the pattern indents with tabs only and the actual lines indent with
/// spaces only at one consistent integer ratio, return that ratio.
fn tab_to_space_ratio(pattern: &[String], actual: &[String]) -> Option<usize> {
    let mut ratio: Option<usize> = None;
    let mut saw_tabs = false;
    for (p, a) in pattern.iter().zip(actual.iter()) {
        if p.trim().is_empty() || a.trim().is_empty() {
            continue;
        }
        let p_ws = get_leading_whitespace(p);
        let a_ws = get_leading_whitespace(a);
        if p_ws.is_empty() && a_ws.is_empty() {
            continue;
        }
        if !p_ws.chars().all(|c| c == '\t') || !a_ws.chars().all(|c| c == ' ') {
            return None;
        }
        if p_ws.is_empty() {
            if !a_ws.is_empty() {
                return None;
            }
            continue;
        }
        saw_tabs = true;
        let tabs = p_ws.len();
        let spaces = a_ws.chars().count();
        if spaces % tabs != 0 {
            return None;
        }
        let k = spaces / tabs;
        match ratio {
            None => ratio = Some(k),
            Some(r) if r != k => return None,
            Some(_) => {}
        }
    }
    if saw_tabs { ratio.filter(|&k| k > 0) } else { None }
}

/// Uniform signed indent delta (actual − pattern) across non-blank line
/// pairs, if every pair agrees.
fn uniform_delta(pattern: &[String], actual: &[String]) -> Option<isize> {
    let mut delta: Option<isize> = None;
    for (p, a) in pattern.iter().zip(actual.iter()) {
        if p.trim().is_empty() || a.trim().is_empty() {
            continue;
        }
        let d = count_leading_whitespace(a) as isize - count_leading_whitespace(p) as isize;
        match delta {
            None => delta = Some(d),
            Some(existing) if existing != d => return None,
            Some(_) => {}
        }
    }
    delta
}

/// Rewrite lines in `new_lines` whose trimmed content also appears in
/// `actual` to the exact actual line, consuming each actual line at most
/// once so duplicated context resolves in order. Returns the rewritten
/// lines and a flag per line.
fn rewrite_context_like(new_lines: &[String], actual: &[String]) -> (Vec<String>, Vec<bool>) {
    let mut used = vec![false; actual.len()];
    let mut out = Vec::with_capacity(new_lines.len());
    let mut rewritten = Vec::with_capacity(new_lines.len());
    for line in new_lines {
        let trimmed = line.trim();
        let hit = (!trimmed.is_empty())
            .then(|| {
                actual
                    .iter()
                    .enumerate()
                    .find(|(i, a)| !used[*i] && a.trim() == trimmed)
                    .map(|(i, a)| (i, a.clone()))
            })
            .flatten();
        match hit {
            Some((i, a)) => {
                used[i] = true;
                rewritten.push(true);
                out.push(a);
            }
            None => {
                rewritten.push(false);
                out.push(line.clone());
            }
        }
    }
    (out, rewritten)
}

fn shift_line(line: &str, delta: isize, fill: char) -> String {
    if line.trim().is_empty() {
        return line.to_string();
    }
    if delta >= 0 {
        let mut out = fill.to_string().repeat(delta as usize);
        out.push_str(line);
        out
    } else {
        let strip = (-delta) as usize;
        let lead = count_leading_whitespace(line);
        let drop = strip.min(lead);
        let idx = line
            .char_indices()
            .nth(drop)
            .map(|(i, _)| i)
            .unwrap_or(line.len());
        line[idx..].to_string()
    }
}

fn convert_tabs(line: &str, ratio: usize) -> String {
    let tabs = line.chars().take_while(|c| *c == '\t').count();
    if tabs == 0 {
        return line.to_string();
    }
    let mut out = " ".repeat(tabs * ratio);
    out.push_str(&line[tabs..]);
    out
}

/// Adjust `new_lines` for the indentation actually found at the match site.
///
/// `pattern` is what the hunk said the file looked like; `actual` is the
/// matched region as it really is. Both early-outs return `new_lines`
/// untouched: an exact match needs no adjustment, and a pure indent rewrite
/// (pattern and replacement agree on trimmed content) is the model
/// deliberately re-indenting.
pub fn reconcile_indentation(
    pattern: &[String],
    actual: &[String],
    new_lines: &[String],
) -> Vec<String> {
    if pattern == actual {
        return new_lines.to_vec();
    }
    if same_trimmed(pattern, new_lines) {
        return new_lines.to_vec();
    }

    let (mut adjusted, rewritten) = rewrite_context_like(new_lines, actual);

    if let Some(ratio) = tab_to_space_ratio(pattern, actual) {
        tracing::debug!(ratio, "converting tab indentation to spaces");
        for (line, done) in adjusted.iter_mut().zip(rewritten.iter()) {
            if !done {
                *line = convert_tabs(line, ratio);
            }
        }
        return adjusted;
    }

    if let Some(delta) = uniform_delta(pattern, actual) {
        if delta != 0 {
            let base = pattern
                .iter()
                .filter(|l| !l.trim().is_empty())
                .map(|l| count_leading_whitespace(l))
                .min()
                .unwrap_or(0);
            let fill = actual
                .iter()
                .find(|l| !l.trim().is_empty())
                .map(|l| get_leading_whitespace(l))
                .and_then(|ws| ws.chars().next())
                .unwrap_or(' ');
            for (line, done) in adjusted.iter_mut().zip(rewritten.iter()) {
                if !done && !line.trim().is_empty() && count_leading_whitespace(line) == base {
                    *line = shift_line(line, delta, fill);
                }
            }
        }
    }

    adjusted
}
