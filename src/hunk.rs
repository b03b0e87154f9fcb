//! Parser for the patch-mode grammar.
//!
//! The grammar is diff-shaped but deliberately forgiving: models emit `@@`
//! anchors with or without unified-diff numbers, drop the leading space on
//! context lines, collapse whitespace in the header, and repeat the anchor
//! as the first context line. The parser accepts all of that; only a truly
//! unknown body prefix is an error.

use crate::error::EditError;

/// An ordered unit of change: the lines to locate and their replacement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffHunk {
    /// Context + removal lines, in file order.
    pub old_lines: Vec<String>,
    /// Context + addition lines, in file order.
    pub new_lines: Vec<String>,
    /// 1-indexed line hint from a unified header, if present.
    pub old_start_line: Option<usize>,
    /// 1-indexed hint for the new file, if present.
    pub new_start_line: Option<usize>,
    /// Anchor string from `@@ <anchor>`, possibly a newline-separated chain.
    pub change_context: Option<String>,
    /// Whether the hunk contains at least one unchanged context line.
    pub has_context_lines: bool,
    /// The hunk must match at the end of the file.
    pub is_end_of_file: bool,
}

impl DiffHunk {
    fn is_empty(&self) -> bool {
        self.old_lines.is_empty() && self.new_lines.is_empty() && self.change_context.is_none()
    }

    /// Merge a second `@@` anchor into this hunk's context chain (a hunk can
    /// carry stacked anchors: outer scope first).
    fn push_context(&mut self, anchor: &str) {
        match &mut self.change_context {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(anchor);
            }
            None => self.change_context = Some(anchor.to_string()),
        }
    }
}

/// End-of-file markers models emit. Matched after trimming.
fn is_eof_marker(line: &str) -> bool {
    let t = line.trim();
    t.eq_ignore_ascii_case("*** end of file")
        || t.eq_ignore_ascii_case("*** end of file ***")
        || t.eq_ignore_ascii_case("// end of file")
}

/// Parse `@@ -N,n +M,m @@ trailing` unified headers. Returns
/// `(old_start, new_start, trailing_anchor)`.
fn parse_unified_header(body: &str) -> Option<(usize, Option<usize>, Option<String>)> {
    let rest = body.strip_prefix('-')?;
    let mut parts = rest.splitn(2, ' ');
    let old_spec = parts.next()?;
    let old_start: usize = old_spec.split(',').next()?.parse().ok()?;
    let remainder = parts.next().unwrap_or("");
    let mut new_start = None;
    let mut trailing = None;
    if let Some(plus) = remainder.trim_start().strip_prefix('+') {
        let mut p = plus.splitn(2, |c: char| c == ' ' || c == '@');
        new_start = p.next().and_then(|s| s.split(',').next()).and_then(|s| s.parse().ok());
    }
    if let Some(at) = remainder.find("@@") {
        let t = remainder[at + 2..].trim();
        if !t.is_empty() {
            trailing = Some(t.to_string());
        }
    }
    Some((old_start, new_start, trailing))
}

/// Parse a line-hint header: `line N`, `line: N`, `line:N`.
fn parse_line_hint(body: &str) -> Option<usize> {
    let rest = body.strip_prefix("line")?;
    let rest = rest.trim_start().strip_prefix(':').unwrap_or(rest).trim();
    rest.parse().ok()
}

/// Parse a patch-mode diff into ordered hunks.
pub fn parse_hunks(diff: &str) -> Result<Vec<DiffHunk>, EditError> {
    let mut hunks: Vec<DiffHunk> = Vec::new();
    let mut current: Option<DiffHunk> = None;
    let mut saw_body = false;

    for (idx, raw) in diff.lines().enumerate() {
        let line_no = idx + 1;

        // Unified file headers are decoration; models include them even when
        // told not to.
        if raw.starts_with("--- ") || raw.starts_with("+++ ") || raw == "---" || raw == "+++" {
            continue;
        }

        if is_eof_marker(raw) {
            if let Some(h) = &mut current {
                h.is_end_of_file = true;
            }
            continue;
        }

        if let Some(body) = raw.strip_prefix("@@") {
            let body = body.trim();
            // A bare `@@` opens a new hunk with no anchor
            if body.is_empty() {
                if let Some(h) = current.take() {
                    if !h.is_empty() {
                        hunks.push(h);
                    }
                }
                current = Some(DiffHunk::default());
                continue;
            }
            if let Some((old_start, new_start, trailing)) = parse_unified_header(body) {
                if let Some(h) = current.take() {
                    if !h.is_empty() {
                        hunks.push(h);
                    }
                }
                let mut h = DiffHunk {
                    old_start_line: Some(old_start),
                    new_start_line: new_start,
                    ..Default::default()
                };
                if let Some(anchor) = trailing {
                    h.push_context(&anchor);
                }
                current = Some(h);
                continue;
            }
            if let Some(hint) = parse_line_hint(body) {
                // `@@ line N` attaches to the current hunk instead of
                // opening a new one
                match &mut current {
                    Some(h) if h.old_lines.is_empty() && h.new_lines.is_empty() => {
                        h.old_start_line = Some(hint);
                        continue;
                    }
                    _ => {}
                }
            }
            // `@@ <anchor>`: a new hunk, unless the current hunk has an
            // anchor and no body yet — then it stacks into a scope chain.
            let anchor = body.trim_end_matches("@@").trim();
            match &mut current {
                Some(h)
                    if h.change_context.is_some()
                        && h.old_lines.is_empty()
                        && h.new_lines.is_empty() =>
                {
                    h.push_context(anchor);
                }
                _ => {
                    if let Some(h) = current.take() {
                        if !h.is_empty() {
                            hunks.push(h);
                        }
                    }
                    let mut h = DiffHunk::default();
                    h.push_context(anchor);
                    current = Some(h);
                }
            }
            continue;
        }

        // Body lines. A diff with no @@ at all is a single bare hunk.
        let h = current.get_or_insert_with(DiffHunk::default);
        saw_body = true;
        if let Some(rest) = raw.strip_prefix('+') {
            h.new_lines.push(rest.to_string());
        } else if let Some(rest) = raw.strip_prefix('-') {
            h.old_lines.push(rest.to_string());
        } else if let Some(rest) = raw.strip_prefix(' ') {
            h.old_lines.push(rest.to_string());
            h.new_lines.push(rest.to_string());
            h.has_context_lines = true;
        } else if raw.is_empty() {
            // Models drop the leading space on blank context lines
            h.old_lines.push(String::new());
            h.new_lines.push(String::new());
            h.has_context_lines = true;
        } else if raw.starts_with('\\') {
            // "\ No newline at end of file"
            continue;
        } else {
            return Err(EditError::Parse {
                line: line_no,
                message: format!(
                    "unknown line prefix {:?} — body lines must start with ' ', '+', '-' or '\\'",
                    raw.chars().next().unwrap_or(' '),
                ),
            });
        }
    }

    if let Some(h) = current.take() {
        if !h.is_empty() {
            hunks.push(h);
        }
    }

    // An anchor with no body lines places nothing; drop it rather than
    // letting it reach the applicator as an empty insertion.
    hunks.retain(|h| !(h.old_lines.is_empty() && h.new_lines.is_empty()));

    if hunks.is_empty() || !saw_body {
        return Err(EditError::Parse {
            line: 1,
            message: "empty diff — nothing to apply".to_string(),
        });
    }

    Ok(hunks)
}
