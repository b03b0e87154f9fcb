//! Framed, line-numbered previews for ambiguity and not-found diagnostics.
//!
//! The previews are what the model sees when an edit is refused, so they
//! carry real line numbers and enough surrounding context to write a better
//! anchor on the next attempt.

use unicode_width::UnicodeWidthChar;

/// Lines of context shown above and below each occurrence.
const PREVIEW_CONTEXT: usize = 5;
/// Maximum number of occurrences previewed.
const MAX_PREVIEWS: usize = 5;
/// Display width each preview line is truncated to.
const MAX_LINE_WIDTH: usize = 80;

/// Format one numbered line the way the engine always renders file content.
pub fn format_line(line_no: usize, line: &str) -> String {
    format!("{line_no:4} | {}\n", truncate_width(line, MAX_LINE_WIDTH))
}

/// Truncate to a display width, appending an ellipsis when cut.
pub fn truncate_width(line: &str, max: usize) -> String {
    let mut width = 0;
    for (i, c) in line.char_indices() {
        width += c.width().unwrap_or(0);
        if width > max {
            let mut out = line[..i].to_string();
            out.push('…');
            return out;
        }
    }
    line.to_string()
}

/// Build a framed preview around each occurrence. `occurrences` are
/// 0-indexed starting lines; `span` is how many lines each occurrence
/// covers. Capped at [`MAX_PREVIEWS`] frames.
pub fn framed_previews(file_lines: &[String], occurrences: &[usize], span: usize) -> String {
    let mut out = String::new();
    let shown = occurrences.len().min(MAX_PREVIEWS);
    for (i, &start) in occurrences.iter().take(MAX_PREVIEWS).enumerate() {
        let lo = start.saturating_sub(PREVIEW_CONTEXT);
        let hi = (start + span.max(1) + PREVIEW_CONTEXT).min(file_lines.len());
        out.push_str(&format!("── match {} of {} ──\n", i + 1, occurrences.len()));
        for idx in lo..hi {
            out.push_str(&format_line(idx + 1, &file_lines[idx]));
        }
        if i + 1 < shown {
            out.push('\n');
        }
    }
    if occurrences.len() > MAX_PREVIEWS {
        out.push_str(&format!(
            "... and {} more match(es) not shown\n",
            occurrences.len() - MAX_PREVIEWS
        ));
    }
    out
}

/// Preview of a specific line range, used by identical-result errors so the
/// model can see what is actually there.
pub fn range_preview(file_lines: &[String], start: usize, end: usize) -> String {
    let lo = start.saturating_sub(PREVIEW_CONTEXT + 1);
    let hi = (end + PREVIEW_CONTEXT).min(file_lines.len());
    let mut out = String::new();
    for idx in lo..hi {
        out.push_str(&format_line(idx + 1, &file_lines[idx]));
    }
    out
}
