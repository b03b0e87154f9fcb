//! Replace mode: find a literal `old_text`, substitute `new_text`.
//!
//! Exact-then-fuzzy, uniqueness-enforced. Two or more exact occurrences are
//! an error unless the caller asked for all of them; the fuzzy fallback
//! accepts only a single high-confidence window.

use crate::config::EditConfig;
use crate::error::EditError;
use crate::indent::reconcile_indentation;
use crate::matcher::char_search::{find_match, CharSearchOutcome};
use crate::preview::{framed_previews, range_preview};

#[derive(Debug)]
pub struct ReplaceResult {
    pub content: String,
    /// How many occurrences were substituted.
    pub replacements: usize,
    /// 1-indexed first line that differs from the pre-state.
    pub first_changed_line: Option<usize>,
}

fn line_of_byte(content: &str, byte: usize) -> usize {
    content[..byte].bytes().filter(|b| *b == b'\n').count() + 1
}

/// The pattern was placed but substitution changes nothing. Fatal, and the
/// message shows what the targeted lines actually read.
fn identical_target_error(path: &str, content: &str, line: usize, old_text: &str) -> EditError {
    let file_lines: Vec<String> = content.split('\n').map(|s| s.to_string()).collect();
    let span = old_text.split('\n').count();
    EditError::IdenticalResult(format!(
        "replacement produces identical content for {path} — the targeted lines already read:\n{}",
        range_preview(&file_lines, line, line + span - 1),
    ))
}

/// Apply a replace-mode edit to LF-normalized content.
pub fn apply_replace(
    path: &str,
    content: &str,
    old_text: &str,
    new_text: &str,
    all: bool,
    config: &EditConfig,
) -> Result<ReplaceResult, EditError> {
    if old_text.is_empty() {
        return Err(EditError::MatchNotFound(format!(
            "old_text is empty — provide the exact text to replace in {path}"
        )));
    }

    let starts: Vec<usize> = content.match_indices(old_text).map(|(i, _)| i).collect();

    match starts.len() {
        0 => fuzzy_replace(path, content, old_text, new_text, config),
        1 => {
            let line = line_of_byte(content, starts[0]);
            let new_content = content.replacen(old_text, new_text, 1);
            if new_content == content {
                return Err(identical_target_error(path, content, line, old_text));
            }
            Ok(ReplaceResult {
                content: new_content,
                replacements: 1,
                first_changed_line: Some(line),
            })
        }
        n if all => {
            let line = line_of_byte(content, starts[0]);
            let new_content = content.replace(old_text, new_text);
            if new_content == content {
                return Err(identical_target_error(path, content, line, old_text));
            }
            Ok(ReplaceResult {
                content: new_content,
                replacements: n,
                first_changed_line: Some(line),
            })
        }
        n => {
            let file_lines: Vec<String> = content.split('\n').map(|s| s.to_string()).collect();
            let occurrence_lines: Vec<usize> =
                starts.iter().map(|&b| line_of_byte(content, b) - 1).collect();
            let span = old_text.split('\n').count();
            Err(EditError::AmbiguousMatch(format!(
                "old_text matches {n} locations in {path}:\n{}\
                 It must match exactly once — add more surrounding context to make it unique, \
                 or pass all=true to replace every occurrence.",
                framed_previews(&file_lines, &occurrence_lines, span),
            )))
        }
    }
}

fn fuzzy_replace(
    path: &str,
    content: &str,
    old_text: &str,
    new_text: &str,
    config: &EditConfig,
) -> Result<ReplaceResult, EditError> {
    if !config.fuzzy_enabled {
        return Err(EditError::MatchNotFound(format!(
            "old_text not found in {path}. Check whitespace and exact characters."
        )));
    }

    match find_match(content, old_text, config.fuzzy_threshold) {
        CharSearchOutcome::Accepted(m) => {
            let file_lines: Vec<String> = content.split('\n').map(|s| s.to_string()).collect();
            let pattern: Vec<String> = old_text.split('\n').map(|s| s.to_string()).collect();
            let new_lines: Vec<String> = new_text.split('\n').map(|s| s.to_string()).collect();
            let actual = &file_lines[m.start_line..m.start_line + m.line_count];
            let adjusted = reconcile_indentation(&pattern, actual, &new_lines);
            if adjusted[..] == *actual {
                return Err(identical_target_error(
                    path,
                    content,
                    m.start_line + 1,
                    old_text,
                ));
            }

            let mut out_lines = file_lines.clone();
            out_lines.splice(m.start_line..m.start_line + m.line_count, adjusted.clone());

            let mut i = 0;
            while i < m.line_count && i < adjusted.len() && file_lines[m.start_line + i] == adjusted[i]
            {
                i += 1;
            }
            tracing::debug!(
                start = m.start_line,
                confidence = m.confidence,
                "fuzzy replace accepted"
            );
            Ok(ReplaceResult {
                content: out_lines.join("\n"),
                replacements: 1,
                first_changed_line: Some(m.start_line + i + 1),
            })
        }
        CharSearchOutcome::Closest { passing, .. } if passing > 1 => {
            Err(EditError::AmbiguousMatch(format!(
                "old_text has {passing} high-confidence fuzzy matches in {path} — \
                 add more surrounding context to make it unique."
            )))
        }
        CharSearchOutcome::Closest { best, .. } => Err(EditError::MatchNotFound(format!(
            "old_text not found in {path}. Closest candidate is {:.0}% similar at line {} — \
             re-read that region and retry with the exact text.",
            best.confidence * 100.0,
            best.start_line + 1,
        ))),
        CharSearchOutcome::None => Err(EditError::MatchNotFound(format!(
            "old_text not found in {path} (pattern is longer than the file)."
        ))),
    }
}
