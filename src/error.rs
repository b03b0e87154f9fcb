//! The failure taxonomy of the edit engine.
//!
//! Every variant renders to an actionable message: it names the file, quotes
//! the offending input or nearby content, and tells the model what to change.
//! No mutation happens for any of these — a failed edit leaves the file
//! byte-identical to its pre-state.

use std::fmt;

use thiserror::Error;

use crate::hashline::hash::compute_line_hash;

#[derive(Debug, Error)]
pub enum EditError {
    #[error("{path}: file not found (or is a directory)")]
    FileNotFound { path: String },

    /// Pattern could not be placed. Carries the closest-candidate diagnostic
    /// (similarity percent, line number) when one exists.
    #[error("{0}")]
    MatchNotFound(String),

    /// Multiple placements. Carries framed previews and the guidance to add
    /// more context.
    #[error("{0}")]
    AmbiguousMatch(String),

    #[error("{0}")]
    HashlineMismatch(#[from] HashlineMismatchError),

    #[error("invalid patch on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The edit produced identical content. Fatal — no silent no-op.
    #[error("{0}")]
    IdenticalResult(String),

    #[error("{path}: .ipynb files are not supported — edit the notebook through its own tooling")]
    NotebookUnsupported { path: String },

    /// The external plan-mode guard refused the write; reported verbatim.
    #[error("{0}")]
    PlanModeBlocked(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl EditError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        EditError::Io { context: context.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, EditError>;

// ── Hashline mismatches ───────────────────────────────────────────────────────

/// One stale reference: the line the caller named, the hash they sent, and
/// the hash the line actually has now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashMismatch {
    pub line: usize,
    pub expected: String,
    pub actual: String,
}

/// All stale references of a hashline call, reported together so the model
/// can fix every one in a single follow-up. Rendered as a grep-style
/// context listing with `>>>` on the stale lines, then a quick-fix remap.
#[derive(Debug)]
pub struct HashlineMismatchError {
    pub path: String,
    pub mismatches: Vec<HashMismatch>,
    listing: String,
}

/// Context lines shown around each stale line.
const MISMATCH_CONTEXT: usize = 2;

impl HashlineMismatchError {
    pub fn new(path: &str, mut mismatches: Vec<HashMismatch>, file_lines: &[String]) -> Self {
        mismatches.sort_by_key(|m| m.line);
        mismatches.dedup();
        let listing = render_listing(&mismatches, file_lines);
        Self { path: path.to_string(), mismatches, listing }
    }
}

impl std::error::Error for HashlineMismatchError {}

impl fmt::Display for HashlineMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} stale line reference{} in {} — the file has changed since it was read. \
             Current content (stale lines marked >>>):",
            self.mismatches.len(),
            if self.mismatches.len() == 1 { "" } else { "s" },
            self.path,
        )?;
        write!(f, "{}", self.listing)
    }
}

fn render_listing(mismatches: &[HashMismatch], file_lines: &[String]) -> String {
    let stale: Vec<usize> = mismatches.iter().map(|m| m.line).collect();
    let mut out = String::new();
    let mut last_shown: Option<usize> = None;

    for m in mismatches {
        let lo = m.line.saturating_sub(MISMATCH_CONTEXT + 1);
        let hi = (m.line + MISMATCH_CONTEXT).min(file_lines.len());
        let lo = match last_shown {
            Some(shown) if shown >= lo => shown,
            Some(_) => {
                out.push_str("...\n");
                lo
            }
            None => lo,
        };
        for idx in lo..hi {
            let line_no = idx + 1;
            let marker = if stale.contains(&line_no) { ">>>" } else { "   " };
            let hash = compute_line_hash(&file_lines[idx]);
            out.push_str(&format!("{marker} {line_no}:{hash}| {}\n", file_lines[idx]));
        }
        last_shown = Some(hi);
    }

    out.push_str("Quick fix — remap your references:\n");
    for m in mismatches {
        out.push_str(&format!("  {}:{} → {}:{}\n", m.line, m.expected, m.line, m.actual));
    }
    out
}
