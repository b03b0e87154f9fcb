//! Unified-diff rendering for edit results.
//!
//! Display only — nothing here feeds back into matching. The diff string
//! lands in the result so the caller can show the model (or a human) what
//! actually changed.

use similar::TextDiff;

/// Context lines around each change in the rendered diff.
const DIFF_CONTEXT: usize = 3;

/// Render a unified diff between the pre- and post-edit content.
pub fn unified_diff(path: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(DIFF_CONTEXT)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}
