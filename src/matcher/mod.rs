//! The matching core shared by all three edit modes.
//!
//! Three search shapes, all built on the same normalization and similarity
//! primitives:
//!   - character-window search over whole multi-line targets (replace mode)
//!   - line-sequence search with progressive strictness passes (patch mode)
//!   - single context-line search for `@@` anchors

pub mod char_search;
pub mod context;
pub mod seek;
pub mod similarity;

pub use char_search::{find_match, CharSearchOutcome, WindowMatch};
pub use context::{find_context_line, resolve_change_context, ContextMatch};
pub use seek::{seek_sequence, SeekMatch, SeekPass};
