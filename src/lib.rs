//! emend — the edit engine of a coding agent.
//!
//! Models emit edits with whitespace drift, stale line numbers, copied-in
//! decoration and ambiguous anchors. This crate accepts those noisy inputs
//! and produces a precise file mutation, or fails with a diagnostic the
//! model can act on. Three edit modes share one matching and normalization
//! core:
//!
//! - **replace** — literal `old_text` → `new_text`, uniqueness-enforced
//! - **patch** — diff-shaped hunks with optional `@@` anchors
//! - **hashline** — line-addressed edits keyed by `LINE:HASH` references
//!
//! Entry point: build an [`EditEngine`] over a [`fs::FileSystem`] and an
//! [`EditConfig`], then [`EditEngine::apply`] an [`EditRequest`].

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod fs;
pub mod hashline;
pub mod hunk;
pub mod indent;
pub mod matcher;
pub mod normalize;
pub mod patch;
pub mod preview;
pub mod replace;

pub use config::{ConfigFile, EditConfig, EditMode};
pub use engine::{
    AbortFlag, DiagnosticsResult, EditDetails, EditEngine, EditOutcome, EditRequest,
    HashlineArgs, PatchArgs, PatchOp, PlanModeGuard, ReplaceArgs, Writethrough,
};
pub use error::{EditError, HashMismatch, HashlineMismatchError};
