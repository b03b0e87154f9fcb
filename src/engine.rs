//! The edit façade: one dispatch site for the three edit modes.
//!
//! The engine validates the descriptor, reads the file through the FS
//! capability, normalizes, hands off to the mode's applicator, and persists
//! through the writethrough callback. Encoding conventions (BOM, line
//! ending) are captured at read and restored at write; the applicators only
//! ever see LF-only text.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::config::{EditConfig, EditMode};
use crate::diff::unified_diff;
use crate::error::EditError;
use crate::fs::FileSystem;
use crate::hashline::hash::format_hashlines;
use crate::hashline::parse::HashlineEdit;
use crate::hashline::apply_hashline_edits;
use crate::hunk::parse_hunks;
use crate::normalize::{
    detect_line_ending, normalize_to_lf, restore_line_endings, strip_bom,
};
use crate::patch::apply_patch;
use crate::replace::apply_replace;

/// Lines of post-edit context echoed back around the first change.
const ECHO_RADIUS: usize = 10;

// ── Cancellation ──────────────────────────────────────────────────────────────

/// Cooperative abort signal, polled at the I/O edges. If it fires before the
/// write begins, no bytes change; once the write starts it completes.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ── External collaborators ────────────────────────────────────────────────────

/// Advisory formatter/linter output returned by the writethrough; the
/// engine passes it through untouched.
pub type DiagnosticsResult = Value;

/// Commits bytes to storage and may format `content` in place before
/// reporting diagnostics. When a writethrough is installed the engine does
/// not also write through the FS capability.
///
/// `batch` is an opaque id the caller may set to let the writethrough batch
/// diagnostics across several edits; the engine passes it through untouched.
pub trait Writethrough {
    fn write(
        &self,
        path: &str,
        content: &mut String,
        abort: &AbortFlag,
        batch: Option<&str>,
    ) -> anyhow::Result<Option<DiagnosticsResult>>;
}

/// External write policy. A refusal message is reported verbatim as
/// [`EditError::PlanModeBlocked`].
pub trait PlanModeGuard {
    fn enforce_write(
        &self,
        path: &str,
        op: &str,
        rename: Option<&str>,
    ) -> Result<(), String>;
}

// ── Edit descriptors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceArgs {
    pub path: String,
    pub old_text: String,
    pub new_text: String,
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Create,
    Delete,
    #[default]
    Update,
}

impl PatchOp {
    fn as_str(self) -> &'static str {
        match self {
            PatchOp::Create => "create",
            PatchOp::Delete => "delete",
            PatchOp::Update => "update",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchArgs {
    pub path: String,
    #[serde(default)]
    pub op: PatchOp,
    #[serde(default)]
    pub rename: Option<String>,
    #[serde(default)]
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HashlineArgs {
    pub path: String,
    pub edits: Vec<HashlineEdit>,
}

/// One edit call. The variant is the mode; there is exactly one dispatch
/// site over it in [`EditEngine::apply`].
#[derive(Debug, Clone)]
pub enum EditRequest {
    Replace(ReplaceArgs),
    Patch(PatchArgs),
    Hashline(HashlineArgs),
}

impl EditRequest {
    pub fn path(&self) -> &str {
        match self {
            EditRequest::Replace(a) => &a.path,
            EditRequest::Patch(a) => &a.path,
            EditRequest::Hashline(a) => &a.path,
        }
    }

    /// Build a request from raw tool-call JSON. `Auto` infers the mode from
    /// the descriptor shape.
    pub fn from_value(mode: EditMode, args: &Value) -> Result<EditRequest, EditError> {
        let mode = match mode {
            EditMode::Auto => {
                if args.get("old_text").is_some() {
                    EditMode::Replace
                } else if args.get("edits").is_some() {
                    EditMode::Hashline
                } else {
                    EditMode::Patch
                }
            }
            m => m,
        };
        let parse_err = |e: serde_json::Error| EditError::Parse {
            line: 1,
            message: format!("invalid edit descriptor: {e}"),
        };
        Ok(match mode {
            EditMode::Replace => {
                EditRequest::Replace(ReplaceArgs::deserialize(args).map_err(parse_err)?)
            }
            EditMode::Patch => {
                EditRequest::Patch(PatchArgs::deserialize(args).map_err(parse_err)?)
            }
            EditMode::Hashline => {
                EditRequest::Hashline(HashlineArgs::deserialize(args).map_err(parse_err)?)
            }
            EditMode::Auto => unreachable!("auto resolved above"),
        })
    }
}

// ── Result ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct EditDetails {
    /// Unified diff of the applied change, for display.
    pub diff: String,
    /// 1-indexed first line that changed.
    pub first_changed_line: Option<usize>,
    /// Advisory output from the writethrough, if any.
    pub diagnostics: Option<DiagnosticsResult>,
    pub op: Option<String>,
    pub rename: Option<String>,
    pub warnings: Vec<String>,
    /// Post-edit window around the first change, rendered in the hashline
    /// display format so follow-up edits have fresh hashes.
    pub context_echo: Option<String>,
}

#[derive(Debug)]
pub struct EditOutcome {
    /// Human-readable summary lines ("Updated src/lib.rs").
    pub content: Vec<String>,
    pub details: EditDetails,
}

// ── Engine ────────────────────────────────────────────────────────────────────

pub struct EditEngine<'a> {
    fs: &'a dyn FileSystem,
    config: EditConfig,
    plan_guard: Option<&'a dyn PlanModeGuard>,
    writethrough: Option<&'a dyn Writethrough>,
    abort: AbortFlag,
    batch_id: Option<String>,
}

impl<'a> EditEngine<'a> {
    pub fn new(fs: &'a dyn FileSystem, config: EditConfig) -> Self {
        Self {
            fs,
            config,
            plan_guard: None,
            writethrough: None,
            abort: AbortFlag::new(),
            batch_id: None,
        }
    }

    /// Opaque batch id forwarded to the writethrough with every write.
    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn with_plan_guard(mut self, guard: &'a dyn PlanModeGuard) -> Self {
        self.plan_guard = Some(guard);
        self
    }

    pub fn with_writethrough(mut self, writethrough: &'a dyn Writethrough) -> Self {
        self.writethrough = Some(writethrough);
        self
    }

    pub fn with_abort(mut self, abort: AbortFlag) -> Self {
        self.abort = abort;
        self
    }

    /// The mode a call runs in: per-call override, else the session default.
    pub fn resolve_mode(&self, override_mode: Option<EditMode>) -> EditMode {
        override_mode.unwrap_or(self.config.default_mode)
    }

    /// Apply one edit. Either the whole edit lands or nothing does.
    pub fn apply(&self, request: &EditRequest) -> Result<EditOutcome, EditError> {
        let path = request.path();
        if path.ends_with(".ipynb") {
            return Err(EditError::NotebookUnsupported { path: path.to_string() });
        }

        let (op, rename) = match request {
            EditRequest::Patch(a) => (a.op, a.rename.as_deref()),
            _ => (PatchOp::Update, None),
        };
        if let Some(guard) = self.plan_guard {
            guard
                .enforce_write(path, op.as_str(), rename)
                .map_err(EditError::PlanModeBlocked)?;
        }
        self.check_abort()?;

        match request {
            EditRequest::Patch(args) if args.op == PatchOp::Create => self.apply_create(args),
            EditRequest::Patch(args) if args.op == PatchOp::Delete => self.apply_delete(args),
            EditRequest::Patch(args) => self.apply_update(args),
            EditRequest::Replace(args) => self.apply_replace_mode(args),
            EditRequest::Hashline(args) => self.apply_hashline_mode(args),
        }
    }

    fn check_abort(&self) -> Result<(), EditError> {
        if self.abort.is_aborted() {
            return Err(EditError::io(
                "edit aborted".to_string(),
                std::io::Error::new(std::io::ErrorKind::Interrupted, "abort signal fired"),
            ));
        }
        Ok(())
    }

    /// Persist through the writethrough when one is installed, else through
    /// the FS capability. Returns diagnostics from the writethrough.
    fn persist(&self, path: &str, content: &str) -> Result<Option<DiagnosticsResult>, EditError> {
        match self.writethrough {
            Some(wt) => {
                let mut buf = content.to_string();
                wt.write(path, &mut buf, &self.abort, self.batch_id.as_deref()).map_err(|e| {
                    EditError::io(
                        format!("writethrough failed for '{path}'"),
                        std::io::Error::other(e.to_string()),
                    )
                })
            }
            None => {
                self.fs.write(path, content)?;
                Ok(None)
            }
        }
    }

    // ── create / delete ───────────────────────────────────────────────────

    fn apply_create(&self, args: &PatchArgs) -> Result<EditOutcome, EditError> {
        let raw = args.diff.clone().unwrap_or_default();
        let content = strip_create_plus_prefixes(&raw);
        let target = args.rename.as_deref().unwrap_or(&args.path);

        if let Some(parent) = std::path::Path::new(target).parent() {
            if !parent.as_os_str().is_empty() {
                self.fs.mkdir(&parent.to_string_lossy())?;
            }
        }
        self.check_abort()?;
        let diagnostics = self.persist(target, &content)?;

        Ok(EditOutcome {
            content: vec![format!("Created {target}")],
            details: EditDetails {
                diff: unified_diff(target, "", &content),
                first_changed_line: Some(1),
                diagnostics,
                op: Some("create".to_string()),
                rename: args.rename.clone(),
                ..Default::default()
            },
        })
    }

    fn apply_delete(&self, args: &PatchArgs) -> Result<EditOutcome, EditError> {
        let old = self.fs.read(&args.path)?;
        self.check_abort()?;
        self.fs.delete(&args.path)?;
        Ok(EditOutcome {
            content: vec![format!("Deleted {}", args.path)],
            details: EditDetails {
                diff: unified_diff(&args.path, &old, ""),
                op: Some("delete".to_string()),
                ..Default::default()
            },
        })
    }

    // ── update modes ──────────────────────────────────────────────────────

    fn apply_update(&self, args: &PatchArgs) -> Result<EditOutcome, EditError> {
        let diff_text = args.diff.as_deref().unwrap_or_default();
        let hunks = parse_hunks(diff_text)?;

        self.run_update(&args.path, args.rename.as_deref(), "update", |lf| {
            let r = apply_patch(&args.path, lf, &hunks, &self.config)?;
            Ok((r.content, r.first_changed_line, Vec::new(), None))
        })
    }

    fn apply_replace_mode(&self, args: &ReplaceArgs) -> Result<EditOutcome, EditError> {
        let old_text = normalize_to_lf(&args.old_text);
        let new_text = normalize_to_lf(&args.new_text);

        self.run_update(&args.path, None, "update", |lf| {
            let r = apply_replace(&args.path, lf, &old_text, &new_text, args.all, &self.config)?;
            let summary = (r.replacements > 1)
                .then(|| format!("Replaced {} occurrences in {}", r.replacements, args.path));
            Ok((r.content, r.first_changed_line, Vec::new(), summary))
        })
    }

    fn apply_hashline_mode(&self, args: &HashlineArgs) -> Result<EditOutcome, EditError> {
        self.run_update(&args.path, None, "update", |lf| {
            let r = apply_hashline_edits(&args.path, lf, &args.edits)?;
            Ok((r.content, r.first_changed_line, r.warnings, None))
        })
    }

    /// Shared read → normalize → mutate → restore → persist path for the
    /// three update-shaped modes.
    fn run_update<F>(
        &self,
        path: &str,
        rename: Option<&str>,
        op: &str,
        mutate: F,
    ) -> Result<EditOutcome, EditError>
    where
        F: FnOnce(&str) -> Result<(String, Option<usize>, Vec<String>, Option<String>), EditError>,
    {
        let raw = self.fs.read(path)?;
        let (bom, rest) = strip_bom(&raw);
        let ending = detect_line_ending(rest);
        let lf = normalize_to_lf(rest);

        let (new_lf, first_changed_line, warnings, summary) = mutate(&lf)?;

        self.check_abort()?;
        let mut restored = String::with_capacity(bom.len() + new_lf.len());
        restored.push_str(bom);
        restored.push_str(&restore_line_endings(&new_lf, ending));

        let target = rename.unwrap_or(path);
        if let Some(rename_target) = rename {
            if let Some(parent) = std::path::Path::new(rename_target).parent() {
                if !parent.as_os_str().is_empty() {
                    self.fs.mkdir(&parent.to_string_lossy())?;
                }
            }
        }
        let diagnostics = self.persist(target, &restored)?;
        if rename.is_some() {
            self.fs.delete(path)?;
        }

        let summary = summary.unwrap_or_else(|| match rename {
            Some(r) => format!("Updated {path} → {r}"),
            None => format!("Updated {path}"),
        });

        Ok(EditOutcome {
            content: vec![summary],
            details: EditDetails {
                diff: unified_diff(path, &raw, &restored),
                first_changed_line,
                diagnostics,
                op: Some(op.to_string()),
                rename: rename.map(str::to_string),
                warnings,
                context_echo: context_echo(&new_lf, first_changed_line),
            },
        })
    }
}

/// For `create`, models often send the whole file as `+` lines. Strip the
/// prefix only when every non-empty line carries it.
fn strip_create_plus_prefixes(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    let all_plussed = lines
        .iter()
        .filter(|l| !l.is_empty())
        .all(|l| l.starts_with('+'));
    if !all_plussed || lines.iter().all(|l| l.is_empty()) {
        return raw.to_string();
    }
    lines
        .iter()
        .map(|l| l.strip_prefix('+').unwrap_or(l))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A window of the post-edit file around the first change, in the hashline
/// display format, so the model can chain edits without re-reading.
fn context_echo(content_lf: &str, first_changed_line: Option<usize>) -> Option<String> {
    let first = first_changed_line?;
    let lines: Vec<&str> = content_lf.split('\n').collect();
    let total = lines.len();
    if total == 0 {
        return None;
    }
    let centre = first.saturating_sub(1).min(total - 1);
    let lo = centre.saturating_sub(ECHO_RADIUS);
    let hi = (centre + ECHO_RADIUS).min(total);
    Some(format_hashlines(&lines[lo..hi].join("\n"), lo + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn engine<'a>(fs: &'a MemoryFileSystem) -> EditEngine<'a> {
        EditEngine::new(fs, EditConfig::default())
    }

    fn replace_request(path: &str, old: &str, new: &str) -> EditRequest {
        EditRequest::Replace(ReplaceArgs {
            path: path.to_string(),
            old_text: old.to_string(),
            new_text: new.to_string(),
            all: false,
        })
    }

    #[test]
    fn test_replace_updates_file() {
        let fs = MemoryFileSystem::with_file("f.rs", "a\nb\nc\n");
        let out = engine(&fs).apply(&replace_request("f.rs", "b", "B")).unwrap();
        assert_eq!(fs.get("f.rs").unwrap(), "a\nB\nc\n");
        assert_eq!(out.content, vec!["Updated f.rs".to_string()]);
        assert_eq!(out.details.first_changed_line, Some(2));
        assert!(out.details.diff.contains("+B"));
        assert!(out.details.context_echo.is_some());
    }

    #[test]
    fn test_crlf_round_trip() {
        let fs = MemoryFileSystem::with_file("f.rs", "a\r\nb\r\n");
        engine(&fs).apply(&replace_request("f.rs", "b", "B")).unwrap();
        assert_eq!(fs.get("f.rs").unwrap(), "a\r\nB\r\n");
    }

    #[test]
    fn test_bom_preserved() {
        let fs = MemoryFileSystem::with_file("f.rs", "\u{FEFF}a\nb\n");
        engine(&fs).apply(&replace_request("f.rs", "b", "B")).unwrap();
        assert_eq!(fs.get("f.rs").unwrap(), "\u{FEFF}a\nB\n");
    }

    #[test]
    fn test_notebook_rejected() {
        let fs = MemoryFileSystem::with_file("nb.ipynb", "{}");
        let err = engine(&fs).apply(&replace_request("nb.ipynb", "a", "b")).unwrap_err();
        assert!(matches!(err, EditError::NotebookUnsupported { .. }));
    }

    #[test]
    fn test_missing_file() {
        let fs = MemoryFileSystem::new();
        let err = engine(&fs).apply(&replace_request("gone.rs", "a", "b")).unwrap_err();
        assert!(matches!(err, EditError::FileNotFound { .. }));
    }

    #[test]
    fn test_failed_edit_leaves_file_untouched() {
        let fs = MemoryFileSystem::with_file("f.rs", "x\nx\n");
        let err = engine(&fs).apply(&replace_request("f.rs", "x", "y")).unwrap_err();
        assert!(matches!(err, EditError::AmbiguousMatch(_)));
        assert_eq!(fs.get("f.rs").unwrap(), "x\nx\n");
    }

    struct DenyGuard;
    impl PlanModeGuard for DenyGuard {
        fn enforce_write(&self, path: &str, op: &str, _: Option<&str>) -> Result<(), String> {
            Err(format!("plan mode: refusing to {op} {path}"))
        }
    }

    #[test]
    fn test_plan_guard_blocks_verbatim() {
        let fs = MemoryFileSystem::with_file("f.rs", "a\n");
        let guard = DenyGuard;
        let eng = engine(&fs).with_plan_guard(&guard);
        let err = eng.apply(&replace_request("f.rs", "a", "b")).unwrap_err();
        match err {
            EditError::PlanModeBlocked(msg) => {
                assert_eq!(msg, "plan mode: refusing to update f.rs");
            }
            other => panic!("expected plan block, got {other:?}"),
        }
        assert_eq!(fs.get("f.rs").unwrap(), "a\n");
    }

    #[test]
    fn test_abort_before_write() {
        let fs = MemoryFileSystem::with_file("f.rs", "a\nb\n");
        let abort = AbortFlag::new();
        abort.abort();
        let eng = engine(&fs).with_abort(abort);
        assert!(eng.apply(&replace_request("f.rs", "b", "B")).is_err());
        assert_eq!(fs.get("f.rs").unwrap(), "a\nb\n");
    }

    struct RecordingWritethrough(std::cell::RefCell<Option<String>>);
    impl Writethrough for RecordingWritethrough {
        fn write(
            &self,
            _path: &str,
            content: &mut String,
            _abort: &AbortFlag,
            batch: Option<&str>,
        ) -> anyhow::Result<Option<DiagnosticsResult>> {
            *self.0.borrow_mut() = Some(content.clone());
            Ok(Some(serde_json::json!({"formatted": true, "batch": batch})))
        }
    }

    #[test]
    fn test_writethrough_receives_bytes_and_returns_diagnostics() {
        let fs = MemoryFileSystem::with_file("f.rs", "a\nb\n");
        let wt = RecordingWritethrough(std::cell::RefCell::new(None));
        let eng = engine(&fs).with_writethrough(&wt);
        let out = eng.apply(&replace_request("f.rs", "b", "B")).unwrap();
        assert_eq!(wt.0.borrow().as_deref(), Some("a\nB\n"));
        assert_eq!(
            out.details.diagnostics,
            Some(serde_json::json!({"formatted": true, "batch": null}))
        );
        // Engine did not double-write through the FS capability
        assert_eq!(fs.get("f.rs").unwrap(), "a\nb\n");
    }

    #[test]
    fn test_patch_create_strips_plus_prefixes() {
        let fs = MemoryFileSystem::new();
        let req = EditRequest::Patch(PatchArgs {
            path: "new.rs".to_string(),
            op: PatchOp::Create,
            rename: None,
            diff: Some("+fn main() {\n+    run();\n+}\n".to_string()),
        });
        let out = engine(&fs).apply(&req).unwrap();
        assert_eq!(fs.get("new.rs").unwrap(), "fn main() {\n    run();\n}\n");
        assert_eq!(out.content, vec!["Created new.rs".to_string()]);
        assert_eq!(out.details.op.as_deref(), Some("create"));
    }

    #[test]
    fn test_patch_delete() {
        let fs = MemoryFileSystem::with_file("old.rs", "gone\n");
        let req = EditRequest::Patch(PatchArgs {
            path: "old.rs".to_string(),
            op: PatchOp::Delete,
            rename: None,
            diff: None,
        });
        let out = engine(&fs).apply(&req).unwrap();
        assert!(!fs.exists("old.rs"));
        assert_eq!(out.content, vec!["Deleted old.rs".to_string()]);
    }

    #[test]
    fn test_patch_update_with_rename() {
        let fs = MemoryFileSystem::with_file("a.rs", "one\ntwo\n");
        let req = EditRequest::Patch(PatchArgs {
            path: "a.rs".to_string(),
            op: PatchOp::Update,
            rename: Some("b.rs".to_string()),
            diff: Some("@@\n-two\n+TWO\n".to_string()),
        });
        let out = engine(&fs).apply(&req).unwrap();
        assert!(!fs.exists("a.rs"));
        assert_eq!(fs.get("b.rs").unwrap(), "one\nTWO\n");
        assert_eq!(out.content, vec!["Updated a.rs → b.rs".to_string()]);
    }

    #[test]
    fn test_hashline_mode_end_to_end() {
        let file = "alpha\nbeta\n";
        let fs = MemoryFileSystem::with_file("f.txt", file);
        let loc = format!("2:{}", crate::hashline::hash::compute_line_hash("beta"));
        let req = EditRequest::Hashline(HashlineArgs {
            path: "f.txt".to_string(),
            edits: vec![HashlineEdit::ReplaceLine {
                replace_line: crate::hashline::parse::ReplaceLineOp {
                    loc,
                    content: "BETA".to_string(),
                },
            }],
        });
        let out = engine(&fs).apply(&req).unwrap();
        assert_eq!(fs.get("f.txt").unwrap(), "alpha\nBETA\n");
        assert_eq!(out.details.first_changed_line, Some(2));
    }

    #[test]
    fn test_replace_all_summary() {
        let fs = MemoryFileSystem::with_file("f.rs", "x\nmid\nx\n");
        let req = EditRequest::Replace(ReplaceArgs {
            path: "f.rs".to_string(),
            old_text: "x".to_string(),
            new_text: "y".to_string(),
            all: true,
        });
        let out = engine(&fs).apply(&req).unwrap();
        assert_eq!(out.content, vec!["Replaced 2 occurrences in f.rs".to_string()]);
    }

    #[test]
    fn test_mode_inference_from_descriptor_shape() {
        let replace = serde_json::json!({"path": "f", "old_text": "a", "new_text": "b"});
        assert!(matches!(
            EditRequest::from_value(EditMode::Auto, &replace).unwrap(),
            EditRequest::Replace(_)
        ));
        let hashline = serde_json::json!({"path": "f", "edits": []});
        assert!(matches!(
            EditRequest::from_value(EditMode::Auto, &hashline).unwrap(),
            EditRequest::Hashline(_)
        ));
        let patch = serde_json::json!({"path": "f", "diff": "@@\n-a\n+b\n"});
        assert!(matches!(
            EditRequest::from_value(EditMode::Auto, &patch).unwrap(),
            EditRequest::Patch(_)
        ));
    }

    #[test]
    fn test_context_echo_format() {
        let fs = MemoryFileSystem::with_file("f.rs", "a\nb\nc\n");
        let out = engine(&fs).apply(&replace_request("f.rs", "b", "B")).unwrap();
        let echo = out.details.context_echo.unwrap();
        assert!(echo.contains("| B"));
        assert!(echo.starts_with("1:"));
    }
}
