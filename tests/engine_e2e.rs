//! End-to-end scenarios through the façade against a real file system.

use emend::fs::{FileSystem, OsFileSystem};
use emend::hashline::hash::compute_line_hash;
use emend::hashline::parse::{HashlineEdit, ReplaceLineOp};
use emend::{
    EditConfig, EditEngine, EditError, EditRequest, HashlineArgs, PatchArgs, PatchOp, ReplaceArgs,
};

struct Scratch {
    _dir: tempfile::TempDir,
    path: String,
}

fn scratch(content: &str) -> Scratch {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("file.txt").to_str().unwrap().to_string();
    std::fs::write(&path, content).unwrap();
    Scratch { _dir: dir, path }
}

fn replace(path: &str, old: &str, new: &str, all: bool) -> EditRequest {
    EditRequest::Replace(ReplaceArgs {
        path: path.to_string(),
        old_text: old.to_string(),
        new_text: new.to_string(),
        all,
    })
}

fn patch(path: &str, diff: &str) -> EditRequest {
    EditRequest::Patch(PatchArgs {
        path: path.to_string(),
        op: PatchOp::Update,
        rename: None,
        diff: Some(diff.to_string()),
    })
}

fn hashline(path: &str, edits: Vec<HashlineEdit>) -> EditRequest {
    EditRequest::Hashline(HashlineArgs { path: path.to_string(), edits })
}

fn replace_line(loc: String, content: &str) -> HashlineEdit {
    HashlineEdit::ReplaceLine {
        replace_line: ReplaceLineOp { loc, content: content.to_string() },
    }
}

#[test]
fn replace_mode_exact_unique() {
    let s = scratch("a\nb\nc\n");
    let fs = OsFileSystem;
    let engine = EditEngine::new(&fs, EditConfig::default());
    let out = engine.apply(&replace(&s.path, "b", "B", false)).unwrap();
    assert_eq!(std::fs::read_to_string(&s.path).unwrap(), "a\nB\nc\n");
    assert_eq!(out.details.first_changed_line, Some(2));
}

#[test]
fn replace_mode_ambiguous_lists_numbered_previews() {
    let s = scratch("x\nx\n");
    let fs = OsFileSystem;
    let engine = EditEngine::new(&fs, EditConfig::default());
    let err = engine.apply(&replace(&s.path, "x", "y", false)).unwrap_err();
    let msg = match err {
        EditError::AmbiguousMatch(msg) => msg,
        other => panic!("expected ambiguous, got {other:?}"),
    };
    assert!(msg.contains("── match 1 of 2 ──"));
    assert!(msg.contains("── match 2 of 2 ──"));
    assert!(msg.contains("   1 | x"));
    assert!(msg.contains("   2 | x"));
    // File untouched
    assert_eq!(std::fs::read_to_string(&s.path).unwrap(), "x\nx\n");
}

#[test]
fn patch_mode_context_disambiguation() {
    let s = scratch("def foo():\n    return 1\ndef bar():\n    return 1\n");
    let fs = OsFileSystem;
    let engine = EditEngine::new(&fs, EditConfig::default());
    engine
        .apply(&patch(&s.path, "@@ def bar():\n def bar():\n-    return 1\n+    return 2\n"))
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(&s.path).unwrap(),
        "def foo():\n    return 1\ndef bar():\n    return 2\n"
    );
}

#[test]
fn hashline_stale_hash_fails_with_quick_fix() {
    let s = scratch("alpha\nbeta\n");
    let fs = OsFileSystem;
    let engine = EditEngine::new(&fs, EditConfig::default());
    let err = engine
        .apply(&hashline(&s.path, vec![replace_line("2:xyz".to_string(), "BETA")]))
        .unwrap_err();
    let e = match err {
        EditError::HashlineMismatch(e) => e,
        other => panic!("expected hashline mismatch, got {other:?}"),
    };
    assert_eq!(e.mismatches.len(), 1);
    assert_eq!(e.mismatches[0].line, 2);
    let beta = compute_line_hash("beta");
    assert!(e.to_string().contains(&format!("2:xyz → 2:{beta}")));
    assert_eq!(std::fs::read_to_string(&s.path).unwrap(), "alpha\nbeta\n");
}

#[test]
fn hashline_relocates_by_unique_hash() {
    let s = scratch("alpha\nbeta\n");
    let fs = OsFileSystem;
    let engine = EditEngine::new(&fs, EditConfig::default());
    let h2 = compute_line_hash("beta");
    engine
        .apply(&hashline(&s.path, vec![replace_line(format!("1:{h2}"), "BETA")]))
        .unwrap();
    assert_eq!(std::fs::read_to_string(&s.path).unwrap(), "alpha\nBETA\n");
}

#[test]
fn crlf_preserved_across_edit() {
    let s = scratch("a\r\nb\r\n");
    let fs = OsFileSystem;
    let engine = EditEngine::new(&fs, EditConfig::default());
    engine.apply(&replace(&s.path, "b", "NEW", false)).unwrap();
    assert_eq!(std::fs::read_to_string(&s.path).unwrap(), "a\r\nNEW\r\n");
}

#[test]
fn bom_and_crlf_survive_patch_mode() {
    let s = scratch("\u{FEFF}one\r\ntwo\r\n");
    let fs = OsFileSystem;
    let engine = EditEngine::new(&fs, EditConfig::default());
    engine.apply(&patch(&s.path, "@@\n-two\n+TWO\n")).unwrap();
    assert_eq!(
        std::fs::read_to_string(&s.path).unwrap(),
        "\u{FEFF}one\r\nTWO\r\n"
    );
}

#[test]
fn edit_then_inverse_restores_original() {
    let original = "fn main() {\n    run();\n}\n";
    let s = scratch(original);
    let fs = OsFileSystem;
    let engine = EditEngine::new(&fs, EditConfig::default());
    engine.apply(&replace(&s.path, "run();", "walk();", false)).unwrap();
    engine.apply(&replace(&s.path, "walk();", "run();", false)).unwrap();
    assert_eq!(std::fs::read_to_string(&s.path).unwrap(), original);
}

#[test]
fn read_then_write_is_byte_identical() {
    // The no-edit round trip: what the capability reads, written back
    // unchanged, leaves the file byte-for-byte identical.
    let original = "\u{FEFF}mixed content\r\nsecond line\r\n";
    let s = scratch(original);
    let fs = OsFileSystem;
    let content = fs.read(&s.path).unwrap();
    fs.write(&s.path, &content).unwrap();
    assert_eq!(std::fs::read_to_string(&s.path).unwrap(), original);
}

#[test]
fn create_delete_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sub").join("new.rs").to_str().unwrap().to_string();
    let fs = OsFileSystem;
    let engine = EditEngine::new(&fs, EditConfig::default());

    let out = engine
        .apply(&EditRequest::Patch(PatchArgs {
            path: path.clone(),
            op: PatchOp::Create,
            rename: None,
            diff: Some("fn main() {}\n".to_string()),
        }))
        .unwrap();
    assert_eq!(out.content, vec![format!("Created {path}")]);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "fn main() {}\n");

    engine
        .apply(&EditRequest::Patch(PatchArgs {
            path: path.clone(),
            op: PatchOp::Delete,
            rename: None,
            diff: None,
        }))
        .unwrap();
    assert!(!std::path::Path::new(&path).exists());
}

#[test]
fn multi_hunk_patch_is_atomic() {
    let s = scratch("one\ntwo\nthree\n");
    let fs = OsFileSystem;
    let engine = EditEngine::new(&fs, EditConfig::default());
    // Second hunk cannot be placed; the first must not land either
    let err = engine
        .apply(&patch(&s.path, "@@\n-one\n+ONE\n@@\n-missing\n+M\n"))
        .unwrap_err();
    assert!(matches!(err, EditError::MatchNotFound(_)));
    assert_eq!(std::fs::read_to_string(&s.path).unwrap(), "one\ntwo\nthree\n");
}

#[test]
fn fuzzy_replace_survives_whitespace_drift() {
    let s = scratch("fn f() {\n    let value  =  compute( a,  b );\n}\n");
    let fs = OsFileSystem;
    let engine = EditEngine::new(&fs, EditConfig::default());
    engine
        .apply(&replace(
            &s.path,
            "let value = compute( a, b );",
            "let value = compute(a, b, c);",
            false,
        ))
        .unwrap();
    assert!(std::fs::read_to_string(&s.path).unwrap().contains("compute(a, b, c);"));
}
