//! Hashline edit descriptors and `LINE:HASH` reference parsing.

use serde::Deserialize;

/// A parsed line reference: 1-indexed line plus its 3-char staleness hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRef {
    pub line: usize,
    pub hash: String,
}

/// The three hashline operations. The JSON shape mirrors what the model
/// emits: one wrapper key per operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HashlineEdit {
    ReplaceLine {
        #[serde(rename = "replaceLine")]
        replace_line: ReplaceLineOp,
    },
    ReplaceLines {
        #[serde(rename = "replaceLines")]
        replace_lines: ReplaceLinesOp,
    },
    InsertAfter {
        #[serde(rename = "insertAfter")]
        insert_after: InsertAfterOp,
    },
}

/// Substitute a single line; empty content deletes it.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceLineOp {
    pub loc: String,
    pub content: String,
}

/// Substitute an inclusive range; empty content deletes it.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceLinesOp {
    pub start: String,
    pub end: String,
    pub content: String,
}

/// Insert after a line; content must be non-empty.
#[derive(Debug, Clone, Deserialize)]
pub struct InsertAfterOp {
    pub loc: String,
    pub content: String,
}

/// Parse a `LINE:HASH` reference. Models that copied the display format
/// whole (`12:abc| let x = 1;`) get the `| …` suffix stripped; the hash is
/// lowercased so a shouting model still validates.
pub fn parse_line_ref(raw: &str) -> Result<LineRef, String> {
    let s = raw.trim();
    let s = match s.find('|') {
        Some(pos) => s[..pos].trim_end(),
        None => s,
    };
    let (line_part, hash_part) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid line reference '{raw}' — expected LINE:HASH"))?;
    let line: usize = line_part
        .trim()
        .parse()
        .map_err(|_| format!("invalid line number in reference '{raw}'"))?;
    if line == 0 {
        return Err(format!("invalid line number in reference '{raw}' — lines are 1-indexed"));
    }
    let hash = hash_part.trim().to_ascii_lowercase();
    if hash.len() != 3 || !hash.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()) {
        return Err(format!(
            "invalid hash in reference '{raw}' — expected 3 base-36 characters"
        ));
    }
    Ok(LineRef { line, hash })
}
