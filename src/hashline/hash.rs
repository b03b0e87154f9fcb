//! Line hashes: short staleness tokens for line-addressed edits.
//!
//! The hash is xxHash32 of the whitespace-stripped line, reduced mod 36³
//! and rendered as exactly 3 base-36 characters. Stripping whitespace first
//! means reformatting a line does not invalidate references to it.

use std::fmt::Write as _;

use xxhash_rust::xxh32::xxh32;

/// 36^3 — the hash space of a 3-char base-36 string.
const HASH_SPACE: u32 = 46_656;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Compute the 3-char base-36 hash of a line. Any `\r` is dropped with the
/// rest of the whitespace before hashing.
pub fn compute_line_hash(line: &str) -> String {
    let stripped: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    let mut n = xxh32(stripped.as_bytes(), 0) % HASH_SPACE;
    let mut buf = [0u8; 3];
    for slot in buf.iter_mut().rev() {
        *slot = BASE36[(n % 36) as usize];
        n /= 36;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Render content in the display format models read lines in:
/// `LINENUM:HASH| CONTENT`, one line per input line. `start_line` is the
/// 1-indexed number of the first line. The single pipe-plus-space separator
/// is load-bearing: the decoration stripper matches this exact shape.
pub fn format_hashlines(content: &str, start_line: usize) -> String {
    let mut out = String::new();
    for (i, line) in content.split('\n').enumerate() {
        let _ = writeln!(out, "{}:{}| {line}", start_line + i, compute_line_hash(line));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_shape() {
        for line in ["", "fn main() {", "    let x = 1;", "\tweird\r"] {
            let h = compute_line_hash(line);
            assert_eq!(h.len(), 3);
            assert!(h.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
        }
    }

    #[test]
    fn test_hash_ignores_whitespace() {
        assert_eq!(compute_line_hash("let x = 1;"), compute_line_hash("letx=1;"));
        assert_eq!(compute_line_hash("  a b  "), compute_line_hash("ab"));
        assert_eq!(compute_line_hash("line\r"), compute_line_hash("line"));
    }

    #[test]
    fn test_hash_distinguishes_content() {
        assert_ne!(compute_line_hash("alpha"), compute_line_hash("beta"));
    }

    #[test]
    fn test_display_format_shape() {
        let out = format_hashlines("alpha\nbeta", 10);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("10:"));
        assert!(lines[0].ends_with("| alpha"));
        assert!(lines[1].starts_with("11:"));
        // exactly LINE:HASH| CONTENT — 3-char hash, single pipe, one space
        let hash = &lines[0][3..6];
        assert_eq!(hash, compute_line_hash("alpha"));
        assert_eq!(&lines[0][6..8], "| ");
    }
}
