//! Text normalization: BOM, line endings, unicode confusables, whitespace.
//!
//! Everything here is pure string work. Matching always runs on LF-only
//! content; the original line ending and BOM are captured at read time and
//! restored at write time, never converted in the user's content.

/// Line-ending convention of a file, detected by first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }
}

const BOM: char = '\u{FEFF}';

/// Split a leading BOM off the text. Returns `(bom, rest)` where `bom` is
/// either `"\u{FEFF}"` or the empty string.
pub fn strip_bom(text: &str) -> (&str, &str) {
    match text.strip_prefix(BOM) {
        Some(rest) => (&text[..BOM.len_utf8()], rest),
        None => ("", text),
    }
}

/// Detect the dominant line ending. First occurrence wins; files with no
/// line breaks default to LF.
pub fn detect_line_ending(text: &str) -> LineEnding {
    let bytes = text.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'\n' => return LineEnding::Lf,
            b'\r' => {
                if bytes.get(i + 1) == Some(&b'\n') {
                    return LineEnding::CrLf;
                }
                return LineEnding::Cr;
            }
            _ => {}
        }
    }
    LineEnding::Lf
}

/// Replace CRLF and standalone CR with LF.
pub fn normalize_to_lf(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Inverse of [`normalize_to_lf`] for a given ending. The input must be
/// LF-only (as produced by normalization).
pub fn restore_line_endings(text: &str, ending: LineEnding) -> String {
    match ending {
        LineEnding::Lf => text.to_string(),
        LineEnding::CrLf => text.replace('\n', "\r\n"),
        LineEnding::Cr => text.replace('\n', "\r"),
    }
}

// ── Confusable folding ────────────────────────────────────────────────────────

/// Fold a unicode hyphen/dash variant to an ASCII '-', or return None.
fn fold_hyphen(c: char) -> Option<char> {
    match c {
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' | '\u{FE58}' | '\u{FE63}' | '\u{FF0D}' => Some('-'),
        _ => None,
    }
}

/// Fold a smart quote to its ASCII counterpart, or return None.
fn fold_quote(c: char) -> Option<char> {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' | '\u{00B4}' | '\u{0060}' => Some('\''),
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => Some('"'),
        _ => None,
    }
}

/// Fold a non-breaking or typographic space to a plain space, or return None.
fn fold_space(c: char) -> Option<char> {
    match c {
        '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => Some(' '),
        _ => None,
    }
}

/// True if the line contains any unicode hyphen/dash variant that folds to '-'.
pub fn has_confusable_hyphens(line: &str) -> bool {
    line.chars().any(|c| fold_hyphen(c).is_some())
}

/// Replace unicode hyphen/dash variants with ASCII '-'.
pub fn fold_confusable_hyphens(line: &str) -> String {
    line.chars().map(|c| fold_hyphen(c).unwrap_or(c)).collect()
}

/// Light fold used by context matching: confusable punctuation only.
/// Whitespace and casing are untouched.
pub fn normalize_unicode(line: &str) -> String {
    line.chars()
        .map(|c| {
            fold_hyphen(c)
                .or_else(|| fold_quote(c))
                .or_else(|| fold_space(c))
                .unwrap_or(c)
        })
        .collect()
}

/// Aggressive fold used by similarity scoring: trims the line, collapses
/// runs of whitespace to a single space, and folds confusable punctuation.
/// Idempotent.
pub fn normalize_for_fuzzy(line: &str) -> String {
    let folded = normalize_unicode(line);
    let mut out = String::with_capacity(folded.len());
    let mut in_ws = false;
    for c in folded.trim().chars() {
        if c.is_whitespace() {
            in_ws = true;
            continue;
        }
        if in_ws && !out.is_empty() {
            out.push(' ');
        }
        in_ws = false;
        out.push(c);
    }
    out
}

// ── Leading whitespace ────────────────────────────────────────────────────────

/// Number of leading whitespace characters (tabs count as one).
pub fn count_leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

/// The leading whitespace prefix itself.
pub fn get_leading_whitespace(line: &str) -> &str {
    let end = line
        .char_indices()
        .find(|(_, c)| *c != ' ' && *c != '\t')
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    &line[..end]
}

/// Convert leading tabs to `ratio` spaces each, per line. Used when a
/// pattern is tab-indented but the file indents with spaces at a consistent
/// integer ratio.
pub fn convert_leading_tabs_to_spaces(text: &str, ratio: usize) -> String {
    text.split('\n')
        .map(|line| {
            let tabs = line.chars().take_while(|c| *c == '\t').count();
            if tabs == 0 {
                line.to_string()
            } else {
                let mut out = " ".repeat(tabs * ratio);
                out.push_str(&line[tabs..]);
                out
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bom() {
        let (bom, rest) = strip_bom("\u{FEFF}hello");
        assert_eq!(bom, "\u{FEFF}");
        assert_eq!(rest, "hello");

        let (bom, rest) = strip_bom("hello");
        assert_eq!(bom, "");
        assert_eq!(rest, "hello");
    }

    #[test]
    fn test_detect_line_ending_first_occurrence_wins() {
        assert_eq!(detect_line_ending("a\nb\r\nc"), LineEnding::Lf);
        assert_eq!(detect_line_ending("a\r\nb\nc"), LineEnding::CrLf);
        assert_eq!(detect_line_ending("a\rb"), LineEnding::Cr);
        assert_eq!(detect_line_ending("no breaks"), LineEnding::Lf);
        assert_eq!(detect_line_ending(""), LineEnding::Lf);
    }

    #[test]
    fn test_lf_round_trip() {
        for text in ["a\r\nb\r\n", "a\rb\r", "a\nb\n", ""] {
            let ending = detect_line_ending(text);
            let lf = normalize_to_lf(text);
            assert_eq!(restore_line_endings(&lf, ending), text);
        }
    }

    #[test]
    fn test_normalize_for_fuzzy_collapses_and_folds() {
        assert_eq!(normalize_for_fuzzy("  let  x\t=  1;  "), "let x = 1;");
        assert_eq!(normalize_for_fuzzy("a \u{2014} b"), "a - b");
        assert_eq!(normalize_for_fuzzy("\u{201C}hi\u{201D}"), "\"hi\"");
    }

    #[test]
    fn test_normalize_for_fuzzy_idempotent() {
        for s in ["  a  b  ", "x\u{2013}y", "\tindent\t", ""] {
            let once = normalize_for_fuzzy(s);
            assert_eq!(normalize_for_fuzzy(&once), once);
        }
    }

    #[test]
    fn test_normalize_unicode_keeps_whitespace() {
        assert_eq!(normalize_unicode("  a\u{2019}s  "), "  a's  ");
    }

    #[test]
    fn test_leading_whitespace() {
        assert_eq!(count_leading_whitespace("    x"), 4);
        assert_eq!(count_leading_whitespace("\t\tx"), 2);
        assert_eq!(count_leading_whitespace("x"), 0);
        assert_eq!(get_leading_whitespace("  \tx y"), "  \t");
        assert_eq!(get_leading_whitespace(""), "");
    }

    #[test]
    fn test_convert_leading_tabs() {
        assert_eq!(
            convert_leading_tabs_to_spaces("\tfn a()\n\t\treturn", 4),
            "    fn a()\n        return"
        );
        // Interior tabs are untouched
        assert_eq!(convert_leading_tabs_to_spaces("a\tb", 4), "a\tb");
    }

    #[test]
    fn test_confusable_hyphens() {
        assert!(has_confusable_hyphens("a \u{2212} b"));
        assert!(!has_confusable_hyphens("a - b"));
        assert_eq!(fold_confusable_hyphens("x \u{2013} y"), "x - y");
    }
}
