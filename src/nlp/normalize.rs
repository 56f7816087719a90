//! Width normalization
//!
//! Answers produced by different pipelines mix full-width and half-width
//! forms of the same character (`（` vs `(`, `，` vs `,`, `２` vs `2`).
//! Substring matching folds both sides to half-width first.

/// Fold a single character to its half-width form.
pub fn fold_width(c: char) -> char {
    match c {
        '\u{3000}' => ' ',
        // Full-width ASCII block maps 1:1 onto printable ASCII
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        '\u{3002}' | '\u{FF61}' => '.',
        '\u{3001}' | '\u{FF64}' => ',',
        '\u{2018}' | '\u{2019}' => '\'',
        '\u{201C}' | '\u{201D}' => '"',
        '\u{301C}' => '~',
        _ => c,
    }
}

/// Fold every character of `text` to half-width.
pub fn normalize_width(text: &str) -> String {
    text.chars().map(fold_width).collect()
}

/// Normalize text for substring matching.
///
/// Always folds width; lower-cases as well when `case_insensitive` is set.
pub fn normalize_for_matching(text: &str, case_insensitive: bool) -> String {
    let folded = normalize_width(text);
    if case_insensitive {
        folded.to_lowercase()
    } else {
        folded
    }
}
