//! Canonical display form for clinical narrative text.
//!
//! Narrative reaches the resolver from several authoring pipelines: JSON written by the
//! recommendation workflow (which sometimes double-escapes newlines), raw model responses saved
//! as text files on Windows machines, and documents stored in MongoDB. Every narrative field is
//! passed through [`normalize_text`] before it enters a `PatientRecord`, so consumers never
//! need to know where a piece of text came from.
//!
//! Rules, applied in this order:
//! - absent input becomes the empty string
//! - the two-character escape `\n` (backslash, `n`) becomes a line feed
//! - `\r\n` and lone `\r` become a line feed
//! - non-breaking spaces (U+00A0, U+2007, U+202F) become ASCII spaces
//!
//! Nothing else is touched: no trimming, no truncation, no markup stripping.

/// Characters rendered as ordinary spaces.
const NON_BREAKING_SPACES: [char; 3] = ['\u{00A0}', '\u{2007}', '\u{202F}'];

/// Normalise a narrative field into its canonical display form.
///
/// The function is idempotent: `normalize_text(Some(&normalize_text(x))) == normalize_text(x)`.
pub fn normalize_text(text: Option<&str>) -> String {
    let Some(text) = text else {
        return String::new();
    };

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'n') => {
                chars.next();
                out.push('\n');
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            c if NON_BREAKING_SPACES.contains(&c) => out.push(' '),
            c => out.push(c),
        }
    }

    out
}

/// Normalise an optional field, dropping it when nothing but whitespace remains.
pub(crate) fn normalize_optional(text: Option<&str>) -> Option<String> {
    let normalized = normalize_text(text);
    if normalized.trim().is_empty() {
        None
    } else {
        Some(normalized)
    }
}
