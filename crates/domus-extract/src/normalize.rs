//! Text normalization for OCR and native PDF text.
//!
//! Output keeps the original casing. Case-insensitive matching runs against
//! [`NormalizedText::folded`], an ASCII-lowercased copy whose byte offsets
//! line up with [`NormalizedText::text`], so a match in the folded copy can
//! be sliced straight out of the original.

/// Normalize raw text: strip control characters, expand common PDF
/// ligatures, collapse whitespace runs, drop blank lines.
///
/// Lines are preserved (joined with `\n`) because several field rules
/// bound their value window to a single line.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());

    for line in raw.split(&['\n', '\r'][..]) {
        let mut cleaned = String::with_capacity(line.len());
        let mut pending_space = false;

        for c in line.chars() {
            if c.is_whitespace() || c.is_control() {
                pending_space = true;
                continue;
            }
            if pending_space && !cleaned.is_empty() {
                cleaned.push(' ');
            }
            pending_space = false;
            match c {
                '\u{FB00}' => cleaned.push_str("ff"),
                '\u{FB01}' => cleaned.push_str("fi"),
                '\u{FB02}' => cleaned.push_str("fl"),
                '\u{FB03}' => cleaned.push_str("ffi"),
                '\u{FB04}' => cleaned.push_str("ffl"),
                _ => cleaned.push(c),
            }
        }

        if cleaned.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&cleaned);
    }

    out
}

/// Normalized text plus its case-folded matching copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    /// Cleaned text, original casing.
    pub text: String,
    /// ASCII-lowercased copy of `text`; same byte length and offsets.
    pub folded: String,
}

impl NormalizedText {
    /// Normalize `raw`; `None` is treated as empty text.
    pub fn new(raw: Option<&str>) -> Self {
        let text = normalize(raw.unwrap_or(""));
        let folded = text.to_ascii_lowercase();
        Self { text, folded }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
