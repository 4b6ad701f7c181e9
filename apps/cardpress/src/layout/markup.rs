//! Line-level markdown classification shared by height estimation and card HTML.
//!
//! Only the constructs that change how much vertical space a line takes are recognised.
//! Everything else is treated as running text.

/// How a single source line is drawn on a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Empty or whitespace-only line: a paragraph gap.
    Blank,
    /// `#` through `######`.
    Heading(u8),
    /// `- `, `* `, `+ ` or `1. ` list item (marker drawn in the indent).
    ListItem,
    /// `> ` quotation.
    Quote,
    Text,
}

/// Splits a line into its kind and the content after the block marker.
pub fn classify(line: &str) -> (LineKind, &str) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return (LineKind::Blank, "");
    }

    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&hashes) {
        let rest = &trimmed[hashes..];
        if rest.is_empty() || rest.starts_with(' ') {
            return (LineKind::Heading(hashes as u8), rest.trim());
        }
    }

    for marker in ["- ", "* ", "+ "] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return (LineKind::ListItem, rest.trim());
        }
    }

    if let Some(rest) = strip_ordered_marker(trimmed) {
        return (LineKind::ListItem, rest.trim());
    }

    if let Some(rest) = trimmed.strip_prefix('>') {
        return (LineKind::Quote, rest.trim());
    }

    (LineKind::Text, trimmed)
}

/// Removes inline emphasis/code markers that never reach the card as glyphs.
pub fn visible_text(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '`' => {}
            '*' | '_' | '~' if chars.peek() == Some(&c) => {
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// `12. rest` → `rest`
fn strip_ordered_marker(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 3 {
        return None;
    }
    line[digits..].strip_prefix(". ")
}
