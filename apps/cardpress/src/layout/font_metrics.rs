//! Style profiles and character-width metrics for card layout.
//!
//! Widths are counted in *narrow units*: one unit is the advance of a narrow Latin glyph
//! at the body font size. The approximation is coarse on purpose. A browser shapes
//! glyphs individually, but a unit table is enough to tell a card that fits from one
//! that overflows, as long as wide glyphs are not counted like Latin ones.
//!
//! Wide glyphs (CJK ideographs, kana, Hangul, fullwidth forms, emoji) take
//! `wide_units` (2 by default). Combining marks, variation selectors, skin-tone
//! modifiers and zero-width joiners take nothing.

use serde::{Deserialize, Serialize};

use crate::layout::LayoutError;

// ────────────────────────────────────────────────────────────────────────────
// Character width table
// ────────────────────────────────────────────────────────────────────────────

/// Inclusive code point range, serialized as `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodepointRange(pub u32, pub u32);

impl CodepointRange {
    fn contains(&self, cp: u32) -> bool {
        self.0 <= cp && cp <= self.1
    }
}

/// Configurable mapping from code point to narrow-unit width.
///
/// `zero_width` is checked before `wide`, so a modifier that sits inside an emoji block
/// (e.g. U+1F3FB skin tones) can still be zero width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharWidthTable {
    pub wide: Vec<CodepointRange>,
    pub zero_width: Vec<CodepointRange>,
    pub wide_units: u32,
}

impl CharWidthTable {
    /// Width of one character in narrow units.
    pub fn char_units(&self, c: char) -> u32 {
        if c.is_control() {
            return 0;
        }
        let cp = c as u32;
        if self.zero_width.iter().any(|r| r.contains(cp)) {
            0
        } else if self.wide.iter().any(|r| r.contains(cp)) {
            self.wide_units
        } else {
            1
        }
    }

    /// Width of a string in narrow units.
    pub fn measure_str(&self, s: &str) -> u32 {
        s.chars().map(|c| self.char_units(c)).sum()
    }
}

impl Default for CharWidthTable {
    fn default() -> Self {
        Self {
            #[rustfmt::skip]
            wide: vec![
                CodepointRange(0x1100, 0x115F),   // Hangul Jamo
                CodepointRange(0x2600, 0x27BF),   // misc symbols, dingbats (emoji presentation)
                CodepointRange(0x2E80, 0x303E),   // CJK radicals, symbols and punctuation
                CodepointRange(0x3041, 0x33FF),   // kana, CJK compatibility
                CodepointRange(0x3400, 0x4DBF),   // CJK extension A
                CodepointRange(0x4E00, 0x9FFF),   // CJK unified ideographs
                CodepointRange(0xA000, 0xA4CF),   // Yi
                CodepointRange(0xAC00, 0xD7A3),   // Hangul syllables
                CodepointRange(0xF900, 0xFAFF),   // CJK compatibility ideographs
                CodepointRange(0xFE30, 0xFE4F),   // CJK compatibility forms
                CodepointRange(0xFF00, 0xFF60),   // fullwidth forms
                CodepointRange(0xFFE0, 0xFFE6),   // fullwidth signs
                CodepointRange(0x1F300, 0x1F64F), // pictographs, emoticons
                CodepointRange(0x1F680, 0x1F6FF), // transport and map
                CodepointRange(0x1F900, 0x1F9FF), // supplemental pictographs
                CodepointRange(0x1FA70, 0x1FAFF), // pictographs extended-A
                CodepointRange(0x20000, 0x3FFFD), // CJK extensions B and later
            ],
            #[rustfmt::skip]
            zero_width: vec![
                CodepointRange(0x0300, 0x036F),   // combining diacritics
                CodepointRange(0x200B, 0x200F),   // ZWSP, ZWNJ, ZWJ, direction marks
                CodepointRange(0xFE00, 0xFE0F),   // variation selectors
                CodepointRange(0x1F3FB, 0x1F3FF), // skin tone modifiers
                CodepointRange(0xE0020, 0xE007F), // tag characters
            ],
            wide_units: 2,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Style profile
// ────────────────────────────────────────────────────────────────────────────

/// Body font metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontMetrics {
    pub font_size_px: f32,
    /// Advance of one narrow unit, in em.
    pub narrow_advance_em: f32,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            font_size_px: 32.0,
            narrow_advance_em: 0.5,
            line_height: 1.7,
        }
    }
}

/// Fixed vertical chrome drawn on every body card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromeHeights {
    pub header_px: f32,
    pub footer_px: f32,
    pub margin_top_px: f32,
    pub margin_bottom_px: f32,
}

impl ChromeHeights {
    pub fn total(&self) -> f32 {
        self.header_px + self.footer_px + self.margin_top_px + self.margin_bottom_px
    }
}

impl Default for ChromeHeights {
    fn default() -> Self {
        Self {
            header_px: 120.0,
            footer_px: 100.0,
            margin_top_px: 80.0,
            margin_bottom_px: 40.0,
        }
    }
}

/// Everything the estimator needs to know about how a card is drawn.
///
/// Defaults describe a 3:4 card of 1080 × 1440 px with a 1100 px safe height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleProfile {
    pub card_width_px: f32,
    pub card_height_px: f32,
    /// Left and right padding each.
    pub horizontal_padding_px: f32,
    pub font: FontMetrics,
    pub chrome: ChromeHeights,
    /// Vertical padding added once per block.
    pub block_padding_px: f32,
    /// Extra space for a blank line inside a block.
    pub paragraph_gap_px: f32,
    /// Indent of list items and quotes, in narrow units.
    pub marker_indent_units: u32,
    /// Font scale for heading levels 1..=6.
    pub heading_scale: [f32; 6],
    pub widths: CharWidthTable,
}

impl Default for StyleProfile {
    fn default() -> Self {
        Self {
            card_width_px: 1080.0,
            card_height_px: 1440.0,
            horizontal_padding_px: 80.0,
            font: FontMetrics::default(),
            chrome: ChromeHeights::default(),
            block_padding_px: 24.0,
            paragraph_gap_px: 16.0,
            marker_indent_units: 3,
            heading_scale: [1.6, 1.4, 1.25, 1.1, 1.0, 1.0],
            widths: CharWidthTable::default(),
        }
    }
}

impl StyleProfile {
    /// Rejects profiles that cannot produce a meaningful layout.
    pub fn validate(&self) -> Result<(), LayoutError> {
        positive("card_width_px", self.card_width_px)?;
        positive("card_height_px", self.card_height_px)?;
        positive("font.font_size_px", self.font.font_size_px)?;
        positive("font.narrow_advance_em", self.font.narrow_advance_em)?;
        positive("font.line_height", self.font.line_height)?;
        non_negative("horizontal_padding_px", self.horizontal_padding_px)?;
        non_negative("block_padding_px", self.block_padding_px)?;
        non_negative("paragraph_gap_px", self.paragraph_gap_px)?;
        non_negative("chrome.header_px", self.chrome.header_px)?;
        non_negative("chrome.footer_px", self.chrome.footer_px)?;
        non_negative("chrome.margin_top_px", self.chrome.margin_top_px)?;
        non_negative("chrome.margin_bottom_px", self.chrome.margin_bottom_px)?;
        for scale in &self.heading_scale {
            positive("heading_scale", *scale)?;
        }
        if self.widths.wide_units == 0 {
            return Err(invalid("widths.wide_units", "must be at least 1"));
        }
        if self.content_width_px() <= 0.0 {
            return Err(invalid(
                "horizontal_padding_px",
                "padding leaves no room for text",
            ));
        }
        if self.safe_height() <= 0.0 {
            return Err(invalid("chrome", "chrome heights exceed the card height"));
        }
        if self.raw_chars_per_line(1.0) < 1.0 {
            return Err(invalid(
                "font.font_size_px",
                "a single narrow glyph does not fit on a line",
            ));
        }
        Ok(())
    }

    /// Usable vertical budget for body content on one card.
    pub fn safe_height(&self) -> f32 {
        self.card_height_px - self.chrome.total()
    }

    pub fn content_width_px(&self) -> f32 {
        self.card_width_px - 2.0 * self.horizontal_padding_px
    }

    /// Narrow units that fit on one line at the given font scale, never below 1.
    pub fn chars_per_line(&self, scale: f32) -> u32 {
        (self.raw_chars_per_line(scale).floor() as u32).max(1)
    }

    pub fn line_height_px(&self, scale: f32) -> f32 {
        self.font.font_size_px * scale * self.font.line_height
    }

    fn raw_chars_per_line(&self, scale: f32) -> f32 {
        self.content_width_px() / (self.font.font_size_px * scale * self.font.narrow_advance_em)
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), LayoutError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, &format!("must be a positive number, got {value}")))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), LayoutError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, &format!("must be zero or more, got {value}")))
    }
}

fn invalid(field: &'static str, reason: &str) -> LayoutError {
    LayoutError::InvalidStyle {
        field,
        reason: reason.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
