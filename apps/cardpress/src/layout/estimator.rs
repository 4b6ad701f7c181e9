//! Height estimation for a single content block.
//!
//! Each source line wraps independently: `ceil(visible_units / chars_per_line)` printed
//! lines, where `chars_per_line` depends on the line kind (headings are set larger, list
//! items and quotes lose their marker indent). A run of blank lines costs one paragraph
//! gap. Every block pays `block_padding_px` once.

use crate::document::ContentBlock;
use crate::layout::font_metrics::StyleProfile;
use crate::layout::markup::{classify, visible_text, LineKind};
use crate::layout::LayoutError;

/// Estimated rendered height, in CSS pixels.
pub type PixelHeight = f32;

/// Estimates block heights against a validated style profile.
///
/// Construction validates the profile, so `estimate` itself cannot fail.
#[derive(Debug, Clone, Copy)]
pub struct HeightEstimator<'a> {
    style: &'a StyleProfile,
}

impl<'a> HeightEstimator<'a> {
    pub fn new(style: &'a StyleProfile) -> Result<Self, LayoutError> {
        style.validate()?;
        Ok(Self { style })
    }

    pub fn style(&self) -> &StyleProfile {
        self.style
    }

    pub fn estimate(&self, block: &ContentBlock) -> PixelHeight {
        self.estimate_text(block.raw_text())
    }

    pub fn estimate_text(&self, text: &str) -> PixelHeight {
        let style = self.style;
        let mut height = style.block_padding_px;
        let mut in_gap = false;

        for line in text.trim().lines() {
            let (kind, content) = classify(line);
            if kind == LineKind::Blank {
                if !in_gap {
                    height += style.paragraph_gap_px;
                    in_gap = true;
                }
                continue;
            }
            in_gap = false;

            let (scale, indent) = match kind {
                LineKind::Heading(level) => (style.heading_scale[(level as usize - 1).min(5)], 0),
                LineKind::ListItem | LineKind::Quote => (1.0, style.marker_indent_units),
                LineKind::Text | LineKind::Blank => (1.0, 0),
            };

            let per_line = style.chars_per_line(scale).saturating_sub(indent).max(1);
            let units = style.widths.measure_str(&visible_text(content));
            height += wrapped_lines(units, per_line) as f32 * style.line_height_px(scale);
        }

        height
    }
}

/// Printed lines for `units` of text at `per_line` units per line; at least one.
fn wrapped_lines(units: u32, per_line: u32) -> u32 {
    units.div_ceil(per_line).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> StyleProfile {
        StyleProfile::default()
    }

    fn line_px(style: &StyleProfile) -> f32 {
        style.line_height_px(1.0)
    }

    #[test]
    fn test_invalid_style_rejected_at_construction() {
        let bad = StyleProfile {
            card_width_px: 0.0,
            ..StyleProfile::default()
        };
        assert!(HeightEstimator::new(&bad).is_err());
    }

    #[test]
    fn test_empty_text_is_padding_only() {
        let style = style();
        let est = HeightEstimator::new(&style).unwrap();
        assert!((est.estimate_text("") - style.block_padding_px).abs() < 1e-3);
    }

    #[test]
    fn test_short_line_is_one_line() {
        let style = style();
        let est = HeightEstimator::new(&style).unwrap();
        let expected = style.block_padding_px + line_px(&style);
        assert!((est.estimate_text("Hello") - expected).abs() < 1e-3);
    }

    #[test]
    fn test_exactly_full_line_does_not_wrap() {
        let style = style();
        let est = HeightEstimator::new(&style).unwrap();
        let full = "a".repeat(style.chars_per_line(1.0) as usize);
        let expected = style.block_padding_px + line_px(&style);
        assert!((est.estimate_text(&full) - expected).abs() < 1e-3);
    }

    #[test]
    fn test_one_over_wraps_to_two_lines() {
        let style = style();
        let est = HeightEstimator::new(&style).unwrap();
        let over = "a".repeat(style.chars_per_line(1.0) as usize + 1);
        let expected = style.block_padding_px + 2.0 * line_px(&style);
        assert!((est.estimate_text(&over) - expected).abs() < 1e-3);
    }

    #[test]
    fn test_cjk_wraps_twice_as_soon_as_latin() {
        let style = style();
        let est = HeightEstimator::new(&style).unwrap();
        // 57 units per line: 40 Latin chars fit on one line, 40 CJK chars need two.
        let latin = "a".repeat(40);
        let cjk = "效".repeat(40);
        assert!(est.estimate_text(&cjk) > est.estimate_text(&latin));
        let expected = style.block_padding_px + 2.0 * line_px(&style);
        assert!((est.estimate_text(&cjk) - expected).abs() < 1e-3);
    }

    #[test]
    fn test_uniform_table_underestimates_cjk() {
        // Counting code points uniformly would fit 40 CJK glyphs on one line.
        let mut uniform = style();
        uniform.widths.wide.clear();
        let style = style();
        let cjk = "效".repeat(40);
        let wide_aware = HeightEstimator::new(&style).unwrap().estimate_text(&cjk);
        let naive = HeightEstimator::new(&uniform).unwrap().estimate_text(&cjk);
        assert!(naive < wide_aware);
    }

    #[test]
    fn test_each_source_line_wraps_separately() {
        let style = style();
        let est = HeightEstimator::new(&style).unwrap();
        let expected = style.block_padding_px + 3.0 * line_px(&style);
        assert!((est.estimate_text("one\ntwo\nthree") - expected).abs() < 1e-3);
    }

    #[test]
    fn test_blank_run_costs_one_gap() {
        let style = style();
        let est = HeightEstimator::new(&style).unwrap();
        let single = est.estimate_text("one\n\ntwo");
        let triple = est.estimate_text("one\n\n\n\ntwo");
        assert!((single - triple).abs() < 1e-3);
        let expected = style.block_padding_px + 2.0 * line_px(&style) + style.paragraph_gap_px;
        assert!((single - expected).abs() < 1e-3);
    }

    #[test]
    fn test_heading_is_taller_than_text() {
        let style = style();
        let est = HeightEstimator::new(&style).unwrap();
        assert!(est.estimate_text("# Title") > est.estimate_text("Title"));
    }

    #[test]
    fn test_list_indent_wraps_sooner() {
        let style = style();
        let est = HeightEstimator::new(&style).unwrap();
        // Fits exactly as text, but the marker indent pushes it onto a second line.
        let body = "a".repeat(style.chars_per_line(1.0) as usize);
        let as_item = format!("- {body}");
        assert!(est.estimate_text(&as_item) > est.estimate_text(&body));
    }

    #[test]
    fn test_markup_is_not_counted() {
        let style = style();
        let est = HeightEstimator::new(&style).unwrap();
        let plain = "a".repeat(56);
        let marked = format!("**{plain}**");
        assert!((est.estimate_text(&plain) - est.estimate_text(&marked)).abs() < 1e-3);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let style = style();
        let est = HeightEstimator::new(&style).unwrap();
        let text = "## 效率工具\n- 🚀 Notion\n- Obsidian\n\n> 收藏起来";
        assert_eq!(est.estimate_text(text), est.estimate_text(text));
    }

    #[test]
    fn test_wrapped_lines_minimum_one() {
        assert_eq!(wrapped_lines(0, 10), 1);
        assert_eq!(wrapped_lines(10, 10), 1);
        assert_eq!(wrapped_lines(11, 10), 2);
    }
}
