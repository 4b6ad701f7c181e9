//! Page fill analysis: how well a paginated card uses its safe height.
//!
//! Shown to the operator at the render checkpoint so sparse or overflowing cards are
//! visible before approval.
//!
//! # Rules
//! - Fill > 100%      → Overflow (only possible for a single oversized block)
//! - Whitespace > 50% → Sparse
//! - otherwise        → Acceptable

use serde::{Deserialize, Serialize};

const SPARSE_WHITESPACE: f32 = 0.50;

/// Overall page fill verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFillVerdict {
    Acceptable,
    /// More than half of the safe height is empty.
    Sparse,
    /// Content is taller than the safe height.
    Overflow,
}

/// Fill analysis for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFillAnalysis {
    pub fill_ratio: f32,
    pub whitespace_fraction: f32,
    pub overflow_fraction: f32,
    pub verdict: PageFillVerdict,
}

/// Analyzes the fill of a page whose blocks sum to `used_height`.
pub fn analyze_page_fill(used_height: f32, safe_height: f32) -> PageFillAnalysis {
    let fill_ratio = if safe_height > 0.0 {
        used_height / safe_height
    } else {
        0.0
    };

    let whitespace_fraction = (1.0_f32 - fill_ratio).max(0.0);
    let overflow_fraction = (fill_ratio - 1.0_f32).max(0.0);

    let verdict = if fill_ratio > 1.0 {
        PageFillVerdict::Overflow
    } else if whitespace_fraction > SPARSE_WHITESPACE {
        PageFillVerdict::Sparse
    } else {
        PageFillVerdict::Acceptable
    };

    PageFillAnalysis {
        fill_ratio,
        whitespace_fraction,
        overflow_fraction,
        verdict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceptable_fill() {
        let analysis = analyze_page_fill(900.0, 1100.0);
        assert_eq!(analysis.verdict, PageFillVerdict::Acceptable);
        assert!(analysis.overflow_fraction == 0.0);
    }

    #[test]
    fn test_exactly_full_is_acceptable() {
        let analysis = analyze_page_fill(1100.0, 1100.0);
        assert_eq!(analysis.verdict, PageFillVerdict::Acceptable);
        assert!(analysis.whitespace_fraction.abs() < 1e-6);
    }

    #[test]
    fn test_sparse_fill() {
        let analysis = analyze_page_fill(200.0, 1100.0);
        assert_eq!(analysis.verdict, PageFillVerdict::Sparse);
        assert!(analysis.whitespace_fraction > 0.8);
    }

    #[test]
    fn test_overflow_fill() {
        let analysis = analyze_page_fill(1500.0, 1100.0);
        assert_eq!(analysis.verdict, PageFillVerdict::Overflow);
        assert!((analysis.overflow_fraction - 400.0 / 1100.0).abs() < 1e-4);
    }
}
