//! Greedy pagination of content blocks into cards.
//!
//! One pass in block order: a block joins the current page while the running height plus
//! its own estimate stays within the safe height, otherwise it opens the next page. A
//! block taller than the safe height gets a page to itself and an overflow warning.
//!
//! Estimation happens for every block before any page is built, so an invalid style
//! profile fails the whole call and never yields a partial page list.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::ContentBlock;
use crate::layout::estimator::{HeightEstimator, PixelHeight};
use crate::layout::font_metrics::StyleProfile;
use crate::layout::page_fill::{analyze_page_fill, PageFillAnalysis};
use crate::layout::LayoutError;

/// One card's worth of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based position among the body cards.
    pub index: usize,
    pub blocks: Vec<ContentBlock>,
    pub estimated_height: PixelHeight,
    pub fill: PageFillAnalysis,
}

/// A singleton block that does not fit the safe height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverflowWarning {
    pub page_index: usize,
    pub block_order: usize,
    pub estimated_height: PixelHeight,
    pub safe_height: PixelHeight,
}

impl fmt::Display for OverflowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block {} on card {} is {:.0}px tall, over the {:.0}px safe height",
            self.block_order,
            self.page_index + 1,
            self.estimated_height,
            self.safe_height
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub pages: Vec<Page>,
    pub safe_height: PixelHeight,
    pub warnings: Vec<OverflowWarning>,
}

/// Splits `blocks` into pages that fit `style`'s safe height.
pub fn paginate(blocks: &[ContentBlock], style: &StyleProfile) -> Result<Pagination, LayoutError> {
    let estimator = HeightEstimator::new(style)?;
    let safe_height = style.safe_height();
    let heights: Vec<PixelHeight> = blocks.iter().map(|b| estimator.estimate(b)).collect();

    let mut pages = Vec::new();
    let mut warnings = Vec::new();

    for (index, range) in pack_greedy(&heights, safe_height).into_iter().enumerate() {
        let estimated_height: PixelHeight = heights[range.clone()].iter().sum();
        if range.len() == 1 && estimated_height > safe_height {
            let warning = OverflowWarning {
                page_index: index,
                block_order: blocks[range.start].order(),
                estimated_height,
                safe_height,
            };
            warn!(
                page = index,
                block = warning.block_order,
                height = estimated_height,
                safe_height,
                "Pagination: block overflows the card on its own page"
            );
            warnings.push(warning);
        }

        pages.push(Page {
            index,
            blocks: blocks[range].to_vec(),
            estimated_height,
            fill: analyze_page_fill(estimated_height, safe_height),
        });
    }

    debug!(
        blocks = blocks.len(),
        pages = pages.len(),
        safe_height,
        "Pagination complete"
    );

    Ok(Pagination {
        pages,
        safe_height,
        warnings,
    })
}

/// Greedy first-fit in order. Returns contiguous, non-empty index ranges covering
/// `0..heights.len()`.
pub(crate) fn pack_greedy(heights: &[PixelHeight], safe_height: PixelHeight) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut running = 0.0_f32;

    for (i, &h) in heights.iter().enumerate() {
        if i > start && running + h > safe_height {
            ranges.push(start..i);
            start = i;
            running = 0.0;
        }
        running += h;
    }
    if start < heights.len() {
        ranges.push(start..heights.len());
    }
    ranges
}
