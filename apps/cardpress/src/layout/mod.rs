// Card layout: character-width metrics, per-block height estimation and greedy
// pagination against a style profile's safe height.
// Pure and synchronous; callers on the async runtime wrap it in spawn_blocking.

pub mod estimator;
pub mod font_metrics;
pub mod markup;
pub mod page_fill;
pub mod paginator;

use thiserror::Error;

pub use estimator::{HeightEstimator, PixelHeight};
pub use font_metrics::StyleProfile;
pub use paginator::{paginate, OverflowWarning, Page, Pagination};

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("invalid style profile: {field} {reason}")]
    InvalidStyle { field: &'static str, reason: String },
}
