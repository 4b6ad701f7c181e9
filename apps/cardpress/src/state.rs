use crate::review::ReviewHub;

/// Shared state injected into the review API handlers via Axum extractors.
#[derive(Clone, Default)]
pub struct AppState {
    /// The single review slot the pipeline's checkpoint waits on.
    pub review: ReviewHub,
}
