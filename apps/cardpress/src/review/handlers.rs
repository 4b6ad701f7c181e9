use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::pipeline::checkpoint::Decision;
use crate::review::PendingReview;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DecisionRequest {
    /// The review being answered, as returned by GET /api/v1/review.
    pub review_id: Uuid,
    pub decision: Decision,
}

#[derive(Serialize)]
pub struct DecisionResponse {
    pub review_id: Uuid,
    pub decision: Decision,
}

/// GET /api/v1/review
pub async fn handle_get_review(
    State(state): State<AppState>,
) -> Result<Json<PendingReview>, AppError> {
    state
        .review
        .pending()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No review is pending".to_string()))
}

/// POST /api/v1/review/decision
pub async fn handle_submit_decision(
    State(state): State<AppState>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, AppError> {
    let review = state.review.submit(req.review_id, req.decision)?;
    Ok(Json(DecisionResponse {
        review_id: review.review_id,
        decision: req.decision,
    }))
}
