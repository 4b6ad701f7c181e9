pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::review::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/review", get(handlers::handle_get_review))
        .route(
            "/api/v1/review/decision",
            post(handlers::handle_submit_decision),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::pipeline::checkpoint::{Checkpoint, Decision, FailureDecision};
    use crate::review::tests::{sample_failure, sample_result, wait_for_pending};
    use crate::review::{HttpCheckpoint, ReviewHub};

    fn app(hub: &ReviewHub) -> Router {
        build_router(AppState {
            review: hub.clone(),
        })
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn decision_request(review_id: Uuid, decision: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/review/decision")
            .header("content-type", "application/json")
            .body(Body::from(format!(
                r#"{{"review_id":"{review_id}","decision":"{decision}"}}"#
            )))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(&ReviewHub::new())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["service"], "cardpress");
    }

    #[tokio::test]
    async fn test_no_pending_review_is_404() {
        let response = app(&ReviewHub::new())
            .oneshot(Request::get("/api/v1/review").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_review_round_trip_over_http() {
        let hub = ReviewHub::new();
        let checkpoint = Arc::new(HttpCheckpoint::new(hub.clone()));
        let task = {
            let checkpoint = Arc::clone(&checkpoint);
            tokio::spawn(async move { checkpoint.present(&sample_result()).await })
        };
        wait_for_pending(&hub).await;

        let response = app(&hub)
            .oneshot(Request::get("/api/v1/review").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let pending = json_body(response).await;
        assert_eq!(pending["subject"]["type"], "result");
        assert_eq!(pending["subject"]["stage"], "copy_optimize");
        let review_id: Uuid = pending["review_id"].as_str().unwrap().parse().unwrap();

        let response = app(&hub)
            .oneshot(decision_request(review_id, "approve"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["decision"], "approve");

        assert_eq!(task.await.unwrap(), Decision::Approve);
    }

    #[tokio::test]
    async fn test_approve_on_failure_is_422() {
        let hub = ReviewHub::new();
        let checkpoint = Arc::new(HttpCheckpoint::new(hub.clone()));
        let task = {
            let checkpoint = Arc::clone(&checkpoint);
            tokio::spawn(async move { checkpoint.present_failure(&sample_failure()).await })
        };
        let review_id = wait_for_pending(&hub).await.review_id;

        let response = app(&hub)
            .oneshot(decision_request(review_id, "approve"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app(&hub)
            .oneshot(decision_request(review_id, "retry"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(task.await.unwrap(), FailureDecision::Retry);
    }

    #[tokio::test]
    async fn test_unknown_decision_is_rejected() {
        let response = app(&ReviewHub::new())
            .oneshot(decision_request(Uuid::new_v4(), "maybe"))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_stale_review_id_is_409_and_newer_review_stays_pending() {
        let hub = ReviewHub::new();
        let checkpoint = Arc::new(HttpCheckpoint::new(hub.clone()));
        let first = {
            let checkpoint = Arc::clone(&checkpoint);
            tokio::spawn(async move { checkpoint.present(&sample_result()).await })
        };
        let stale = wait_for_pending(&hub).await.review_id;
        hub.submit(stale, Decision::Retry).unwrap();
        assert_eq!(first.await.unwrap(), Decision::Retry);

        let second = {
            let checkpoint = Arc::clone(&checkpoint);
            tokio::spawn(async move { checkpoint.present(&sample_result()).await })
        };
        let current = wait_for_pending(&hub).await.review_id;

        // A duplicate of the earlier answer arrives late, carrying the old id.
        let response = app(&hub)
            .oneshot(decision_request(stale, "approve"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["error"]["code"], "CONFLICT");
        assert_eq!(hub.pending().map(|r| r.review_id), Some(current));

        let response = app(&hub)
            .oneshot(decision_request(current, "reject"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(second.await.unwrap(), Decision::Reject);
    }

    #[tokio::test]
    async fn test_missing_review_id_is_rejected() {
        let response = app(&ReviewHub::new())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/review/decision")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"decision":"approve"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
