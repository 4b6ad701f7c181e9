//! Checkpoint answered over HTTP.
//!
//! The controller parks one pending review in the [`ReviewHub`] and waits on a oneshot
//! channel; the review API reads it and submits the operator's decision.

pub mod handlers;

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::pipeline::checkpoint::{Checkpoint, Decision, FailureDecision};
use crate::pipeline::console::describe_result;
use crate::pipeline::stage::{StageFailure, StageResult};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReviewSubject {
    Result(StageResult),
    Failure(StageFailure),
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingReview {
    pub review_id: Uuid,
    pub summary: String,
    /// Decisions the endpoint accepts for this review.
    pub allowed: Vec<Decision>,
    pub subject: ReviewSubject,
    pub opened_at: DateTime<Utc>,
}

impl PendingReview {
    fn new(subject: ReviewSubject) -> Self {
        let (summary, allowed) = match &subject {
            ReviewSubject::Result(result) => (
                describe_result(result),
                vec![Decision::Approve, Decision::Reject, Decision::Retry],
            ),
            ReviewSubject::Failure(failure) => (
                format!(
                    "{} failed on attempt {}: {}",
                    failure.stage, failure.attempt, failure.error
                ),
                vec![Decision::Retry, Decision::Reject],
            ),
        };
        Self {
            review_id: Uuid::new_v4(),
            summary,
            allowed,
            subject,
            opened_at: Utc::now(),
        }
    }
}

struct Slot {
    review: PendingReview,
    reply: oneshot::Sender<Decision>,
}

/// Holds at most one pending review. Clones share the same slot.
#[derive(Clone, Default)]
pub struct ReviewHub {
    slot: Arc<Mutex<Option<Slot>>>,
}

impl ReviewHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Slot>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Parks a review and returns the channel its decision arrives on.
    pub fn open(&self, subject: ReviewSubject) -> oneshot::Receiver<Decision> {
        let (reply, rx) = oneshot::channel();
        let review = PendingReview::new(subject);
        info!(review_id = %review.review_id, "Review pending at GET /api/v1/review");
        if self.lock().replace(Slot { review, reply }).is_some() {
            warn!("Replaced an unanswered review");
        }
        rx
    }

    pub fn pending(&self) -> Option<PendingReview> {
        self.lock().as_ref().map(|slot| slot.review.clone())
    }

    /// Answers the pending review. `review_id` must name the review currently pending, so
    /// an answer meant for an earlier review never lands on a newer one.
    pub fn submit(&self, review_id: Uuid, decision: Decision) -> Result<PendingReview, AppError> {
        let mut guard = self.lock();
        let (current, allowed) = match guard.as_ref() {
            Some(slot) => (slot.review.review_id, slot.review.allowed.contains(&decision)),
            None => return Err(AppError::NotFound("No review is pending".to_string())),
        };
        if current != review_id {
            return Err(AppError::Conflict(format!(
                "review {review_id} is no longer pending; the pending review is {current}"
            )));
        }
        if !allowed {
            return Err(AppError::UnprocessableEntity(format!(
                "'{decision:?}' is not a valid answer to a stage failure; use retry or reject"
            )));
        }
        let slot = guard
            .take()
            .ok_or_else(|| AppError::NotFound("No review is pending".to_string()))?;
        drop(guard);

        slot.reply
            .send(decision)
            .map_err(|_| anyhow::anyhow!("pipeline stopped waiting for review {}", slot.review.review_id))?;
        info!(review_id = %slot.review.review_id, ?decision, "Review answered");
        Ok(slot.review)
    }
}

pub struct HttpCheckpoint {
    hub: ReviewHub,
}

impl HttpCheckpoint {
    pub fn new(hub: ReviewHub) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl Checkpoint for HttpCheckpoint {
    async fn present(&self, result: &StageResult) -> Decision {
        let rx = self.hub.open(ReviewSubject::Result(result.clone()));
        rx.await.unwrap_or_else(|_| {
            warn!(stage = %result.stage, "Review channel closed, treating as reject");
            Decision::Reject
        })
    }

    async fn present_failure(&self, failure: &StageFailure) -> FailureDecision {
        let rx = self.hub.open(ReviewSubject::Failure(failure.clone()));
        match rx.await {
            Ok(Decision::Retry) => FailureDecision::Retry,
            Ok(_) => FailureDecision::Abort,
            Err(_) => {
                warn!(stage = %failure.stage, "Review channel closed, aborting");
                FailureDecision::Abort
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::pipeline::stage::{Artifact, Document, StageKind};

    pub(crate) fn sample_result() -> StageResult {
        let doc = Artifact::Document(Document {
            path: Some(PathBuf::from("post.md")),
            text: "hello".into(),
        });
        StageResult {
            stage: StageKind::CopyOptimize,
            attempt: 1,
            input: doc.clone(),
            output: doc,
            warnings: vec![],
            produced_at: Utc::now(),
        }
    }

    pub(crate) fn sample_failure() -> StageFailure {
        StageFailure {
            stage: StageKind::Enhance,
            attempt: 2,
            error: "prediction p1 still running after 150 polls".into(),
            recoverable: true,
            failed_at: Utc::now(),
        }
    }

    /// Waits until the checkpoint task has parked its review.
    pub(crate) async fn wait_for_pending(hub: &ReviewHub) -> PendingReview {
        for _ in 0..200 {
            if let Some(review) = hub.pending() {
                return review;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no review became pending");
    }

    #[test]
    fn test_submit_without_pending_is_not_found() {
        let hub = ReviewHub::new();
        assert!(matches!(
            hub.submit(Uuid::new_v4(), Decision::Approve),
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_decision_reaches_checkpoint() {
        let hub = ReviewHub::new();
        let checkpoint = Arc::new(HttpCheckpoint::new(hub.clone()));
        let task = {
            let checkpoint = Arc::clone(&checkpoint);
            tokio::spawn(async move { checkpoint.present(&sample_result()).await })
        };

        let review = wait_for_pending(&hub).await;
        assert!(review.summary.contains("copy_optimize"));
        let answered = hub.submit(review.review_id, Decision::Retry).unwrap();
        assert_eq!(answered.review_id, review.review_id);

        assert_eq!(task.await.unwrap(), Decision::Retry);
        assert!(hub.pending().is_none());
    }

    #[tokio::test]
    async fn test_failure_review_refuses_approve() {
        let hub = ReviewHub::new();
        let checkpoint = Arc::new(HttpCheckpoint::new(hub.clone()));
        let task = {
            let checkpoint = Arc::clone(&checkpoint);
            tokio::spawn(async move { checkpoint.present_failure(&sample_failure()).await })
        };

        let review = wait_for_pending(&hub).await;
        assert!(matches!(
            hub.submit(review.review_id, Decision::Approve),
            Err(AppError::UnprocessableEntity(_))
        ));
        // Still pending after the refused answer.
        assert!(hub.pending().is_some());

        hub.submit(review.review_id, Decision::Reject).unwrap();
        assert_eq!(task.await.unwrap(), FailureDecision::Abort);
    }

    #[tokio::test]
    async fn test_dropped_reply_reads_as_reject() {
        let hub = ReviewHub::new();
        let checkpoint = HttpCheckpoint::new(hub.clone());
        let sample = sample_result();
        let present = checkpoint.present(&sample);
        let clear = async {
            wait_for_pending(&hub).await;
            hub.lock().take();
        };
        let (decision, _) = tokio::join!(present, clear);
        assert_eq!(decision, Decision::Reject);
    }

    #[tokio::test]
    async fn test_stale_review_id_does_not_answer_newer_review() {
        let hub = ReviewHub::new();
        let _first = hub.open(ReviewSubject::Result(sample_result()));
        let stale = wait_for_pending(&hub).await.review_id;
        let mut second = hub.open(ReviewSubject::Result(sample_result()));
        let current = wait_for_pending(&hub).await.review_id;
        assert_ne!(stale, current);

        assert!(matches!(
            hub.submit(stale, Decision::Approve),
            Err(AppError::Conflict(_))
        ));
        assert_eq!(hub.pending().map(|r| r.review_id), Some(current));
        assert!(second.try_recv().is_err());

        hub.submit(current, Decision::Reject).unwrap();
        assert_eq!(second.await.unwrap(), Decision::Reject);
    }
}
