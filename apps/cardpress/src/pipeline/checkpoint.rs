//! Human-in-the-loop gates between stages.
//!
//! A checkpoint suspends the stage until someone answers. There is no timeout and no
//! default answer: `present` returns only when a decision exists.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::pipeline::stage::{StageFailure, StageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
    Retry,
}

/// Answer to a recoverable producer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureDecision {
    Retry,
    Abort,
}

#[async_trait]
pub trait Checkpoint: Send + Sync {
    async fn present(&self, result: &StageResult) -> Decision;

    async fn present_failure(&self, failure: &StageFailure) -> FailureDecision;
}

// ────────────────────────────────────────────────────────────────────────────
// ScriptedCheckpoint
// ────────────────────────────────────────────────────────────────────────────

/// Answers from a fixed list of decisions, in order.
///
/// Failures consume from the same list: `Retry` retries, anything else aborts. Once the
/// list runs out every answer is a rejection.
#[derive(Debug, Default)]
pub struct ScriptedCheckpoint {
    decisions: Mutex<VecDeque<Decision>>,
}

impl ScriptedCheckpoint {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into_iter().collect()),
        }
    }

    /// Decisions not yet consumed.
    pub fn remaining(&self) -> usize {
        self.decisions.lock().map(|d| d.len()).unwrap_or(0)
    }

    fn next(&self) -> Decision {
        let next = match self.decisions.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(_) => None,
        };
        next.unwrap_or_else(|| {
            warn!("Scripted checkpoint exhausted, rejecting");
            Decision::Reject
        })
    }
}

#[async_trait]
impl Checkpoint for ScriptedCheckpoint {
    async fn present(&self, _result: &StageResult) -> Decision {
        self.next()
    }

    async fn present_failure(&self, _failure: &StageFailure) -> FailureDecision {
        match self.next() {
            Decision::Retry => FailureDecision::Retry,
            Decision::Approve | Decision::Reject => FailureDecision::Abort,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FnCheckpoint
// ────────────────────────────────────────────────────────────────────────────

type FailureFn = Box<dyn Fn(&StageFailure) -> FailureDecision + Send + Sync>;

/// Delegates decisions to closures. Failures abort unless `with_failure` says otherwise.
pub struct FnCheckpoint<F> {
    decide: F,
    on_failure: Option<FailureFn>,
}

impl<F> FnCheckpoint<F>
where
    F: Fn(&StageResult) -> Decision + Send + Sync,
{
    pub fn new(decide: F) -> Self {
        Self {
            decide,
            on_failure: None,
        }
    }

    pub fn with_failure<G>(mut self, on_failure: G) -> Self
    where
        G: Fn(&StageFailure) -> FailureDecision + Send + Sync + 'static,
    {
        self.on_failure = Some(Box::new(on_failure));
        self
    }
}

#[async_trait]
impl<F> Checkpoint for FnCheckpoint<F>
where
    F: Fn(&StageResult) -> Decision + Send + Sync,
{
    async fn present(&self, result: &StageResult) -> Decision {
        (self.decide)(result)
    }

    async fn present_failure(&self, failure: &StageFailure) -> FailureDecision {
        match &self.on_failure {
            Some(decide) => decide(failure),
            None => FailureDecision::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::pipeline::stage::{Artifact, Document, StageKind};

    fn result(stage: StageKind) -> StageResult {
        let doc = Artifact::Document(Document {
            path: None,
            text: "x".into(),
        });
        StageResult {
            stage,
            attempt: 1,
            input: doc.clone(),
            output: doc,
            warnings: vec![],
            produced_at: Utc::now(),
        }
    }

    fn failure() -> StageFailure {
        StageFailure {
            stage: StageKind::Enhance,
            attempt: 1,
            error: "503".into(),
            recoverable: true,
            failed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_scripted_checkpoint_answers_in_order() {
        let cp = ScriptedCheckpoint::new([Decision::Retry, Decision::Approve]);
        assert_eq!(cp.present(&result(StageKind::Render)).await, Decision::Retry);
        assert_eq!(cp.present(&result(StageKind::Render)).await, Decision::Approve);
        assert_eq!(cp.remaining(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_script_rejects() {
        let cp = ScriptedCheckpoint::new([]);
        assert_eq!(cp.present(&result(StageKind::Render)).await, Decision::Reject);
        assert_eq!(cp.present_failure(&failure()).await, FailureDecision::Abort);
    }

    #[tokio::test]
    async fn test_scripted_failure_mapping() {
        let cp = ScriptedCheckpoint::new([Decision::Retry, Decision::Approve]);
        assert_eq!(cp.present_failure(&failure()).await, FailureDecision::Retry);
        // Approving a failure is not a retry.
        assert_eq!(cp.present_failure(&failure()).await, FailureDecision::Abort);
    }

    #[tokio::test]
    async fn test_fn_checkpoint_sees_the_result() {
        let cp = FnCheckpoint::new(|r: &StageResult| {
            if r.stage == StageKind::Publish {
                Decision::Reject
            } else {
                Decision::Approve
            }
        });
        assert_eq!(cp.present(&result(StageKind::Render)).await, Decision::Approve);
        assert_eq!(cp.present(&result(StageKind::Publish)).await, Decision::Reject);
        assert_eq!(cp.present_failure(&failure()).await, FailureDecision::Abort);
    }

    #[tokio::test]
    async fn test_fn_checkpoint_failure_closure() {
        let cp = FnCheckpoint::new(|_: &StageResult| Decision::Approve).with_failure(
            |f: &StageFailure| {
                if f.attempt < 3 {
                    FailureDecision::Retry
                } else {
                    FailureDecision::Abort
                }
            },
        );
        assert_eq!(cp.present_failure(&failure()).await, FailureDecision::Retry);

        let third = StageFailure {
            attempt: 3,
            ..failure()
        };
        assert_eq!(cp.present_failure(&third).await, FailureDecision::Abort);
    }

    #[test]
    fn test_decision_wire_format() {
        assert_eq!(serde_json::to_string(&Decision::Retry).unwrap(), "\"retry\"");
        let d: Decision = serde_json::from_str("\"approve\"").unwrap();
        assert_eq!(d, Decision::Approve);
    }
}
