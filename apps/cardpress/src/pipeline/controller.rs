//! Runs the enabled stages in order, each behind a checkpoint.
//!
//! ```text
//! NotStarted → CopyOptimize → Render → Enhance → Publish → Completed
//!                  │            │         │          │
//!                  └────────────┴─────────┴──────────┴──→ Aborted
//! ```
//!
//! Per stage: produce from `current_artifact`, present the result, then
//! - approve: the producer commits the output, which becomes `current_artifact`
//! - retry: produce again from the same `current_artifact`
//! - reject: stop, `current_artifact` stays at the last approval
//!
//! A recoverable producer or commit error is presented as a failure with retry/abort; a
//! permanent one aborts without asking.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::pipeline::checkpoint::{Checkpoint, Decision, FailureDecision};
use crate::pipeline::stage::{
    AbortReason, Artifact, AttemptReport, HistoryEntry, PipelineState, RunStatus, StageError,
    StageFailure, StageKind, StageOutcome, StageProducer, StageResult,
};

/// Which stages run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagePlan {
    enabled: BTreeSet<StageKind>,
}

impl StagePlan {
    pub fn new(stages: impl IntoIterator<Item = StageKind>) -> Self {
        Self {
            enabled: stages.into_iter().collect(),
        }
    }

    pub fn with(mut self, stage: StageKind, enabled: bool) -> Self {
        if enabled {
            self.enabled.insert(stage);
        } else {
            self.enabled.remove(&stage);
        }
        self
    }

    pub fn is_enabled(&self, stage: StageKind) -> bool {
        self.enabled.contains(&stage)
    }

    /// Enabled stages in execution order.
    pub fn stages(&self) -> Vec<StageKind> {
        StageKind::ALL
            .into_iter()
            .filter(|s| self.enabled.contains(s))
            .collect()
    }
}

pub struct PipelineController {
    plan: StagePlan,
    producers: HashMap<StageKind, Arc<dyn StageProducer>>,
    checkpoint: Arc<dyn Checkpoint>,
}

impl PipelineController {
    pub fn new(plan: StagePlan, checkpoint: Arc<dyn Checkpoint>) -> Self {
        Self {
            plan,
            producers: HashMap::new(),
            checkpoint,
        }
    }

    pub fn with_producer(mut self, stage: StageKind, producer: Arc<dyn StageProducer>) -> Self {
        self.producers.insert(stage, producer);
        self
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    /// Drives one run to `Completed` or `Aborted`. Never panics on producer errors;
    /// the outcome is in the returned state.
    pub async fn run(&self, input: Artifact) -> PipelineState {
        let mut state = PipelineState::new(input);
        let stages = self.plan.stages();
        info!(
            run_id = %state.run_id(),
            stages = ?stages,
            input = %state.current_artifact().summary(),
            "Pipeline started"
        );

        for (index, stage) in StageKind::ALL.into_iter().enumerate() {
            state.set_stage_index(index);
            if !self.plan.is_enabled(stage) {
                debug!(%stage, "Stage disabled, passing artifact through");
                continue;
            }

            state.set_status(RunStatus::Running { stage });
            info!(run_id = %state.run_id(), %stage, "Stage started");

            if let Err(reason) = self.run_stage(stage, &mut state).await {
                warn!(run_id = %state.run_id(), %stage, %reason, "Pipeline aborted");
                state.set_status(RunStatus::Aborted(reason));
                return state;
            }
            info!(run_id = %state.run_id(), %stage, "Stage approved");
        }

        state.set_stage_index(StageKind::ALL.len());
        state.set_status(RunStatus::Completed);
        info!(
            run_id = %state.run_id(),
            approved = state.approved_chain().len(),
            result = %state.current_artifact().summary(),
            "Pipeline completed"
        );
        state
    }

    async fn run_stage(&self, stage: StageKind, state: &mut PipelineState) -> Result<(), AbortReason> {
        let Some(producer) = self.producers.get(&stage).cloned() else {
            error!(%stage, "No producer registered for enabled stage");
            return Err(AbortReason::Failed {
                stage,
                error: "no producer registered for this stage".to_string(),
            });
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let input = state.current_artifact().clone();
            debug!(%stage, attempt, input = %input.summary(), "Producing");

            let output = match producer.produce(&input).await {
                Ok(output) => output,
                Err(err) => {
                    self.settle_failure(stage, attempt, err, state).await?;
                    continue;
                }
            };

            let result = StageResult {
                stage,
                attempt,
                input,
                output: output.artifact,
                warnings: output.warnings,
                produced_at: Utc::now(),
            };
            for warning in &result.warnings {
                warn!(%stage, attempt, "{warning}");
            }

            let decision = self.checkpoint.present(&result).await;
            info!(%stage, attempt, ?decision, "Checkpoint decision");

            match decision {
                Decision::Approve => match producer.commit(result.output.clone()).await {
                    Ok(committed) => {
                        state.record(HistoryEntry {
                            report: AttemptReport::Produced(result),
                            outcome: StageOutcome::Approved(committed.clone()),
                        });
                        state.approve(committed);
                        return Ok(());
                    }
                    Err(err) => {
                        warn!(%stage, attempt, error = %err, "Approved output could not be committed");
                        self.settle_failure(stage, attempt, err, state).await?;
                    }
                },
                Decision::Retry => {
                    state.record(HistoryEntry {
                        report: AttemptReport::Produced(result),
                        outcome: StageOutcome::Retried,
                    });
                }
                Decision::Reject => {
                    let reason = AbortReason::Rejected { stage, attempt };
                    state.record(HistoryEntry {
                        report: AttemptReport::Produced(result),
                        outcome: StageOutcome::Aborted(reason.clone()),
                    });
                    return Err(reason);
                }
            }
        }
    }

    /// Records a failed attempt. `Ok` means the operator asked for another attempt.
    async fn settle_failure(
        &self,
        stage: StageKind,
        attempt: u32,
        err: StageError,
        state: &mut PipelineState,
    ) -> Result<(), AbortReason> {
        let failure = StageFailure {
            stage,
            attempt,
            error: err.to_string(),
            recoverable: err.is_recoverable(),
            failed_at: Utc::now(),
        };

        if !failure.recoverable {
            error!(%stage, attempt, error = %failure.error, "Stage failed permanently");
            let reason = AbortReason::Failed {
                stage,
                error: failure.error.clone(),
            };
            state.record(HistoryEntry {
                report: AttemptReport::Failed(failure),
                outcome: StageOutcome::Aborted(reason.clone()),
            });
            return Err(reason);
        }

        warn!(%stage, attempt, error = %failure.error, "Stage failed, asking operator");
        match self.checkpoint.present_failure(&failure).await {
            FailureDecision::Retry => {
                state.record(HistoryEntry {
                    report: AttemptReport::Failed(failure),
                    outcome: StageOutcome::Retried,
                });
                Ok(())
            }
            FailureDecision::Abort => {
                let reason = AbortReason::FailureAbandoned {
                    stage,
                    error: failure.error.clone(),
                };
                state.record(HistoryEntry {
                    report: AttemptReport::Failed(failure),
                    outcome: StageOutcome::Aborted(reason.clone()),
                });
                Err(reason)
            }
        }
    }
}
