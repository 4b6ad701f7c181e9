//! Stage vocabulary shared by the controller, checkpoints and producers.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::publish::{PublishDraft, PublishReceipt};
use crate::render::CardSet;

// ────────────────────────────────────────────────────────────────────────────
// Stages and artifacts
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    CopyOptimize,
    Render,
    Enhance,
    Publish,
}

impl StageKind {
    /// Fixed execution order.
    pub const ALL: [StageKind; 4] = [
        StageKind::CopyOptimize,
        StageKind::Render,
        StageKind::Enhance,
        StageKind::Publish,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StageKind::CopyOptimize => "copy_optimize",
            StageKind::Render => "render",
            StageKind::Enhance => "enhance",
            StageKind::Publish => "publish",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Markdown source, either read from disk or produced by copy optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub path: Option<PathBuf>,
    pub text: String,
}

/// What flows between stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    Document(Document),
    Cards(CardSet),
    /// Post prepared for review; nothing has been sent yet.
    PublishDraft(PublishDraft),
    Published(PublishReceipt),
}

impl Artifact {
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::Document(_) => "document",
            Artifact::Cards(_) => "cards",
            Artifact::PublishDraft(_) => "publish_draft",
            Artifact::Published(_) => "published",
        }
    }

    /// One-line description for logs and prompts.
    pub fn summary(&self) -> String {
        match self {
            Artifact::Document(doc) => match &doc.path {
                Some(path) => format!("document {} ({} chars)", path.display(), doc.text.chars().count()),
                None => format!("document ({} chars)", doc.text.chars().count()),
            },
            Artifact::Cards(cards) => format!("{} card image(s)", cards.images.len()),
            Artifact::PublishDraft(draft) => format!(
                "ready to publish {} image(s) to {} as \"{}\"",
                draft.images.len(),
                draft.target,
                draft.title
            ),
            Artifact::Published(receipt) => format!(
                "published {} image(s) via {} at {}",
                receipt.image_count, receipt.publisher, receipt.location
            ),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Producer contract
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StageError {
    /// Network trouble, rate limits, failed remote jobs. The operator may retry.
    #[error("{0}")]
    Transient(String),

    /// Missing input, wrong artifact type, bad credentials. Retrying cannot help.
    #[error("{0}")]
    Permanent(String),
}

impl StageError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StageError::Transient(_))
    }
}

#[derive(Debug, Clone)]
pub struct StageOutput {
    pub artifact: Artifact,
    pub warnings: Vec<String>,
}

impl StageOutput {
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Produces one stage's artifact from the last approved one.
///
/// Called again from scratch on retry with the same input, so implementations must not
/// depend on state left behind by an earlier attempt.
#[async_trait]
pub trait StageProducer: Send + Sync {
    async fn produce(&self, input: &Artifact) -> Result<StageOutput, StageError>;

    /// Runs once the operator approves `approved`; the returned artifact is what the next
    /// stage sees. Side effects that cannot be undone belong here, not in `produce`.
    async fn commit(&self, approved: Artifact) -> Result<Artifact, StageError> {
        Ok(approved)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Attempt records
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: StageKind,
    /// 1-based attempt number within the stage.
    pub attempt: u32,
    pub input: Artifact,
    pub output: Artifact,
    pub warnings: Vec<String>,
    pub produced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: StageKind,
    pub attempt: u32,
    pub error: String,
    pub recoverable: bool,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    /// Operator rejected a produced artifact.
    Rejected { stage: StageKind, attempt: u32 },
    /// Operator chose not to retry a recoverable failure.
    FailureAbandoned { stage: StageKind, error: String },
    /// Non-recoverable producer error.
    Failed { stage: StageKind, error: String },
}

impl AbortReason {
    pub fn stage(&self) -> StageKind {
        match self {
            AbortReason::Rejected { stage, .. }
            | AbortReason::FailureAbandoned { stage, .. }
            | AbortReason::Failed { stage, .. } => *stage,
        }
    }

    /// True when the run stopped because something broke, not because of a rejection.
    pub fn is_failure(&self) -> bool {
        !matches!(self, AbortReason::Rejected { .. })
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Rejected { stage, attempt } => {
                write!(f, "{stage} attempt {attempt} rejected by operator")
            }
            AbortReason::FailureAbandoned { stage, error } => {
                write!(f, "{stage} failed and operator aborted: {error}")
            }
            AbortReason::Failed { stage, error } => write!(f, "{stage} failed: {error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    /// The artifact became `current_artifact`.
    Approved(Artifact),
    Retried,
    Aborted(AbortReason),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttemptReport {
    Produced(StageResult),
    Failed(StageFailure),
}

impl AttemptReport {
    pub fn stage(&self) -> StageKind {
        match self {
            AttemptReport::Produced(r) => r.stage,
            AttemptReport::Failed(f) => f.stage,
        }
    }
}

/// One attempt and what the operator (or controller) made of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub report: AttemptReport,
    pub outcome: StageOutcome,
}

// ────────────────────────────────────────────────────────────────────────────
// Run state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    Running { stage: StageKind },
    Completed,
    Aborted(AbortReason),
}

/// Single-run record. Only the controller mutates it; `history` only grows.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    run_id: Uuid,
    status: RunStatus,
    current_stage_index: usize,
    current_artifact: Artifact,
    history: Vec<HistoryEntry>,
}

impl PipelineState {
    pub fn new(input: Artifact) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::NotStarted,
            current_stage_index: 0,
            current_artifact: input,
            history: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn current_stage_index(&self) -> usize {
        self.current_stage_index
    }

    /// Output of the last approved stage, or the initial input.
    pub fn current_artifact(&self) -> &Artifact {
        &self.current_artifact
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match &self.status {
            RunStatus::Aborted(reason) => Some(reason),
            _ => None,
        }
    }

    /// Approved results in stage order.
    pub fn approved_chain(&self) -> Vec<&StageResult> {
        self.history
            .iter()
            .filter_map(|entry| match (&entry.report, &entry.outcome) {
                (AttemptReport::Produced(result), StageOutcome::Approved(_)) => Some(result),
                _ => None,
            })
            .collect()
    }

    /// What each approved stage handed on, after its commit step.
    pub fn approved_artifacts(&self) -> Vec<(StageKind, &Artifact)> {
        self.history
            .iter()
            .filter_map(|entry| match &entry.outcome {
                StageOutcome::Approved(artifact) => Some((entry.report.stage(), artifact)),
                _ => None,
            })
            .collect()
    }

    /// Attempts made for `stage`, failures included.
    pub fn attempts_for(&self, stage: StageKind) -> usize {
        self.history.iter().filter(|e| e.report.stage() == stage).count()
    }

    pub(super) fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }

    pub(super) fn set_stage_index(&mut self, index: usize) {
        self.current_stage_index = index;
    }

    pub(super) fn record(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    pub(super) fn approve(&mut self, artifact: Artifact) {
        self.current_artifact = artifact;
    }
}
