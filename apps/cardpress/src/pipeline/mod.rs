// Staged pipeline: CopyOptimize → Render → Enhance → Publish, each gated by a checkpoint.

pub mod checkpoint;
pub mod console;
pub mod controller;
pub mod producers;
pub mod stage;

pub use checkpoint::Checkpoint;
pub use console::ConsoleCheckpoint;
pub use controller::{PipelineController, StagePlan};
pub use producers::{CopyOptimizeStage, EnhanceStage, PublishStage, RenderStage};
pub use stage::{Artifact, Document, PipelineState, RunStatus, StageKind};
