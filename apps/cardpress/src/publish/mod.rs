// Publishing: hands the approved card images to an outside destination.

pub mod command;
pub mod s3;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use command::CommandPublisher;
pub use s3::S3Publisher;

pub const DEFAULT_TITLE: &str = "小红书笔记";
pub const DEFAULT_DESCRIPTION: &str = "AI生成的小红书笔记，欢迎点赞收藏！";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Which publisher handled the post (`s3`, `command`).
    pub publisher: String,
    /// Where the post can be found: object prefix, command output, ...
    pub location: String,
    pub title: String,
    pub image_count: usize,
    pub published_at: DateTime<Utc>,
}

/// What will be posted once the operator approves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishDraft {
    /// Destination as reported by the publisher.
    pub target: String,
    pub title: String,
    pub description: String,
    pub images: Vec<PathBuf>,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("image not found: {0}")]
    MissingImage(PathBuf),

    #[error("nothing to publish")]
    NoImages,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("publish command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("manifest encoding error: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl PublishError {
    pub fn is_transient(&self) -> bool {
        match self {
            PublishError::MissingImage(_) | PublishError::NoImages | PublishError::Manifest(_) => {
                false
            }
            PublishError::Io(e) => e.kind() != std::io::ErrorKind::NotFound,
            PublishError::Storage(_) | PublishError::CommandFailed { .. } => true,
        }
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Where posts go, shown to the operator before anything is sent.
    fn target(&self) -> String;

    async fn publish(
        &self,
        images: &[PathBuf],
        title: &str,
        description: &str,
    ) -> Result<PublishReceipt, PublishError>;
}

/// Every image must exist before anything is sent.
pub(crate) fn ensure_images_exist(images: &[PathBuf]) -> Result<(), PublishError> {
    if images.is_empty() {
        return Err(PublishError::NoImages);
    }
    match images.iter().find(|p| !p.is_file()) {
        Some(missing) => Err(PublishError::MissingImage(missing.clone())),
        None => Ok(()),
    }
}
