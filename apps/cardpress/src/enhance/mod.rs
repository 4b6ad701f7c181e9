// AI enhancement of rendered cards through a remote generative-image service.

pub mod prompts;
pub mod replicate;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::ImageArtifact;

pub use prompts::EnhanceThemes;
pub use replicate::ReplicateEnhancer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EnhanceStyle {
    Illustration,
    HandDrawn,
    Geometric,
    Watercolor,
    #[serde(rename = "3d")]
    #[value(name = "3d")]
    ThreeD,
}

impl EnhanceStyle {
    pub fn label(&self) -> &'static str {
        match self {
            EnhanceStyle::Illustration => "illustration",
            EnhanceStyle::HandDrawn => "hand-drawn",
            EnhanceStyle::Geometric => "geometric",
            EnhanceStyle::Watercolor => "watercolor",
            EnhanceStyle::ThreeD => "3d",
        }
    }
}

impl fmt::Display for EnhanceStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EnhanceIntensity {
    Light,
    Medium,
    Heavy,
}

#[derive(Debug, Error)]
pub enum EnhanceError {
    #[error("image not found: {0}")]
    MissingImage(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("prediction {id} failed: {message}")]
    PredictionFailed { id: String, message: String },

    #[error("prediction {id} still running after {polls} polls")]
    Timeout { id: String, polls: u32 },

    #[error("prediction {0} succeeded without an output image")]
    EmptyOutput(String),

    #[error("enhancement worker failed: {0}")]
    Worker(String),
}

impl EnhanceError {
    pub fn is_transient(&self) -> bool {
        match self {
            EnhanceError::MissingImage(_) => false,
            EnhanceError::Io(e) => e.kind() != std::io::ErrorKind::NotFound,
            EnhanceError::Api { status, .. } => *status == 429 || *status >= 500,
            EnhanceError::Http(_)
            | EnhanceError::PredictionFailed { .. }
            | EnhanceError::Timeout { .. }
            | EnhanceError::EmptyOutput(_)
            | EnhanceError::Worker(_) => true,
        }
    }
}

#[async_trait]
pub trait Enhancer: Send + Sync {
    /// Enhances every image; the result is in input order. Fails as a whole if any image
    /// fails.
    async fn enhance(
        &self,
        images: &[ImageArtifact],
        style: EnhanceStyle,
        intensity: EnhanceIntensity,
    ) -> Result<Vec<ImageArtifact>, EnhanceError>;
}
