// Card rendering: one cover card from front matter, then one body card per page.
// The pixel backend sits behind the `Renderer` trait; `ChromiumRenderer` screenshots
// generated HTML with a headless browser.

pub mod chromium;
pub mod html;
pub mod quality;
pub mod themes;

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::Page;

pub use chromium::ChromiumRenderer;
pub use themes::{Theme, ThemeCatalog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardKind {
    Cover,
    /// `index` is 1-based.
    Body { index: usize, total: usize },
}

/// A rendered (or enhanced) card image on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageArtifact {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub kind: CardKind,
}

/// Ordered card images for one document, cover first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardSet {
    pub metadata: BTreeMap<String, String>,
    pub images: Vec<ImageArtifact>,
}

impl CardSet {
    pub fn title(&self) -> Option<&str> {
        self.metadata
            .get("title")
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.images.iter().map(|i| i.path.clone()).collect()
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown style '{0}'")]
    UnknownStyle(String),

    #[error("renderer command failed ({status}): {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("renderer produced no image at {0}")]
    MissingOutput(PathBuf),
}

impl RenderError {
    /// Missing browser binaries and unknown styles will not fix themselves on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            RenderError::Io(e) => e.kind() != std::io::ErrorKind::NotFound,
            RenderError::UnknownStyle(_) => false,
            RenderError::CommandFailed { .. } | RenderError::MissingOutput(_) => true,
        }
    }
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render_cover(
        &self,
        metadata: &BTreeMap<String, String>,
        style_id: &str,
    ) -> Result<ImageArtifact, RenderError>;

    /// Renders `page` as card `page.index + 1` of `page_count`.
    async fn render_page(
        &self,
        page: &Page,
        page_count: usize,
        style_id: &str,
    ) -> Result<ImageArtifact, RenderError>;
}
