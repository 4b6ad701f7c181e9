//! Headless Chromium renderer: writes card HTML to a temp dir and screenshots it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::layout::{Page, StyleProfile};
use crate::render::html::{card_html, cover_html};
use crate::render::themes::{Theme, ThemeCatalog};
use crate::render::{CardKind, ImageArtifact, RenderError, Renderer};

#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    binary: String,
    output_dir: PathBuf,
    style: Arc<StyleProfile>,
    themes: Arc<ThemeCatalog>,
}

impl ChromiumRenderer {
    pub fn new(
        binary: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        style: Arc<StyleProfile>,
        themes: Arc<ThemeCatalog>,
    ) -> Self {
        Self {
            binary: binary.into(),
            output_dir: output_dir.into(),
            style,
            themes,
        }
    }

    fn theme(&self, style_id: &str) -> Result<&Theme, RenderError> {
        self.themes
            .get(style_id)
            .ok_or_else(|| RenderError::UnknownStyle(style_id.to_string()))
    }

    async fn screenshot(&self, html: String, file_name: &str, kind: CardKind) -> Result<ImageArtifact, RenderError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let workdir = tempfile::tempdir()?;
        let html_path = workdir.path().join("card.html");
        tokio::fs::write(&html_path, html).await?;

        let out_path = self.output_dir.join(file_name);
        // A stale image from an earlier attempt must not pass the existence check.
        if tokio::fs::try_exists(&out_path).await? {
            tokio::fs::remove_file(&out_path).await?;
        }

        let width = self.style.card_width_px.round() as u32;
        let height = self.style.card_height_px.round() as u32;
        let args = screenshot_args(width, height, &out_path, &html_path);
        debug!(binary = %self.binary, out = %out_path.display(), "Rendering card");

        let output = Command::new(&self.binary).args(&args).output().await?;
        if !output.status.success() {
            return Err(RenderError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !tokio::fs::try_exists(&out_path).await? {
            return Err(RenderError::MissingOutput(out_path));
        }

        Ok(ImageArtifact {
            path: out_path,
            width,
            height,
            kind,
        })
    }
}

pub(crate) fn screenshot_args(width: u32, height: u32, out: &Path, html: &Path) -> Vec<String> {
    vec![
        "--headless".to_string(),
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        "--hide-scrollbars".to_string(),
        "--force-device-scale-factor=1".to_string(),
        format!("--window-size={width},{height}"),
        format!("--screenshot={}", out.display()),
        format!("file://{}", html.display()),
    ]
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render_cover(
        &self,
        metadata: &BTreeMap<String, String>,
        style_id: &str,
    ) -> Result<ImageArtifact, RenderError> {
        let html = cover_html(metadata, &self.style, self.theme(style_id)?);
        self.screenshot(html, "cover.png", CardKind::Cover).await
    }

    async fn render_page(
        &self,
        page: &Page,
        page_count: usize,
        style_id: &str,
    ) -> Result<ImageArtifact, RenderError> {
        let html = card_html(page, page_count, &self.style, self.theme(style_id)?);
        let index = page.index + 1;
        self.screenshot(
            html,
            &format!("card_{index}.png"),
            CardKind::Body {
                index,
                total: page_count,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ContentBlock;
    use crate::layout::page_fill::analyze_page_fill;

    fn renderer(binary: &str, dir: &Path) -> ChromiumRenderer {
        ChromiumRenderer::new(
            binary,
            dir,
            Arc::new(StyleProfile::default()),
            Arc::new(ThemeCatalog::builtin()),
        )
    }

    fn page() -> Page {
        Page {
            index: 0,
            blocks: vec![ContentBlock::new(0, "hello")],
            estimated_height: 80.0,
            fill: analyze_page_fill(80.0, 1100.0),
        }
    }

    #[test]
    fn test_screenshot_args() {
        let args = screenshot_args(1080, 1440, Path::new("/out/card_1.png"), Path::new("/tmp/c.html"));
        assert!(args.contains(&"--window-size=1080,1440".to_string()));
        assert!(args.contains(&"--screenshot=/out/card_1.png".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("file:///tmp/c.html"));
    }

    #[tokio::test]
    async fn test_unknown_style_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let err = renderer("chromium", dir.path())
            .render_page(&page(), 1, "neon")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::UnknownStyle(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_binary_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let err = renderer("/nonexistent/chromium-binary", dir.path())
            .render_page(&page(), 1, "purple")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Io(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_command_without_output_is_missing_output() {
        // `true` exits 0 but never writes the screenshot.
        let dir = tempfile::tempdir().unwrap();
        let err = renderer("true", dir.path())
            .render_page(&page(), 1, "purple")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingOutput(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_failing_command_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let err = renderer("false", dir.path())
            .render_cover(&BTreeMap::new(), "purple")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::CommandFailed { .. }));
    }
}
