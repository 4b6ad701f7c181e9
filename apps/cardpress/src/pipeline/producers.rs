//! The four stage producers, each wrapping one external collaborator.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::copy::{build_optimized_document, CopyError, CopyFramework, CopyOptimizer};
use crate::document::{split_front_matter, MarkdownParser};
use crate::enhance::{EnhanceError, EnhanceIntensity, EnhanceStyle, Enhancer};
use crate::layout::page_fill::PageFillVerdict;
use crate::layout::{paginate, LayoutError, StyleProfile};
use crate::pipeline::stage::{Artifact, Document, StageError, StageOutput, StageProducer};
use crate::publish::{
    ensure_images_exist, PublishDraft, PublishError, Publisher, DEFAULT_DESCRIPTION, DEFAULT_TITLE,
};
use crate::render::quality::{check_content_quality, check_image};
use crate::render::{CardSet, ImageArtifact, RenderError, Renderer};

// ────────────────────────────────────────────────────────────────────────────
// Error mapping
// ────────────────────────────────────────────────────────────────────────────

fn classify(transient: bool, message: String) -> StageError {
    if transient {
        StageError::Transient(message)
    } else {
        StageError::Permanent(message)
    }
}

impl From<CopyError> for StageError {
    fn from(e: CopyError) -> Self {
        classify(e.is_transient(), e.to_string())
    }
}

impl From<RenderError> for StageError {
    fn from(e: RenderError) -> Self {
        classify(e.is_transient(), e.to_string())
    }
}

impl From<EnhanceError> for StageError {
    fn from(e: EnhanceError) -> Self {
        classify(e.is_transient(), e.to_string())
    }
}

impl From<PublishError> for StageError {
    fn from(e: PublishError) -> Self {
        classify(e.is_transient(), e.to_string())
    }
}

impl From<LayoutError> for StageError {
    fn from(e: LayoutError) -> Self {
        StageError::Permanent(e.to_string())
    }
}

/// A missing directory or a permission problem will not fix itself on retry.
fn write_error(path: &Path, e: std::io::Error) -> StageError {
    let transient = !matches!(
        e.kind(),
        ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::InvalidInput
    );
    classify(transient, format!("cannot write {}: {e}", path.display()))
}

fn expect_document<'a>(input: &'a Artifact, stage: &str) -> Result<&'a Document, StageError> {
    match input {
        Artifact::Document(doc) => Ok(doc),
        other => Err(StageError::Permanent(format!(
            "{stage} needs a document, got {}",
            other.kind()
        ))),
    }
}

fn expect_cards<'a>(input: &'a Artifact, stage: &str) -> Result<&'a CardSet, StageError> {
    match input {
        Artifact::Cards(cards) => Ok(cards),
        other => Err(StageError::Permanent(format!(
            "{stage} needs rendered cards, got {}",
            other.kind()
        ))),
    }
}

fn quality_warnings(images: &[ImageArtifact]) -> Vec<String> {
    images.iter().flat_map(|i| check_image(&i.path)).collect()
}

// ────────────────────────────────────────────────────────────────────────────
// CopyOptimize
// ────────────────────────────────────────────────────────────────────────────

pub struct CopyOptimizeStage {
    optimizer: Arc<dyn CopyOptimizer>,
    framework: CopyFramework,
    write_file: bool,
}

impl CopyOptimizeStage {
    pub fn new(optimizer: Arc<dyn CopyOptimizer>, framework: CopyFramework) -> Self {
        Self {
            optimizer,
            framework,
            write_file: true,
        }
    }

    /// Keep the optimized document in memory only.
    pub fn in_memory(mut self) -> Self {
        self.write_file = false;
        self
    }
}

/// `notes/post.md` → `notes/post_optimized.md`
pub fn optimized_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    source.with_file_name(format!("{stem}_optimized.md"))
}

#[async_trait]
impl StageProducer for CopyOptimizeStage {
    async fn produce(&self, input: &Artifact) -> Result<StageOutput, StageError> {
        let doc = expect_document(input, "copy optimization")?;
        let (_, body) = split_front_matter(&doc.text);

        let copy = self.optimizer.optimize(body.trim()).await?;
        let text = build_optimized_document(&copy, self.framework)?;

        let path = match (&doc.path, self.write_file) {
            (Some(source), true) => {
                let out = optimized_path(source);
                tokio::fs::write(&out, &text)
                    .await
                    .map_err(|e| write_error(&out, e))?;
                info!(path = %out.display(), "Optimized copy saved");
                Some(out)
            }
            _ => None,
        };

        let mut warnings = Vec::new();
        if !copy.body_variants.contains_key(self.framework.key()) {
            warnings.push(format!(
                "no '{}' variant returned, used the first available body",
                self.framework.key()
            ));
        }
        if copy.title_candidates.len() > 1 {
            warnings.push(format!(
                "other title candidates: {}",
                copy.title_candidates[1..].join(" | ")
            ));
        }

        Ok(StageOutput::new(Artifact::Document(Document { path, text })).with_warnings(warnings))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Render
// ────────────────────────────────────────────────────────────────────────────

pub struct RenderStage {
    parser: Arc<dyn MarkdownParser>,
    renderer: Arc<dyn Renderer>,
    style: Arc<StyleProfile>,
    style_id: String,
    max_concurrency: usize,
}

impl RenderStage {
    pub fn new(
        parser: Arc<dyn MarkdownParser>,
        renderer: Arc<dyn Renderer>,
        style: Arc<StyleProfile>,
        style_id: impl Into<String>,
    ) -> Self {
        Self {
            parser,
            renderer,
            style,
            style_id: style_id.into(),
            max_concurrency: 4,
        }
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }
}

#[async_trait]
impl StageProducer for RenderStage {
    async fn produce(&self, input: &Artifact) -> Result<StageOutput, StageError> {
        let doc = expect_document(input, "rendering")?;
        let parsed = self.parser.parse(&doc.text);
        if parsed.blocks.is_empty() && !parsed.has_cover() {
            return Err(StageError::Permanent("document has no content to render".to_string()));
        }

        let style = Arc::clone(&self.style);
        let blocks = parsed.blocks.clone();
        let pagination = tokio::task::spawn_blocking(move || paginate(&blocks, &style))
            .await
            .map_err(|e| StageError::Transient(format!("pagination task failed: {e}")))??;

        let page_count = pagination.pages.len();
        info!(
            blocks = parsed.blocks.len(),
            pages = page_count,
            safe_height = pagination.safe_height,
            style = %self.style_id,
            "Document paginated"
        );

        let mut warnings: Vec<String> = pagination.warnings.iter().map(|w| w.to_string()).collect();
        let content = check_content_quality(&parsed);
        debug!(score = content.score, "Content scored");
        warnings.extend(content.warnings());
        for page in &pagination.pages {
            if page.fill.verdict == PageFillVerdict::Sparse && page.index + 1 < page_count {
                warnings.push(format!(
                    "card {} is only {:.0}% full",
                    page.index + 1,
                    page.fill.fill_ratio * 100.0
                ));
            }
        }

        let mut images = Vec::with_capacity(page_count + 1);
        if parsed.has_cover() {
            images.push(self.renderer.render_cover(&parsed.metadata, &self.style_id).await?);
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        for page in pagination.pages {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| StageError::Transient(e.to_string()))?;
            let renderer = Arc::clone(&self.renderer);
            let style_id = self.style_id.clone();
            tasks.spawn(async move {
                let result = renderer.render_page(&page, page_count, &style_id).await;
                drop(permit);
                (page.index, result)
            });
        }

        let mut pages: Vec<Option<ImageArtifact>> = vec![None; page_count];
        while let Some(joined) = tasks.join_next().await {
            let (index, result) =
                joined.map_err(|e| StageError::Transient(format!("render task failed: {e}")))?;
            match result {
                Ok(image) => pages[index] = Some(image),
                Err(e) => {
                    tasks.abort_all();
                    return Err(e.into());
                }
            }
        }
        images.extend(pages.into_iter().flatten());
        debug!(images = images.len(), "Cards rendered");

        warnings.extend(quality_warnings(&images));

        Ok(StageOutput::new(Artifact::Cards(CardSet {
            metadata: parsed.metadata,
            images,
        }))
        .with_warnings(warnings))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Enhance
// ────────────────────────────────────────────────────────────────────────────

pub struct EnhanceStage {
    enhancer: Arc<dyn Enhancer>,
    style: EnhanceStyle,
    intensity: EnhanceIntensity,
}

impl EnhanceStage {
    pub fn new(enhancer: Arc<dyn Enhancer>, style: EnhanceStyle, intensity: EnhanceIntensity) -> Self {
        Self {
            enhancer,
            style,
            intensity,
        }
    }
}

#[async_trait]
impl StageProducer for EnhanceStage {
    async fn produce(&self, input: &Artifact) -> Result<StageOutput, StageError> {
        let cards = expect_cards(input, "enhancement")?;
        info!(
            images = cards.images.len(),
            style = %self.style,
            intensity = ?self.intensity,
            "Enhancing cards"
        );
        let images = self
            .enhancer
            .enhance(&cards.images, self.style, self.intensity)
            .await?;
        let warnings = quality_warnings(&images);

        Ok(StageOutput::new(Artifact::Cards(CardSet {
            metadata: cards.metadata.clone(),
            images,
        }))
        .with_warnings(warnings))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Publish
// ────────────────────────────────────────────────────────────────────────────

pub struct PublishStage {
    publisher: Arc<dyn Publisher>,
    title: Option<String>,
    description: Option<String>,
}

impl PublishStage {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            title: None,
            description: None,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

fn expect_draft(input: Artifact) -> Result<PublishDraft, StageError> {
    match input {
        Artifact::PublishDraft(draft) => Ok(draft),
        other => Err(StageError::Permanent(format!(
            "publishing needs an approved draft, got {}",
            other.kind()
        ))),
    }
}

/// `produce` only prepares the post; the publisher is called from `commit`, after approval.
#[async_trait]
impl StageProducer for PublishStage {
    async fn produce(&self, input: &Artifact) -> Result<StageOutput, StageError> {
        let cards = expect_cards(input, "publishing")?;
        let images = cards.paths();
        ensure_images_exist(&images)?;

        let title = self
            .title
            .as_deref()
            .or_else(|| cards.title())
            .unwrap_or(DEFAULT_TITLE)
            .to_string();
        let description = self
            .description
            .clone()
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

        Ok(StageOutput::new(Artifact::PublishDraft(PublishDraft {
            target: self.publisher.target(),
            title,
            description,
            images,
        })))
    }

    async fn commit(&self, approved: Artifact) -> Result<Artifact, StageError> {
        let draft = expect_draft(approved)?;
        info!(
            destination = %draft.target,
            title = %draft.title,
            images = draft.images.len(),
            "Publishing"
        );
        let receipt = self
            .publisher
            .publish(&draft.images, &draft.title, &draft.description)
            .await?;
        Ok(Artifact::Published(receipt))
    }
}
