//! Replicate prediction client for card enhancement.
//!
//! Per image: POST a prediction with the card as a base64 data URI, poll it until it
//! succeeds or fails, then download the output next to the other cards as
//! `<stem>_enhanced.<ext>`. Images go through a bounded worker pool; request starts are
//! spaced by a fixed delay to stay under the provider's rate limit.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::enhance::prompts::{build_prompt, negative_prompt, EnhanceThemes};
use crate::enhance::{EnhanceError, EnhanceIntensity, EnhanceStyle, Enhancer};
use crate::render::{CardKind, ImageArtifact};

pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";
pub const DEFAULT_MODEL: &str = "google/nano-banana-pro";

#[derive(Debug, Clone)]
pub struct ReplicateSettings {
    pub base_url: String,
    pub model: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
    /// Minimum gap between two request starts.
    pub request_delay: Duration,
    pub max_concurrency: usize,
}

impl Default for ReplicateSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            poll_interval: Duration::from_secs(2),
            max_polls: 150,
            request_delay: Duration::from_secs(3),
            max_concurrency: 2,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Clone)]
pub struct ReplicateEnhancer {
    client: Client,
    token: String,
    settings: Arc<ReplicateSettings>,
    themes: Arc<EnhanceThemes>,
    output_dir: PathBuf,
}

impl ReplicateEnhancer {
    pub fn new(
        token: String,
        settings: ReplicateSettings,
        themes: Arc<EnhanceThemes>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, EnhanceError> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self {
            client,
            token,
            settings: Arc::new(settings),
            themes,
            output_dir: output_dir.into(),
        })
    }

    async fn enhance_one(
        &self,
        image: ImageArtifact,
        style: EnhanceStyle,
        intensity: EnhanceIntensity,
    ) -> Result<ImageArtifact, EnhanceError> {
        let stem = file_stem(&image.path);
        let theme = self.themes.detect(&stem);
        let is_cover = image.kind == CardKind::Cover;
        let (prompt, negative) = match theme {
            Some(theme) => (
                build_prompt(theme, is_cover, style, intensity),
                negative_prompt(theme),
            ),
            None => (String::new(), String::new()),
        };
        debug!(
            image = %image.path.display(),
            theme = theme.map(|t| t.id.as_str()).unwrap_or("none"),
            prompt_chars = prompt.chars().count(),
            "Enhancing card"
        );

        let bytes = tokio::fs::read(&image.path).await?;
        let payload = prediction_payload(&self.settings.model, &prompt, &negative, &bytes);

        let prediction = self.create_prediction(&payload).await?;
        let url = self.wait_for_output(prediction).await?;

        let out_path = enhanced_path(&self.output_dir, &image.path);
        self.download(&url, &out_path).await?;

        let (width, height) =
            image::image_dimensions(&out_path).unwrap_or((image.width, image.height));
        info!(from = %image.path.display(), to = %out_path.display(), "Card enhanced");

        Ok(ImageArtifact {
            path: out_path,
            width,
            height,
            kind: image.kind,
        })
    }

    async fn create_prediction(&self, payload: &Value) -> Result<Prediction, EnhanceError> {
        let response = self
            .client
            .post(format!("{}/predictions", self.settings.base_url))
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnhanceError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    async fn wait_for_output(&self, mut prediction: Prediction) -> Result<String, EnhanceError> {
        let url = format!("{}/predictions/{}", self.settings.base_url, prediction.id);

        for poll in 0..self.settings.max_polls {
            if let Some(output) = resolve(&prediction)? {
                return Ok(output);
            }
            if poll % 10 == 0 {
                debug!(
                    id = %prediction.id,
                    elapsed_s = (self.settings.poll_interval * poll).as_secs(),
                    "Prediction running"
                );
            }
            tokio::time::sleep(self.settings.poll_interval).await;

            let response = self.client.get(&url).bearer_auth(&self.token).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(EnhanceError::Api {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }
            prediction = response.json().await?;
        }

        match resolve(&prediction)? {
            Some(output) => Ok(output),
            None => Err(EnhanceError::Timeout {
                id: prediction.id,
                polls: self.settings.max_polls,
            }),
        }
    }

    async fn download(&self, url: &str, path: &Path) -> Result<(), EnhanceError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl Enhancer for ReplicateEnhancer {
    async fn enhance(
        &self,
        images: &[ImageArtifact],
        style: EnhanceStyle,
        intensity: EnhanceIntensity,
    ) -> Result<Vec<ImageArtifact>, EnhanceError> {
        if let Some(missing) = images.iter().find(|i| !i.path.is_file()) {
            return Err(EnhanceError::MissingImage(missing.path.clone()));
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, image) in images.iter().cloned().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| EnhanceError::Worker(e.to_string()))?;
            if index > 0 {
                tokio::time::sleep(self.settings.request_delay).await;
            }
            let worker = self.clone();
            tasks.spawn(async move {
                let result = worker.enhance_one(image, style, intensity).await;
                drop(permit);
                (index, result)
            });
        }

        let mut slots: Vec<Option<ImageArtifact>> = vec![None; images.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(|e| EnhanceError::Worker(e.to_string()))?;
            match result {
                Ok(artifact) => slots[index] = Some(artifact),
                Err(e) => {
                    warn!(image = index, "Enhancement failed: {e}");
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| EnhanceError::Worker("an enhancement task produced no result".to_string()))
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<output_dir>/<stem>_enhanced.<ext>`, keeping the input extension (png when missing).
pub(crate) fn enhanced_path(output_dir: &Path, input: &Path) -> PathBuf {
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    output_dir.join(format!("{}_enhanced.{ext}", file_stem(input)))
}

pub(crate) fn prediction_payload(model: &str, prompt: &str, negative: &str, png: &[u8]) -> Value {
    json!({
        "version": model,
        "input": {
            "prompt": prompt,
            "negative_prompt": negative,
            "image_input": [format!("data:image/png;base64,{}", STANDARD.encode(png))],
            "aspect_ratio": "3:4",
            "output_format": "png",
            "resolution": "2K",
            "safety_filter_level": "block_only_high"
        }
    })
}

/// `Some(url)` once succeeded, `None` while still running, error on failure.
fn resolve(prediction: &Prediction) -> Result<Option<String>, EnhanceError> {
    match prediction.status.as_str() {
        "succeeded" => {
            let url = match &prediction.output {
                Some(Value::String(url)) => Some(url.clone()),
                Some(Value::Array(items)) => items.first().and_then(Value::as_str).map(str::to_string),
                _ => None,
            };
            url.map(Some)
                .ok_or_else(|| EnhanceError::EmptyOutput(prediction.id.clone()))
        }
        "failed" | "canceled" => Err(EnhanceError::PredictionFailed {
            id: prediction.id.clone(),
            message: match &prediction.error {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => format!("prediction {}", prediction.status),
            },
        }),
        _ => Ok(None),
    }
}
