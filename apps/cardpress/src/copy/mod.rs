//! Copy optimization: rewrites a note's body into post-ready copy.
//!
//! The optimizer returns several title candidates and one body per copy framework.
//! `build_optimized_document` turns that into a new markdown document with a cover
//! front matter, ready for pagination.

pub mod prompts;

use std::collections::BTreeMap;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::document::compose;
use crate::llm_client::{LlmClient, LlmError};
use prompts::{COPY_PROMPT_TEMPLATE, COPY_SYSTEM};

const TITLE_MAX_CHARS: usize = 15;
const OPTIMIZED_EMOJI: &str = "✨";
const OPTIMIZED_SUBTITLE: &str = "AI优化版本";
const FALLBACK_TITLE: &str = "优化标题";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum CopyFramework {
    ProblemSolution,
    Tutorial,
    Review,
    Lifestyle,
}

impl CopyFramework {
    pub const ALL: [CopyFramework; 4] = [
        CopyFramework::ProblemSolution,
        CopyFramework::Tutorial,
        CopyFramework::Review,
        CopyFramework::Lifestyle,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            CopyFramework::ProblemSolution => "problem_solution",
            CopyFramework::Tutorial => "tutorial",
            CopyFramework::Review => "review",
            CopyFramework::Lifestyle => "lifestyle",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizedCopy {
    pub title_candidates: Vec<String>,
    /// Framework key → markdown body.
    pub body_variants: BTreeMap<String, String>,
}

impl OptimizedCopy {
    pub fn best_title(&self) -> Option<&str> {
        self.title_candidates
            .iter()
            .map(|t| t.trim())
            .find(|t| !t.is_empty())
    }

    /// Body for `framework`, or the first variant when that framework is missing.
    pub fn body_for(&self, framework: CopyFramework) -> Option<&str> {
        self.body_variants
            .get(framework.key())
            .or_else(|| self.body_variants.values().next())
            .map(String::as_str)
            .filter(|b| !b.trim().is_empty())
    }
}

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("copy optimizer call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("copy optimizer returned no usable body")]
    EmptyBody,
}

impl CopyError {
    pub fn is_transient(&self) -> bool {
        match self {
            CopyError::Llm(e) => e.is_transient(),
            // Another sample may well produce a body.
            CopyError::EmptyBody => true,
        }
    }
}

#[async_trait]
pub trait CopyOptimizer: Send + Sync {
    async fn optimize(&self, text: &str) -> Result<OptimizedCopy, CopyError>;
}

/// Copy optimization through the Anthropic Messages API.
#[derive(Clone)]
pub struct LlmCopyOptimizer {
    llm: LlmClient,
}

impl LlmCopyOptimizer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl CopyOptimizer for LlmCopyOptimizer {
    async fn optimize(&self, text: &str) -> Result<OptimizedCopy, CopyError> {
        let frameworks = CopyFramework::ALL
            .iter()
            .map(|f| f.key())
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = COPY_PROMPT_TEMPLATE
            .replace("{frameworks}", &frameworks)
            .replace("{content}", text);

        let copy: OptimizedCopy = self.llm.call_json(&prompt, COPY_SYSTEM).await?;
        info!(
            model = self.llm.model(),
            titles = copy.title_candidates.len(),
            variants = copy.body_variants.len(),
            "Copy optimized"
        );
        Ok(copy)
    }
}

/// Markdown document for the optimized copy: cover front matter plus the chosen body.
pub fn build_optimized_document(
    copy: &OptimizedCopy,
    framework: CopyFramework,
) -> Result<String, CopyError> {
    let body = copy.body_for(framework).ok_or(CopyError::EmptyBody)?;
    let title: String = copy
        .best_title()
        .unwrap_or(FALLBACK_TITLE)
        .chars()
        .take(TITLE_MAX_CHARS)
        .collect();

    let mut metadata = BTreeMap::new();
    metadata.insert("emoji".to_string(), OPTIMIZED_EMOJI.to_string());
    metadata.insert("title".to_string(), title);
    metadata.insert("subtitle".to_string(), OPTIMIZED_SUBTITLE.to_string());

    Ok(compose(&metadata, body))
}
