//! Markdown documents: front matter plus a body split into indivisible content blocks.
//!
//! ```text
//! ---
//! emoji: "🚀"
//! title: "5 个效率工具"
//! subtitle: "打工人必备"
//! ---
//! first block
//! ---
//! second block
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use yaml_rust2::{Yaml, YamlLoader};

pub const DEFAULT_SEPARATOR: &str = "---";

/// One indivisible unit of body text. Never split across cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    order: usize,
    raw_text: String,
}

impl ContentBlock {
    pub fn new(order: usize, raw_text: impl Into<String>) -> Self {
        Self {
            order,
            raw_text: raw_text.into(),
        }
    }

    /// Position in the source body, starting at 0.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub metadata: BTreeMap<String, String>,
    pub blocks: Vec<ContentBlock>,
}

impl ParsedDocument {
    pub fn title(&self) -> Option<&str> {
        self.meta("title")
    }

    /// Non-empty metadata value.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// A cover card is drawn when there is something to put on it.
    pub fn has_cover(&self) -> bool {
        self.meta("title").is_some() || self.meta("emoji").is_some()
    }
}

pub trait MarkdownParser: Send + Sync {
    fn parse(&self, document: &str) -> ParsedDocument;
}

/// YAML front matter and a body split on a separator line.
#[derive(Debug, Clone)]
pub struct FrontMatterParser {
    separator: String,
}

impl FrontMatterParser {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }
}

impl Default for FrontMatterParser {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl MarkdownParser for FrontMatterParser {
    fn parse(&self, document: &str) -> ParsedDocument {
        let (metadata, body) = split_front_matter(document);
        ParsedDocument {
            metadata,
            blocks: split_blocks(body, &self.separator),
        }
    }
}

/// Splits leading `---` front matter from the body. Documents without a closed front
/// matter fence are all body.
pub fn split_front_matter(document: &str) -> (BTreeMap<String, String>, &str) {
    let text = document.trim_start_matches('\u{feff}');

    let Some(after_open) = strip_fence_line(text) else {
        return (BTreeMap::new(), text);
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim() == DEFAULT_SEPARATOR {
            let metadata = parse_front_matter(&after_open[..offset]);
            return (metadata, &after_open[offset + line.len()..]);
        }
        offset += line.len();
    }

    (BTreeMap::new(), text)
}

/// Top-level scalar entries of a YAML mapping, as strings. Nested values are skipped.
fn parse_front_matter(yaml: &str) -> BTreeMap<String, String> {
    let docs = match YamlLoader::load_from_str(yaml) {
        Ok(docs) => docs,
        Err(e) => {
            warn!("Ignoring invalid front matter: {e}");
            return BTreeMap::new();
        }
    };
    let Some(Yaml::Hash(entries)) = docs.into_iter().next() else {
        return BTreeMap::new();
    };

    entries
        .into_iter()
        .filter_map(|(key, value)| {
            let key = scalar_string(key)?;
            let value = scalar_string(value)?;
            Some((key, value.trim_end().to_string()))
        })
        .collect()
}

fn scalar_string(value: Yaml) -> Option<String> {
    match value {
        Yaml::String(s) | Yaml::Real(s) => Some(s),
        Yaml::Integer(i) => Some(i.to_string()),
        Yaml::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Body segments between separator lines, trimmed, empty ones dropped.
pub fn split_blocks(body: &str, separator: &str) -> Vec<ContentBlock> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for line in body.lines() {
        if line.trim() == separator {
            segments.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    segments.push(current);

    segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(order, text)| ContentBlock::new(order, text))
        .collect()
}

/// Writes metadata back as front matter followed by the body.
pub fn compose(metadata: &BTreeMap<String, String>, body: &str) -> String {
    let mut out = String::new();
    if !metadata.is_empty() {
        out.push_str("---\n");
        for (key, value) in metadata {
            out.push_str(&format!("{key}: \"{}\"\n", yaml_escape(value)));
        }
        out.push_str("---\n\n");
    }
    out.push_str(body.trim());
    out.push('\n');
    out
}

/// Escapes a value for a double-quoted YAML scalar.
fn yaml_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn strip_fence_line(text: &str) -> Option<&str> {
    let (first, rest) = match text.split_once('\n') {
        Some(pair) => pair,
        None => (text, ""),
    };
    (first.trim() == DEFAULT_SEPARATOR).then_some(rest)
}
