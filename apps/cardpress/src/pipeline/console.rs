//! Terminal checkpoint: prints the stage result and reads a decision from stdin.
//!
//! Stdin reads block, so every prompt runs on `spawn_blocking`. End of input counts as
//! a rejection (or abort for failures).

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::pipeline::checkpoint::{Checkpoint, Decision, FailureDecision};
use crate::pipeline::stage::{Artifact, StageFailure, StageResult};

/// What a typed line means at a result prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Decide(Decision),
    /// Open the images in the system viewer, then ask again.
    View,
}

pub fn parse_choice(input: &str) -> Option<Choice> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(Choice::Decide(Decision::Approve)),
        "n" | "no" => Some(Choice::Decide(Decision::Reject)),
        "r" | "retry" => Some(Choice::Decide(Decision::Retry)),
        "v" | "view" => Some(Choice::View),
        _ => None,
    }
}

pub fn parse_failure_choice(input: &str) -> Option<FailureDecision> {
    match input.trim().to_lowercase().as_str() {
        "r" | "retry" => Some(FailureDecision::Retry),
        "n" | "no" | "abort" => Some(FailureDecision::Abort),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConsoleCheckpoint;

impl ConsoleCheckpoint {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Checkpoint for ConsoleCheckpoint {
    async fn present(&self, result: &StageResult) -> Decision {
        let report = describe_result(result);
        let images = image_paths(&result.output);

        let answer = tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            println!("{report}");
            loop {
                let line = prompt_line(&mut input, "Approve this result? [y]es / [n]o / [r]etry / [v]iew")?;
                match parse_choice(&line) {
                    Some(Choice::Decide(decision)) => return Some(decision),
                    Some(Choice::View) => open_in_viewer(&images),
                    None => println!("Invalid choice, enter y, n, r or v"),
                }
            }
        })
        .await;

        match answer {
            Ok(Some(decision)) => decision,
            Ok(None) => {
                warn!(stage = %result.stage, "Console closed at checkpoint, rejecting");
                Decision::Reject
            }
            Err(e) => {
                warn!(stage = %result.stage, "Console prompt task failed: {e}");
                Decision::Reject
            }
        }
    }

    async fn present_failure(&self, failure: &StageFailure) -> FailureDecision {
        let report = format!(
            "\n── {} failed (attempt {}) ──\n{}",
            failure.stage, failure.attempt, failure.error
        );

        let answer = tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            println!("{report}");
            loop {
                let line = prompt_line(&mut input, "Retry this stage? [r]etry / [n]o, abort")?;
                match parse_failure_choice(&line) {
                    Some(decision) => return Some(decision),
                    None => println!("Invalid choice, enter r or n"),
                }
            }
        })
        .await;

        match answer {
            Ok(Some(decision)) => decision,
            Ok(None) | Err(_) => {
                warn!(stage = %failure.stage, "No answer at failure prompt, aborting");
                FailureDecision::Abort
            }
        }
    }
}

/// Prints `prompt` and reads one line. `None` on end of input or read error.
fn prompt_line(input: &mut impl BufRead, prompt: &str) -> Option<String> {
    print!("{prompt}\n>>> ");
    io::stdout().flush().ok()?;
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

/// Human-readable checkpoint report.
pub fn describe_result(result: &StageResult) -> String {
    let mut out = format!(
        "\n── {} (attempt {}) ──\n{}\n",
        result.stage,
        result.attempt,
        result.output.summary()
    );

    match &result.output {
        Artifact::Document(doc) => {
            out.push_str(&"=".repeat(50));
            out.push('\n');
            out.push_str(doc.text.trim_end());
            out.push('\n');
            out.push_str(&"=".repeat(50));
            out.push('\n');
        }
        Artifact::Cards(cards) => {
            for (i, image) in cards.images.iter().enumerate() {
                out.push_str(&format!(
                    "  {}. {} ({}x{})\n",
                    i + 1,
                    image.path.display(),
                    image.width,
                    image.height
                ));
            }
        }
        Artifact::PublishDraft(draft) => {
            out.push_str(&format!("  target: {}\n", draft.target));
            out.push_str(&format!("  title: {}\n", draft.title));
            out.push_str(&format!("  description: {}\n", draft.description));
            for (i, path) in draft.images.iter().enumerate() {
                out.push_str(&format!("  {}. {}\n", i + 1, path.display()));
            }
            out.push_str("  Nothing is sent until you approve.\n");
        }
        Artifact::Published(receipt) => {
            out.push_str(&format!("  title: {}\n", receipt.title));
        }
    }

    for warning in &result.warnings {
        out.push_str(&format!("  ! {warning}\n"));
    }
    out
}

fn image_paths(artifact: &Artifact) -> Vec<PathBuf> {
    match artifact {
        Artifact::Cards(cards) => cards.paths(),
        Artifact::PublishDraft(draft) => draft.images.clone(),
        _ => Vec::new(),
    }
}

fn open_in_viewer(paths: &[PathBuf]) {
    if paths.is_empty() {
        println!("Nothing to view at this stage");
        return;
    }
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    let mut opened = 0;
    for path in paths.iter().filter(|p| p.exists()) {
        match std::process::Command::new(opener).arg(path).spawn() {
            Ok(_) => opened += 1,
            Err(e) => {
                warn!("Could not open {} with {opener}: {e}", path.display());
                break;
            }
        }
    }
    info!(opened, "Opened images for preview");
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::pipeline::stage::{Document, StageKind};
    use crate::publish::PublishDraft;
    use crate::render::{CardKind, CardSet, ImageArtifact};

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("y\n"), Some(Choice::Decide(Decision::Approve)));
        assert_eq!(parse_choice(" N "), Some(Choice::Decide(Decision::Reject)));
        assert_eq!(parse_choice("r"), Some(Choice::Decide(Decision::Retry)));
        assert_eq!(parse_choice("v"), Some(Choice::View));
        assert_eq!(parse_choice("maybe"), None);
        assert_eq!(parse_choice(""), None);
    }

    #[test]
    fn test_parse_failure_choice() {
        assert_eq!(parse_failure_choice("r"), Some(FailureDecision::Retry));
        assert_eq!(parse_failure_choice("n"), Some(FailureDecision::Abort));
        assert_eq!(parse_failure_choice("y"), None);
    }

    #[test]
    fn test_prompt_line_eof_is_none() {
        let mut empty: &[u8] = b"";
        assert_eq!(prompt_line(&mut empty, "?"), None);
        let mut one: &[u8] = b"r\n";
        assert_eq!(prompt_line(&mut one, "?").as_deref(), Some("r\n"));
    }

    #[test]
    fn test_describe_cards_lists_images_and_warnings() {
        let cards = CardSet {
            metadata: BTreeMap::new(),
            images: vec![ImageArtifact {
                path: PathBuf::from("out/card_1.png"),
                width: 1080,
                height: 1440,
                kind: CardKind::Body { index: 1, total: 1 },
            }],
        };
        let doc = Artifact::Document(Document {
            path: None,
            text: "x".into(),
        });
        let result = StageResult {
            stage: StageKind::Render,
            attempt: 2,
            input: doc,
            output: Artifact::Cards(cards),
            warnings: vec!["block 3 overflows".into()],
            produced_at: Utc::now(),
        };
        let text = describe_result(&result);
        assert!(text.contains("render (attempt 2)"));
        assert!(text.contains("out/card_1.png (1080x1440)"));
        assert!(text.contains("! block 3 overflows"));
    }

    #[test]
    fn test_describe_draft_shows_destination_before_sending() {
        let result = StageResult {
            stage: StageKind::Publish,
            attempt: 1,
            input: Artifact::Document(Document {
                path: None,
                text: "x".into(),
            }),
            output: Artifact::PublishDraft(PublishDraft {
                target: "s3://cards".into(),
                title: "周末好去处".into(),
                description: "收藏".into(),
                images: vec![PathBuf::from("out/cover.png")],
            }),
            warnings: vec![],
            produced_at: Utc::now(),
        };
        let text = describe_result(&result);
        assert!(text.contains("target: s3://cards"));
        assert!(text.contains("title: 周末好去处"));
        assert!(text.contains("1. out/cover.png"));
        assert_eq!(image_paths(&result.output), vec![PathBuf::from("out/cover.png")]);
    }
}
