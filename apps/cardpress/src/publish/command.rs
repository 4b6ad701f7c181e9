//! Publishes by running an external command:
//! `<program> [args...] --title T --desc D --images a.png b.png`.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tracing::info;

use crate::publish::{ensure_images_exist, PublishError, PublishReceipt, Publisher};

#[derive(Debug, Clone)]
pub struct CommandPublisher {
    program: String,
    args: Vec<String>,
}

impl CommandPublisher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn arguments(&self, images: &[PathBuf], title: &str, description: &str) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            "--title".to_string(),
            title.to_string(),
            "--desc".to_string(),
            description.to_string(),
            "--images".to_string(),
        ]);
        args.extend(images.iter().map(|p| p.display().to_string()));
        args
    }
}

#[async_trait]
impl Publisher for CommandPublisher {
    fn target(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|word| {
                if word.contains(char::is_whitespace) {
                    format!("{word:?}")
                } else {
                    word.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn publish(
        &self,
        images: &[PathBuf],
        title: &str,
        description: &str,
    ) -> Result<PublishReceipt, PublishError> {
        ensure_images_exist(images)?;

        let output = Command::new(&self.program)
            .args(self.arguments(images, title, description))
            .output()
            .await?;

        if !output.status.success() {
            return Err(PublishError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!(program = %self.program, images = images.len(), "Publish command succeeded");

        Ok(PublishReceipt {
            publisher: "command".to_string(),
            location: if stdout.is_empty() {
                self.program.clone()
            } else {
                stdout
            },
            title: title.to_string(),
            image_count: images.len(),
            published_at: Utc::now(),
        })
    }
}
