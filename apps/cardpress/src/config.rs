use anyhow::{Context, Result};

use crate::publish::s3::S3Settings;

/// Application configuration loaded from environment variables.
/// Secrets are optional here; the stage that needs one asks for it with a `require_*` call.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: Option<String>,
    pub replicate_api_token: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub chromium_bin: String,
    pub review_port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            replicate_api_token: optional_env("REPLICATE_API_TOKEN"),
            s3_bucket: optional_env("S3_BUCKET"),
            s3_endpoint: optional_env("S3_ENDPOINT"),
            s3_region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            aws_access_key_id: optional_env("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: optional_env("AWS_SECRET_ACCESS_KEY"),
            chromium_bin: optional_env("CHROMIUM_BIN").unwrap_or_else(|| "chromium".to_string()),
            review_port: parse_port(optional_env("REVIEW_PORT").as_deref())?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn require_anthropic_key(&self) -> Result<String> {
        require(&self.anthropic_api_key, "ANTHROPIC_API_KEY")
    }

    pub fn require_replicate_token(&self) -> Result<String> {
        require(&self.replicate_api_token, "REPLICATE_API_TOKEN")
    }

    pub fn require_s3(&self) -> Result<S3Settings> {
        Ok(S3Settings {
            bucket: require(&self.s3_bucket, "S3_BUCKET")?,
            endpoint: self.s3_endpoint.clone(),
            region: self.s3_region.clone(),
            access_key_id: require(&self.aws_access_key_id, "AWS_ACCESS_KEY_ID")?,
            secret_access_key: require(&self.aws_secret_access_key, "AWS_SECRET_ACCESS_KEY")?,
        })
    }
}

/// Unset and blank variables both read as `None`.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require(value: &Option<String>, key: &str) -> Result<String> {
    value
        .clone()
        .with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_port(raw: Option<&str>) -> Result<u16> {
    raw.unwrap_or("8080")
        .parse::<u16>()
        .context("REVIEW_PORT must be a valid port number")
}
