//! Publishes a post to S3-compatible storage (AWS or MinIO).
//!
//! Layout under the bucket:
//! ```text
//! posts/<date>-<post id>/01_cover.png
//! posts/<date>-<post id>/02_card_1.png
//! posts/<date>-<post id>/manifest.json
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::publish::{ensure_images_exist, PublishError, PublishReceipt, Publisher};

#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Manifest stored next to the images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostManifest {
    pub post_id: Uuid,
    pub title: String,
    pub description: String,
    /// Object keys in card order.
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct S3Publisher {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Publisher {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Builds a client with static credentials and an optional custom endpoint.
    pub async fn from_settings(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "cardpress-static",
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // MinIO and most S3-compatible stores need path-style addressing.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.endpoint.is_some())
            .build();

        Self::new(aws_sdk_s3::Client::from_conf(s3_config), settings.bucket.clone())
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), PublishError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| PublishError::Storage(format!("upload of {key} failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Publisher for S3Publisher {
    fn target(&self) -> String {
        format!("s3://{}", self.bucket)
    }

    async fn publish(
        &self,
        images: &[PathBuf],
        title: &str,
        description: &str,
    ) -> Result<PublishReceipt, PublishError> {
        ensure_images_exist(images)?;

        let post_id = Uuid::new_v4();
        let now = Utc::now();
        let prefix = post_prefix(post_id, now);
        let keys = image_keys(&prefix, images);

        for (path, key) in images.iter().zip(&keys) {
            let data = tokio::fs::read(path).await?;
            self.put(key, Bytes::from(data), content_type_for(path)).await?;
            info!("Uploaded s3://{}/{}", self.bucket, key);
        }

        let manifest = PostManifest {
            post_id,
            title: title.to_string(),
            description: description.to_string(),
            images: keys,
            created_at: now,
        };
        let manifest_key = format!("{prefix}manifest.json");
        let body = serde_json::to_vec_pretty(&manifest)?;
        self.put(&manifest_key, Bytes::from(body), "application/json")
            .await?;

        Ok(PublishReceipt {
            publisher: "s3".to_string(),
            location: format!("s3://{}/{}", self.bucket, prefix),
            title: title.to_string(),
            image_count: images.len(),
            published_at: now,
        })
    }
}

fn post_prefix(post_id: Uuid, at: DateTime<Utc>) -> String {
    format!("posts/{}-{}/", at.format("%Y%m%d"), post_id)
}

/// Numbered keys keep card order when listed.
fn image_keys(prefix: &str, images: &[PathBuf]) -> Vec<String> {
    images
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("image_{}", i + 1));
            format!("{prefix}{:02}_{name}", i + 1)
        })
        .collect()
}

fn content_type_for(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_post_prefix_has_date_and_id() {
        let id = Uuid::nil();
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(
            post_prefix(id, at),
            "posts/20260309-00000000-0000-0000-0000-000000000000/"
        );
    }

    #[test]
    fn test_image_keys_are_numbered_in_order() {
        let keys = image_keys(
            "posts/x/",
            &[PathBuf::from("/out/cover.png"), PathBuf::from("/out/card_1.png")],
        );
        assert_eq!(keys, vec!["posts/x/01_cover.png", "posts/x/02_card_1.png"]);
    }

    #[test]
    fn test_content_type_for_extension() {
        assert_eq!(content_type_for(std::path::Path::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(std::path::Path::new("a.png")), "image/png");
        assert_eq!(content_type_for(std::path::Path::new("a")), "image/png");
    }

    #[test]
    fn test_manifest_json_shape() {
        let manifest = PostManifest {
            post_id: Uuid::nil(),
            title: "5 个效率工具".into(),
            description: "desc".into(),
            images: vec!["posts/x/01_cover.png".into()],
            created_at: Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["title"], "5 个效率工具");
        assert_eq!(json["images"][0], "posts/x/01_cover.png");
    }
}
