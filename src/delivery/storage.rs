//! Cloud Storage upload of the report

use super::{ArtifactStore, REPORT_CONTENT_TYPE};
use crate::gcp::client::GcpClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

/// Uploads the report into a bucket, keeping its file name
pub struct GcsUploader {
    client: GcpClient,
    bucket: String,
}

impl GcsUploader {
    pub fn new(client: GcpClient, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ArtifactStore for GcsUploader {
    fn destination(&self) -> &str {
        &self.bucket
    }

    async fn store(&self, path: &Path, name: &str) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let url = self.client.storage_upload_url(&self.bucket, name)?;
        let response = self
            .client
            .upload(&url, REPORT_CONTENT_TYPE, bytes)
            .await
            .with_context(|| format!("Failed to upload {} to bucket {}", name, self.bucket))?;

        if let Some(size) = response.get("size").and_then(|v| v.as_str()) {
            tracing::debug!("Stored gs://{}/{} ({} bytes)", self.bucket, name, size);
        }

        Ok(())
    }
}
