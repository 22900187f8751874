//! Delivery Handoff
//!
//! Persists the rendered report and hands the file to the storage and
//! e-mail collaborators. Both deliveries are best-effort and independent.
//!
//! - [`storage`] - Cloud Storage media upload
//! - [`email`] - SMTP delivery with the report attached

pub mod email;
pub mod storage;

use crate::audit::{report_file_name, Report};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

pub use email::SmtpMailer;
pub use storage::GcsUploader;

/// MIME type of the report
pub const REPORT_CONTENT_TYPE: &str = "text/csv";

/// The report file on local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    path: PathBuf,
    name: String,
}

impl ReportArtifact {
    /// Render `report` into `<dir>/<prefix>-<timestamp>.csv`
    pub async fn persist(
        report: &Report,
        dir: &Path,
        prefix: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let name = report_file_name(prefix, timestamp);
        let path = dir.join(&name);

        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
        tokio::fs::write(&path, report.render())
            .await
            .with_context(|| format!("Failed to write report {}", path.display()))?;

        tracing::info!("Report written to {}", path.display());

        Ok(Self { path, name })
    }

    /// Location and file name handed to the delivery collaborators
    pub fn finalize(&self) -> (&Path, &str) {
        (&self.path, &self.name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Storage sink for the finished report
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Destination identifier, for logs
    fn destination(&self) -> &str;

    async fn store(&self, path: &Path, name: &str) -> Result<()>;
}

/// E-mail channel for the finished report
#[async_trait]
pub trait ArtifactMailer: Send + Sync {
    /// Recipient list, for logs
    fn recipients(&self) -> &[String];

    async fn send(&self, path: &Path, name: &str) -> Result<()>;
}

/// Independent results of both deliveries
#[derive(Debug)]
pub struct DeliveryReport {
    pub upload: Result<()>,
    pub email: Result<()>,
}

impl DeliveryReport {
    pub fn all_delivered(&self) -> bool {
        self.upload.is_ok() && self.email.is_ok()
    }
}

/// Upload and mail the artifact concurrently.
///
/// Never fails; each outcome is logged and returned separately.
pub async fn deliver(
    artifact: &ReportArtifact,
    store: &dyn ArtifactStore,
    mailer: &dyn ArtifactMailer,
) -> DeliveryReport {
    let (path, name) = artifact.finalize();

    let upload = async {
        let result = store.store(path, name).await;
        match &result {
            Ok(()) => tracing::info!("{} uploaded to {}", name, store.destination()),
            Err(e) => tracing::error!("Upload to {} failed: {:#}", store.destination(), e),
        }
        result
    };

    let email = async {
        let result = mailer.send(path, name).await;
        match &result {
            Ok(()) => tracing::info!("{} sent to {}", name, mailer.recipients().join(", ")),
            Err(e) => tracing::error!("E-mail delivery failed: {:#}", e),
        }
        result
    };

    let (upload, email) = tokio::join!(upload, email);
    DeliveryReport { upload, email }
}
