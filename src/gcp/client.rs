//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality. One client is shared by every collection task
//! of a run, so it is cheap to clone and carries no per-project state.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use anyhow::{Context, Result};
use serde_json::Value;

/// Base URLs of the GCP REST APIs used by the audit
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub compute: String,
    pub resource_manager: String,
    pub storage_upload: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            compute: "https://compute.googleapis.com/compute/v1".to_string(),
            resource_manager: "https://cloudresourcemanager.googleapis.com/v1".to_string(),
            storage_upload: "https://storage.googleapis.com/upload/storage/v1".to_string(),
        }
    }
}

impl ApiEndpoints {
    /// Point every API at one base URL (mock servers, emulators)
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            compute: format!("{}/compute/v1", base),
            resource_manager: format!("{}/v1", base),
            storage_upload: format!("{}/upload/storage/v1", base),
        }
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub endpoints: ApiEndpoints,
}

impl GcpClient {
    /// Create a new GCP client using Application Default Credentials
    pub async fn new() -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        Self::with_credentials(credentials, ApiEndpoints::default())
    }

    /// Create a client from explicit credentials and endpoints
    pub fn with_credentials(credentials: GcpCredentials, endpoints: ApiEndpoints) -> Result<Self> {
        let http = GcpHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            endpoints,
        })
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Make a POST request with a caller-supplied token
    pub async fn post_with_token(
        &self,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        self.http.post(url, token, body).await
    }

    /// Upload raw bytes to a GCP API
    pub async fn upload(&self, url: &str, content_type: &str, bytes: Vec<u8>) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.upload(url, &token, content_type, bytes).await
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    /// Build Compute Engine API URL for a project
    pub fn compute_url(&self, project_id: &str, path: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.endpoints.compute, project_id, path
        )
    }

    /// Build global Compute Engine API URL
    pub fn compute_global_url(&self, project_id: &str, resource: &str) -> String {
        self.compute_url(project_id, &format!("global/{}", resource))
    }

    /// Build aggregated Compute Engine API URL (all zones)
    pub fn compute_aggregated_url(&self, project_id: &str, resource: &str) -> String {
        self.compute_url(project_id, &format!("aggregated/{}", resource))
    }

    // =========================================================================
    // Resource Manager API helpers
    // =========================================================================

    /// Build Resource Manager API URL
    pub fn resourcemanager_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoints.resource_manager, path)
    }

    // =========================================================================
    // Cloud Storage API helpers
    // =========================================================================

    /// Build Cloud Storage media upload URL for an object
    pub fn storage_upload_url(&self, bucket: &str, object_name: &str) -> Result<String> {
        let base = format!(
            "{}/b/{}/o",
            self.endpoints.storage_upload,
            urlencoding::encode(bucket)
        );
        let url = url::Url::parse_with_params(
            &base,
            &[("uploadType", "media"), ("name", object_name)],
        )
        .context("Invalid storage upload URL")?;

        Ok(url.to_string())
    }
}

/// Format a GCP API error for display
pub fn format_gcp_error(error: &anyhow::Error) -> String {
    super::http::format_gcp_error(error)
}
