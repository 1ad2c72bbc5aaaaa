//! REST API client for the KevCal calendar service.
//!
//! Wraps the service's HTTP/JSON endpoints (upload, job start and
//! status, Printful product creation and mockup status, connectivity
//! check) using [`reqwest`].

use std::time::Duration;

use kevcal_core::job::JobSnapshot;
use kevcal_core::mockup::MockupSnapshot;
use kevcal_core::status::{ConnectionStatus, ProjectStatus};
use kevcal_core::types::{deserialize_id, deserialize_opt_id, FileId, JobId, TaskKey};
use kevcal_core::upload::CandidateFile;
use reqwest::multipart;
use serde::Deserialize;

/// HTTP client for one KevCal service instance.
#[derive(Debug, Clone)]
pub struct KevCalApi {
    client: reqwest::Client,
    base_url: String,
}

/// Response of `POST /api/upload`.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    #[serde(deserialize_with = "deserialize_id")]
    pub file_id: FileId,
    pub filename: String,
}

/// Response of `POST /api/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(deserialize_with = "deserialize_id")]
    pub job_id: JobId,
}

/// Response of `POST /api/printful/create-product`.
///
/// Without a `task_key` the upload was accepted but no mockup task was
/// started.
#[derive(Debug, Deserialize)]
pub struct CreateProductResponse {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub task_key: Option<TaskKey>,
}

/// Error body the service sends with non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("KevCal API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The service refused the request and explained why.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    /// The response body was not the expected JSON.
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Reading a local file for upload, or writing a download, failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KevCalApi {
    /// Create a new API client.
    ///
    /// * `base_url` - service root, e.g. `http://127.0.0.1:5000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create an API client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the service can reach Printful.
    pub async fn verify_connection(&self) -> Result<ConnectionStatus, ApiError> {
        let response = self.client.get(self.url("/api/printful/verify")).send().await?;
        Self::parse_response(response).await
    }

    /// Fetch the active project summary.
    pub async fn project_status(&self) -> Result<ProjectStatus, ApiError> {
        let response = self.client.get(self.url("/api/project/status")).send().await?;
        Self::parse_response(response).await
    }

    /// Upload one local image as multipart field `file`.
    pub async fn upload_file(&self, file: &CandidateFile) -> Result<UploadResponse, ApiError> {
        let bytes = tokio::fs::read(&file.path).await?;
        let part = multipart::Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.mime)?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Start calendar generation from a previously uploaded file.
    pub async fn start_generation(&self, source_file_id: &str) -> Result<GenerateResponse, ApiError> {
        let response = self
            .client
            .post(self.url("/api/generate"))
            .form(&[("source_file_id", source_file_id)])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Read the current snapshot of a generation job.
    pub async fn job_status(&self, job_id: &str) -> Result<JobSnapshot, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/job/{job_id}")))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Hand a finished job to Printful.
    ///
    /// A refusal carrying a `detail` message is returned as
    /// [`ApiError::Rejected`] so the message can be shown verbatim.
    pub async fn create_product(&self, job_id: &str) -> Result<CreateProductResponse, ApiError> {
        let form = multipart::Form::new().text("job_id", job_id.to_string());

        let response = self
            .client
            .post(self.url("/api/printful/create-product"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorBody>(&body) {
                Ok(ErrorBody {
                    detail: Some(detail),
                    ..
                })
                | Ok(ErrorBody {
                    detail: None,
                    error: Some(detail),
                }) => ApiError::Rejected {
                    status: status.as_u16(),
                    detail,
                },
                _ => ApiError::Status {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        Self::parse_response(response).await
    }

    /// Read the current snapshot of a Printful mockup task.
    pub async fn mockup_status(&self, task_key: &str) -> Result<MockupSnapshot, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/api/printful/mockup-status/{task_key}")))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download a generated image. Relative URLs resolve against the base URL.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.client.get(self.resolve(url)).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            self.url(url)
        } else {
            format!("{}/{}", self.base_url, url)
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Status`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
