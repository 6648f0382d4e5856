//! Delivery of archive bytes to an upload destination
//!
//! The destination is an opaque descriptor supplied by the client, usually a
//! presigned object-store URL. `memory://` descriptors are accepted without
//! any network I/O so local clients and tests can exercise the full flow.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{DirshareError, Result};

/// Descriptor prefix that short-circuits delivery to success.
pub const MEMORY_SCHEME: &str = "memory://";

/// Opaque upload destination, as sent in `presigned_url`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget(String);

impl UploadTarget {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self(descriptor.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the in-process test scheme
    pub fn is_in_memory(&self) -> bool {
        self.0.starts_with(MEMORY_SCHEME)
    }

    /// Descriptor safe to log: query string (signature) removed
    pub fn redacted(&self) -> &str {
        self.0.split('?').next().unwrap_or(&self.0)
    }
}

/// Receives finished archives
#[async_trait]
pub trait UploadSink: Send + Sync {
    /// Deliver the archive to `target`. `Ok(())` means the destination
    /// acknowledged the upload.
    async fn deliver(&self, archive: Vec<u8>, target: &UploadTarget) -> Result<()>;
}

/// Sink that PUTs archives to presigned URLs
pub struct PresignedUrlSink {
    client: reqwest::Client,
}

impl PresignedUrlSink {
    /// Create a sink with a request timeout suitable for large archives
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| DirshareError::Upload {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UploadSink for PresignedUrlSink {
    async fn deliver(&self, archive: Vec<u8>, target: &UploadTarget) -> Result<()> {
        if target.is_in_memory() {
            tracing::debug!(
                "In-memory target {}, discarding {} bytes",
                target.as_str(),
                archive.len()
            );
            return Ok(());
        }

        let size = archive.len();
        let response = self
            .client
            .put(target.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(archive)
            .send()
            .await
            .map_err(|e| DirshareError::Upload {
                message: e.to_string(),
            })?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                tracing::info!("Uploaded {} bytes to {}", size, target.redacted());
                Ok(())
            }
            status => Err(DirshareError::Upload {
                message: format!("unexpected status {} from {}", status, target.redacted()),
            }),
        }
    }
}
