//! Client for surge.sh static hosting.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::archive::pack;
use crate::DeployError;

/// Default surge API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://surge.surge.sh";

/// Environment variable the token is read from by default.
pub const DEFAULT_TOKEN_ENV: &str = "SURGE_TOKEN";

/// Result of a publish.
#[derive(Debug, Clone)]
pub struct DeployReport {
    /// Domain the project was published to
    pub domain: String,

    /// Number of files uploaded
    pub file_count: usize,

    /// Uncompressed size in bytes
    pub project_size: u64,
}

/// Uploads project directories to surge.
#[derive(Debug, Clone)]
pub struct SurgeClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl SurgeClient {
    /// Create a client for an endpoint with an API token.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Create a client, reading the token from the named environment variable.
    pub fn from_env(endpoint: impl Into<String>, token_env: &str) -> Result<Self, DeployError> {
        match std::env::var(token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(Self::new(endpoint, token.trim())),
            _ => Err(DeployError::MissingToken(token_env.to_string())),
        }
    }

    /// Pack `project` and publish it at `domain`.
    pub async fn publish(&self, project: &Path, domain: &str) -> Result<DeployReport, DeployError> {
        let archive = pack(project)?;
        let url = format!("{}/{}", self.endpoint, domain);

        tracing::info!(
            "Uploading {} files ({} bytes) to {}",
            archive.file_count,
            archive.project_size,
            domain
        );

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let response = self
            .http
            .put(&url)
            .basic_auth("token", Some(&self.token))
            .header("version", env!("CARGO_PKG_VERSION"))
            .header("file-count", archive.file_count.to_string())
            .header("project-size", archive.project_size.to_string())
            .header("timestamp", timestamp.to_string())
            .header("content-type", "application/gzip")
            .body(archive.bytes)
            .send()
            .await
            .map_err(|e| DeployError::RequestError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeployError::RequestError(e.to_string()))?;

        if !status.is_success() {
            return Err(DeployError::Rejected {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        check_progress(&body)?;

        tracing::info!("Published to https://{}", domain);

        Ok(DeployReport {
            domain: domain.to_string(),
            file_count: archive.file_count,
            project_size: archive.project_size,
        })
    }
}

/// Scan the newline-delimited JSON progress stream for reported errors.
fn check_progress(body: &str) -> Result<(), DeployError> {
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        tracing::debug!("surge: {}", line);

        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        if value.get("type").and_then(|t| t.as_str()) == Some("error") {
            let message = value
                .get("messages")
                .map(|m| m.to_string())
                .unwrap_or_else(|| line.to_string());
            return Err(DeployError::Rejected {
                status: 200,
                message,
            });
        }
    }
    Ok(())
}
