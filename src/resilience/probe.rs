//! Capability health probing.
//!
//! # Responsibilities
//! - Perform one idempotent health check against the analysis backend
//! - Classify the result into expected degradation vs. unexpected failure
//!
//! # Classification
//! ```text
//! 2xx + serviceAvailable=true   → Healthy
//! 2xx + serviceAvailable=false  → Unhealthy
//! 404                           → NotFound
//! other status                  → Unhealthy
//! connect/transport failure     → Unreachable
//! 2xx with unparseable body     → ProbeError::Unexpected
//! ```

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::BackendConfig;

/// Result of a probe that reached a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Backend reachable and reports itself available.
    Healthy,
    /// Backend reachable but degraded.
    Unhealthy(String),
    /// Health endpoint does not exist.
    NotFound,
    /// Host unreachable or transport aborted.
    Unreachable(String),
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy)
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::Healthy => "healthy",
            ProbeOutcome::Unhealthy(_) => "unhealthy",
            ProbeOutcome::NotFound => "not_found",
            ProbeOutcome::Unreachable(_) => "unreachable",
        }
    }
}

/// A probe failure that does not match any known degradation pattern.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("unexpected probe failure: {0}")]
    Unexpected(String),
}

/// Health endpoint payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub service_available: bool,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// A single health check.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Result<ProbeOutcome, ProbeError>;
}

/// Probe that issues `GET {base_url}{status_path}`.
pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpHealthProbe {
    pub fn new(config: &BackendConfig) -> Result<Self, ProbeError> {
        let mut builder = reqwest::Client::builder().user_agent("assessment-guard-health-check");
        if let Some(secs) = config.probe_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ProbeError::Unexpected(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.status_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self) -> Result<ProbeOutcome, ProbeError> {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return Err(ProbeError::Unexpected(format!("invalid health request: {}", e)));
            }
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Health probe failed: connection error");
                return Ok(ProbeOutcome::Unreachable(e.to_string()));
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::warn!(url = %self.url, "Health probe failed: endpoint not found");
            return Ok(ProbeOutcome::NotFound);
        }
        if !status.is_success() {
            tracing::warn!(url = %self.url, status = %status, "Health probe failed: non-success status");
            return Ok(ProbeOutcome::Unhealthy(format!("status {}", status)));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Health probe failed: body aborted");
                return Ok(ProbeOutcome::Unreachable(e.to_string()));
            }
        };

        let report: HealthReport = serde_json::from_slice(&body)
            .map_err(|e| ProbeError::Unexpected(format!("malformed health payload: {}", e)))?;

        if report.service_available {
            Ok(ProbeOutcome::Healthy)
        } else {
            let mode = report.mode.unwrap_or_else(|| "unknown".to_string());
            Ok(ProbeOutcome::Unhealthy(format!("backend reports mode {}", mode)))
        }
    }
}
