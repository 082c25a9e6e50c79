//! Analysis gateway.
//!
//! # Data Flow
//! ```text
//! caller ── analyze(kind, request) ──→ breaker.get_capabilities()
//!                                         ├─ Available   → AnalysisBackend (HTTP POST)
//!                                         └─ otherwise   → Simulated response, no network
//! ```
//!
//! # Design Decisions
//! - Every outbound analysis call asks the breaker first
//! - Degraded mode is a normal response variant, not an error

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::resilience::{AvailabilityCircuitBreaker, BreakerError, Capability, CircuitMode};

/// The analyses the backend offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisKind {
    BusinessContext,
    Architecture,
    Infrastructure,
    DataArchitecture,
    DevOps,
    Security,
    CloudReadiness,
    Recommendations,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 8] = [
        AnalysisKind::BusinessContext,
        AnalysisKind::Architecture,
        AnalysisKind::Infrastructure,
        AnalysisKind::DataArchitecture,
        AnalysisKind::DevOps,
        AnalysisKind::Security,
        AnalysisKind::CloudReadiness,
        AnalysisKind::Recommendations,
    ];

    /// Endpoint segment under the analysis path.
    pub fn segment(self) -> &'static str {
        match self {
            AnalysisKind::BusinessContext => "business-context",
            AnalysisKind::Architecture => "architecture",
            AnalysisKind::Infrastructure => "infrastructure",
            AnalysisKind::DataArchitecture => "data-architecture",
            AnalysisKind::DevOps => "devops",
            AnalysisKind::Security => "security",
            AnalysisKind::CloudReadiness => "cloud-readiness",
            AnalysisKind::Recommendations => "recommendations",
        }
    }

    /// Operation name used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            AnalysisKind::BusinessContext => "Business context analysis",
            AnalysisKind::Architecture => "Architecture analysis",
            AnalysisKind::Infrastructure => "Infrastructure analysis",
            AnalysisKind::DataArchitecture => "Data architecture analysis",
            AnalysisKind::DevOps => "DevOps analysis",
            AnalysisKind::Security => "Security analysis",
            AnalysisKind::CloudReadiness => "Cloud readiness analysis",
            AnalysisKind::Recommendations => "Recommendations generation",
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.segment())
    }
}

/// Gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("availability check failed: {0}")]
    Breaker(#[from] BreakerError),

    #[error("capability not available: {0}")]
    CapabilityUnavailable(Capability),

    #[error("analysis request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{label} failed: {status}")]
    Status { label: &'static str, status: u16 },
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// What an analysis call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisResponse {
    /// Text returned by the live backend.
    Production(String),
    /// Backend was not called; the caller should use its local fallback.
    Simulated { kind: AnalysisKind, mode: CircuitMode },
}

impl AnalysisResponse {
    pub fn is_production(&self) -> bool {
        matches!(self, AnalysisResponse::Production(_))
    }
}

/// Transport to the analysis service.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(&self, kind: AnalysisKind, request: &serde_json::Value) -> GatewayResult<String>;
}

/// `POST {base_url}{analysis_path}/{segment}` with a JSON body.
pub struct HttpAnalysisBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpAnalysisBackend {
    pub fn new(config: BackendConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent("assessment-guard")
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisBackend {
    async fn analyze(&self, kind: AnalysisKind, request: &serde_json::Value) -> GatewayResult<String> {
        let url = self.config.analysis_url(kind.segment());
        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = %status, kind = %kind, "Analysis request rejected");
            return Err(GatewayError::Status {
                label: kind.label(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Routes analysis calls through the circuit breaker.
pub struct AnalysisGateway {
    breaker: Arc<AvailabilityCircuitBreaker>,
    backend: Arc<dyn AnalysisBackend>,
}

impl AnalysisGateway {
    pub fn new(breaker: Arc<AvailabilityCircuitBreaker>, backend: Arc<dyn AnalysisBackend>) -> Self {
        Self { breaker, backend }
    }

    pub fn breaker(&self) -> &Arc<AvailabilityCircuitBreaker> {
        &self.breaker
    }

    /// Run one analysis, or return a simulated marker when the backend is not Available.
    pub async fn analyze(&self, kind: AnalysisKind, request: &serde_json::Value) -> GatewayResult<AnalysisResponse> {
        let report = self.breaker.get_capabilities().await;
        if !report.available {
            tracing::info!(kind = %kind, mode = %report.mode, "Backend not available, using simulated analysis");
            return Ok(AnalysisResponse::Simulated {
                kind,
                mode: report.mode,
            });
        }

        let text = self.backend.analyze(kind, request).await?;
        tracing::debug!(kind = %kind, bytes = text.len(), "Production analysis received");
        Ok(AnalysisResponse::Production(text))
    }

    /// Fail with `CapabilityUnavailable` unless `capability` is currently on.
    pub async fn require(&self, capability: Capability) -> GatewayResult<()> {
        let record = self.breaker.get_status().await?;
        if record.capabilities.get(capability) {
            Ok(())
        } else {
            Err(GatewayError::CapabilityUnavailable(capability))
        }
    }
}
