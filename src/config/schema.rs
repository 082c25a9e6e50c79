//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the resilience layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Analysis backend endpoints.
    pub backend: BackendConfig,

    /// Circuit breaker windows and the shared marker key.
    pub circuit: CircuitConfig,

    /// Persistent key-value store location.
    pub store: StoreConfig,

    /// Dirty-state reminder settings.
    pub reminders: ReminderConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Analysis backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// API base URL (e.g., "https://localhost:7000/api").
    pub base_url: String,

    /// Path of the capability-health endpoint, relative to `base_url`.
    pub status_path: String,

    /// Path prefix of the analysis endpoints, relative to `base_url`.
    pub analysis_path: String,

    /// Optional per-probe timeout. Absent means the probe has no deadline of its own.
    pub probe_timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:7000/api".to_string(),
            status_path: "/AIAnalysis/status".to_string(),
            analysis_path: "/AIAnalysis".to_string(),
            probe_timeout_secs: None,
        }
    }
}

impl BackendConfig {
    /// Full URL of the health endpoint.
    pub fn status_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.status_path)
    }

    /// Full URL of one analysis endpoint.
    pub fn analysis_url(&self, segment: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url.trim_end_matches('/'),
            self.analysis_path.trim_end_matches('/'),
            segment
        )
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Minimum time after a failed probe before probing again.
    pub retry_window_secs: u64,

    /// How long a healthy verdict is served from memory.
    pub cache_duration_secs: u64,

    /// How long an unhealthy verdict is served from memory.
    /// Values above `retry_window_secs` keep serving the verdict after the
    /// persisted marker has expired.
    pub negative_cache_secs: u64,

    /// Store key holding the persisted failure marker.
    pub marker_key: String,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            retry_window_secs: 60,
            cache_duration_secs: 300,
            negative_cache_secs: 60,
            marker_key: "analysis-backend:unavailable".to_string(),
        }
    }
}

impl CircuitConfig {
    pub fn retry_window(&self) -> Duration {
        Duration::from_secs(self.retry_window_secs)
    }

    pub fn cache_duration(&self) -> Duration {
        Duration::from_secs(self.cache_duration_secs)
    }

    pub fn negative_cache(&self) -> Duration {
        Duration::from_secs(self.negative_cache_secs)
    }
}

/// Key-value store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for the file-backed store. `None` keeps everything in memory.
    pub path: Option<String>,
}

/// Dirty-state reminder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Reminder period per registered module.
    pub period_secs: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self { period_secs: 30 }
    }
}

impl ReminderConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
