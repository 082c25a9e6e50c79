//! Availability circuit breaker for the analysis backend.
//!
//! # Decision Order (every `get_status` call)
//! ```text
//! 1. persisted failure marker younger than retry window → Unavailable, no probe
//!    marker older than retry window                     → delete it, continue
//! 2. in-memory record still fresh                       → return it
//! 3. same-instance "recently unavailable" flag active   → Unavailable, no probe
//! 4. live probe
//!    Healthy                        → Available, clear flag, cache
//!    Unhealthy / NotFound / Unreachable → Unavailable, persist marker, set flag, cache
//!    ProbeError                     → propagate, nothing cached or persisted
//! ```
//!
//! # Design Decisions
//! - The persisted marker is what other processes see; it is read on every call
//! - Available records are fresh for `cache_duration`, Unavailable ones for
//!   `negative_cache`
//! - No lock around the probe: concurrent callers may each probe, and the
//!   last result written wins
//! - Unavailable always means document processing and real-time analysis are off

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::config::CircuitConfig;
use crate::observability::metrics;
use crate::resilience::clock::Clock;
use crate::resilience::probe::{HealthProbe, ProbeError, ProbeOutcome};
use crate::store::{KeyValueStore, StoreError};

/// Verdict about the analysis backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitMode {
    Unknown,
    Available,
    Unavailable,
}

impl CircuitMode {
    /// Numeric form for the mode gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitMode::Unknown => 0.0,
            CircuitMode::Available => 1.0,
            CircuitMode::Unavailable => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitMode::Unknown => write!(f, "Unknown"),
            CircuitMode::Available => write!(f, "Available"),
            CircuitMode::Unavailable => write!(f, "Unavailable"),
        }
    }
}

/// A named sub-feature of the analysis backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    BusinessAnalysis,
    DocumentProcessing,
    RealTimeAnalysis,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::BusinessAnalysis => write!(f, "businessAnalysis"),
            Capability::DocumentProcessing => write!(f, "documentProcessing"),
            Capability::RealTimeAnalysis => write!(f, "realTimeAnalysis"),
        }
    }
}

/// Which sub-features are usable in the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub business_analysis: bool,
    pub document_processing: bool,
    pub real_time_analysis: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            business_analysis: true,
            document_processing: true,
            real_time_analysis: true,
        }
    }

    /// Degraded mode: business analysis keeps working against simulated output.
    pub fn degraded() -> Self {
        Self {
            business_analysis: true,
            document_processing: false,
            real_time_analysis: false,
        }
    }

    pub fn none() -> Self {
        Self {
            business_analysis: false,
            document_processing: false,
            real_time_analysis: false,
        }
    }

    pub fn get(&self, capability: Capability) -> bool {
        match capability {
            Capability::BusinessAnalysis => self.business_analysis,
            Capability::DocumentProcessing => self.document_processing,
            Capability::RealTimeAnalysis => self.real_time_analysis,
        }
    }
}

/// Cached verdict for the analysis backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitRecord {
    pub mode: CircuitMode,
    pub capabilities: Capabilities,
    /// Milliseconds since the Unix epoch.
    pub observed_at: u64,
}

impl CircuitRecord {
    pub fn unknown() -> Self {
        Self {
            mode: CircuitMode::Unknown,
            capabilities: Capabilities::none(),
            observed_at: 0,
        }
    }

    pub fn available(observed_at: u64) -> Self {
        Self {
            mode: CircuitMode::Available,
            capabilities: Capabilities::all(),
            observed_at,
        }
    }

    pub fn unavailable(observed_at: u64) -> Self {
        Self {
            mode: CircuitMode::Unavailable,
            capabilities: Capabilities::degraded(),
            observed_at,
        }
    }
}

/// Value stored under the marker key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedFailureMarker {
    /// When unavailability was first observed (ms since epoch).
    pub timestamp: u64,
}

/// Formatted view handed to analysis callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityReport {
    pub available: bool,
    pub mode: CircuitMode,
    pub capabilities: Capabilities,
}

impl From<CircuitRecord> for CapabilityReport {
    fn from(record: CircuitRecord) -> Self {
        Self {
            available: record.mode == CircuitMode::Available,
            mode: record.mode,
            capabilities: record.capabilities,
        }
    }
}

/// Errors surfaced by `get_status`.
#[derive(Debug, Error)]
pub enum BreakerError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// Result type for breaker operations.
pub type BreakerResult<T> = Result<T, BreakerError>;

/// Decides whether to probe the analysis backend or answer from cache.
pub struct AvailabilityCircuitBreaker {
    store: Arc<dyn KeyValueStore>,
    probe: Arc<dyn HealthProbe>,
    clock: Arc<dyn Clock>,
    config: CircuitConfig,
    cache: Mutex<Option<CircuitRecord>>,
    /// Same-instance backstop for the persisted marker.
    unavailable_since: Mutex<Option<u64>>,
}

impl AvailabilityCircuitBreaker {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        probe: Arc<dyn HealthProbe>,
        clock: Arc<dyn Clock>,
        config: CircuitConfig,
    ) -> Self {
        Self {
            store,
            probe,
            clock,
            config,
            cache: Mutex::new(None),
            unavailable_since: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Current verdict, probing only when no window covers this call.
    pub async fn get_status(&self) -> BreakerResult<CircuitRecord> {
        let now = self.clock.now_millis();

        // 1. Shared marker
        if let Some(marker) = self.read_marker() {
            if self.within_retry_window(marker.timestamp, now) {
                let record = CircuitRecord::unavailable(marker.timestamp);
                self.store_record(record);
                metrics::record_short_circuit("persisted_marker");
                tracing::debug!(
                    marker_age_ms = now.saturating_sub(marker.timestamp),
                    "Analysis backend inside retry window, skipping probe"
                );
                return Ok(record);
            }
            tracing::debug!(marker_ts = marker.timestamp, "Failure marker expired, removing");
            self.remove_marker();
        }

        // 2. In-memory cache
        let cached = *lock(&self.cache);
        if let Some(record) = cached {
            if self.is_fresh(&record, now) {
                metrics::record_short_circuit("cache");
                return Ok(record);
            }
        }

        // 3. Same-instance backstop
        let recent_failure = *lock(&self.unavailable_since);
        if let Some(since) = recent_failure {
            if self.within_retry_window(since, now) {
                let record = CircuitRecord::unavailable(since);
                self.store_record(record);
                metrics::record_short_circuit("recent_failure");
                return Ok(record);
            }
        }

        // 4. Live probe
        let outcome = match self.probe.probe().await {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::record_probe("error");
                tracing::error!(error = %e, "Health probe failed unexpectedly");
                return Err(e.into());
            }
        };
        metrics::record_probe(outcome.label());

        let observed_at = self.clock.now_millis();
        let record = match &outcome {
            ProbeOutcome::Healthy => {
                *lock(&self.unavailable_since) = None;
                CircuitRecord::available(observed_at)
            }
            degraded => {
                tracing::warn!(
                    outcome = degraded.label(),
                    detail = ?degraded,
                    "Analysis backend unavailable, switching to degraded mode"
                );
                *lock(&self.unavailable_since) = Some(observed_at);
                self.write_marker(observed_at);
                CircuitRecord::unavailable(observed_at)
            }
        };
        self.store_record(record);
        Ok(record)
    }

    /// `true` when the backend is Available. Unexpected probe errors count as unavailable.
    pub async fn is_available(&self) -> bool {
        match self.get_status().await {
            Ok(record) => record.mode == CircuitMode::Available,
            Err(e) => {
                tracing::warn!(error = %e, "Availability check failed");
                false
            }
        }
    }

    /// Capability view of the current status.
    pub async fn get_capabilities(&self) -> CapabilityReport {
        match self.get_status().await {
            Ok(record) => record.into(),
            Err(e) => {
                tracing::warn!(error = %e, "Capabilities check failed");
                CapabilityReport {
                    available: false,
                    mode: CircuitMode::Unavailable,
                    capabilities: Capabilities::none(),
                }
            }
        }
    }

    /// `true` while a recent failure (shared or local) forbids probing.
    pub fn should_skip_live_calls(&self) -> bool {
        let now = self.clock.now_millis();
        let marker_active = self
            .read_marker()
            .is_some_and(|m| self.within_retry_window(m.timestamp, now));
        let recent_failure = *lock(&self.unavailable_since);
        let local_active = recent_failure.is_some_and(|since| self.within_retry_window(since, now));
        marker_active || local_active
    }

    /// Last record this instance saw, without touching the store or network.
    pub fn last_known(&self) -> CircuitRecord {
        let cached = *lock(&self.cache);
        cached.unwrap_or_else(CircuitRecord::unknown)
    }

    fn within_retry_window(&self, since: u64, now: u64) -> bool {
        now.saturating_sub(since) < self.config.retry_window().as_millis() as u64
    }

    fn is_fresh(&self, record: &CircuitRecord, now: u64) -> bool {
        let ttl = match record.mode {
            CircuitMode::Available => self.config.cache_duration(),
            CircuitMode::Unavailable => self.config.negative_cache(),
            CircuitMode::Unknown => return false,
        };
        now.saturating_sub(record.observed_at) < ttl.as_millis() as u64
    }

    fn store_record(&self, record: CircuitRecord) {
        let previous = lock(&self.cache).replace(record);
        let previous_mode = previous.map(|r| r.mode).unwrap_or(CircuitMode::Unknown);
        if previous_mode != record.mode {
            tracing::info!(from = %previous_mode, to = %record.mode, "Analysis backend mode changed");
        }
        metrics::record_circuit_mode(record.mode);
    }

    fn read_marker(&self) -> Option<PersistedFailureMarker> {
        let raw = match self.store.get(&self.config.marker_key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read failure marker");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(marker) => Some(marker),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding corrupt failure marker");
                self.remove_marker();
                None
            }
        }
    }

    fn write_marker(&self, timestamp: u64) {
        let marker = PersistedFailureMarker { timestamp };
        let result = serde_json::to_string(&marker)
            .map_err(StoreError::from)
            .and_then(|raw| self.store.set(&self.config.marker_key, &raw));
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist failure marker");
        }
    }

    fn remove_marker(&self) {
        if let Err(e) = self.store.remove(&self.config.marker_key) {
            tracing::warn!(error = %e, "Failed to remove failure marker");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
