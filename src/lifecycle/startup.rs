//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every service from a validated `GuardConfig`
//! - Wire them in dependency order: store → probe → breaker → gateway, channel → registry
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;
use thiserror::Error;

use crate::config::{GuardConfig, StoreConfig};
use crate::gateway::{AnalysisGateway, GatewayError, HttpAnalysisBackend};
use crate::notify::NotificationChannel;
use crate::resilience::{AvailabilityCircuitBreaker, HttpHealthProbe, ProbeError, SystemClock};
use crate::store::{FileStore, KeyValueStore, MemoryStore, StoreError};
use crate::tracking::DirtyStateRegistry;

/// Failure while building services.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to build health probe: {0}")]
    Probe(#[from] ProbeError),

    #[error("failed to build analysis backend: {0}")]
    Gateway(#[from] GatewayError),
}

/// The wired service graph for one process.
pub struct Services {
    pub config: GuardConfig,
    pub store: Arc<dyn KeyValueStore>,
    pub breaker: Arc<AvailabilityCircuitBreaker>,
    pub gateway: AnalysisGateway,
    pub registry: DirtyStateRegistry,
}

impl Services {
    /// Build services from `config`, sending notifications through `channel`.
    pub fn from_config(config: GuardConfig, channel: Arc<dyn NotificationChannel>) -> Result<Self, StartupError> {
        let store = open_store(&config.store)?;

        let probe = HttpHealthProbe::new(&config.backend)?;
        tracing::info!(url = %probe.url(), "Health probe configured");

        let breaker = Arc::new(AvailabilityCircuitBreaker::new(
            store.clone(),
            Arc::new(probe),
            Arc::new(SystemClock),
            config.circuit.clone(),
        ));

        let backend = HttpAnalysisBackend::new(config.backend.clone())?;
        let gateway = AnalysisGateway::new(breaker.clone(), Arc::new(backend));

        let registry = DirtyStateRegistry::new(channel, &config.reminders);

        tracing::info!(
            retry_window_secs = config.circuit.retry_window_secs,
            cache_duration_secs = config.circuit.cache_duration_secs,
            reminder_period_secs = config.reminders.period_secs,
            "Services initialized"
        );

        Ok(Self {
            config,
            store,
            breaker,
            gateway,
            registry,
        })
    }

    /// Cancel all reminder timers and drop tracking state.
    pub fn dispose(&self) {
        self.registry.dispose();
        tracing::info!("Services disposed");
    }
}

fn open_store(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    match &config.path {
        Some(path) => {
            let store = FileStore::open(path)?;
            tracing::info!(path = %path, "Using file-backed store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
