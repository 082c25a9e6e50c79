//! Client-side resilience layer for the assessment analysis backend.
//!
//! A persistent circuit breaker in front of the AI analysis service, plus
//! dirty-state tracking with unsaved-changes reminders and analysis progress
//! notifications.

pub mod config;
pub mod gateway;
pub mod lifecycle;
pub mod notify;
pub mod observability;
pub mod resilience;
pub mod store;
pub mod tracking;

pub use config::schema::GuardConfig;
pub use gateway::{AnalysisGateway, AnalysisKind, AnalysisResponse};
pub use lifecycle::{Services, Shutdown};
pub use notify::{HubChannel, NotificationChannel};
pub use resilience::{AvailabilityCircuitBreaker, CircuitMode, CircuitRecord};
pub use tracking::DirtyStateRegistry;
