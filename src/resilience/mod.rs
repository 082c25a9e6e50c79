//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Analysis call:
//!     → circuit_breaker.rs (read shared marker, then in-memory cache)
//!     → probe.rs (single health check, only when no window applies)
//!     → store (persist failure marker for other processes)
//! ```
//!
//! # Design Decisions
//! - Expected degradation is a value (ProbeOutcome), not an error
//! - Time comes from clock.rs so windows are testable without sleeping
//! - Failure state is shared through the store, success state stays local

pub mod circuit_breaker;
pub mod clock;
pub mod probe;

pub use circuit_breaker::{
    AvailabilityCircuitBreaker, BreakerError, BreakerResult, Capabilities, Capability,
    CapabilityReport, CircuitMode, CircuitRecord, PersistedFailureMarker,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use probe::{HealthProbe, HttpHealthProbe, ProbeError, ProbeOutcome};
