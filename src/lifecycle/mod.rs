//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build store, probe, breaker, gateway, registry
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Notify long-running tasks → dispose() timers → Exit
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl-C) → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then services in dependency order
//! - No global state: every service lives inside `Services`
//! - Disposal is explicit and cancels every reminder timer

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Services, StartupError};
