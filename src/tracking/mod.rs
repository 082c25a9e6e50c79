//! Dirty-state tracking and AI-analysis progress.
//!
//! # Data Flow
//! ```text
//! editor ── register_module / set_dirty ──→ registry.rs
//!                                               ├─→ bus.rs (module + assessment subscribers)
//!                                               └─→ reminders.rs ──tick──→ NotificationChannel
//! caller ── start_ai_analysis(fn) ──→ analysis.rs ──started/completed/failed──→ NotificationChannel
//! ```
//!
//! # Design Decisions
//! - Subscribers are notified on edges; reminders fire on levels
//! - Reminder timers hold only a weak reference to the registry
//! - Notification failures never reach the editor

pub mod analysis;
pub mod bus;
pub mod registry;
pub mod reminders;

/// `(assessment id, module name)`.
pub type ModuleKey = (String, String);

pub use bus::{EventBus, Handler, SubscriptionId};
pub use registry::{
    AssessmentDirtyState, AssessmentHandler, DirtyStateRegistry, ModuleHandler, Subscription,
};
pub use reminders::ReminderScheduler;
