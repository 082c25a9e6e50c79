//! External notification channel.
//!
//! # Data Flow
//! ```text
//! tracking::registry (reminders, analysis wrapper)
//!     → NotificationChannel::send_progress_update
//!     → hub.rs (in-process broadcast) or any transport implementing the trait
//! ```
//!
//! # Design Decisions
//! - Fire-and-forget from the caller's side: errors are returned so they can
//!   be logged, never so they can be acted on
//! - Delivery and retry semantics belong to the transport

pub mod hub;
pub mod types;

use async_trait::async_trait;

pub use hub::{HubChannel, HubEvent, HubMessage};
pub use types::{module_display_name, AnalysisNotice, ChannelError, ProgressStage, ProgressUpdate};

/// Outbound push-notification transport.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Send a progress update for one assessment.
    async fn send_progress_update(&self, update: ProgressUpdate) -> Result<(), ChannelError>;

    /// Announce a finished analysis. Transports without such a message ignore it.
    async fn send_analysis_notification(&self, _notice: AnalysisNotice) -> Result<(), ChannelError> {
        Ok(())
    }
}
