//! In-process notification hub.
//!
//! Broadcasts every update to whoever is subscribed at send time, stamped
//! with an id and a timestamp the way the remote hub stamps its messages.

use async_trait::async_trait;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::notify::types::{AnalysisNotice, ChannelError, ProgressUpdate};
use crate::notify::NotificationChannel;

/// Payload of a hub message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubEvent {
    Progress(ProgressUpdate),
    Analysis(AnalysisNotice),
}

/// A message delivered to hub subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct HubMessage {
    pub id: Uuid,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub event: HubEvent,
}

/// Broadcast-backed `NotificationChannel`.
#[derive(Debug, Clone)]
pub struct HubChannel {
    tx: broadcast::Sender<HubMessage>,
}

impl HubChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubMessage> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn publish(&self, event: HubEvent) -> Result<(), ChannelError> {
        let message = HubMessage {
            id: Uuid::new_v4(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            event,
        };
        self.tx
            .send(message)
            .map(|_| ())
            .map_err(|_| ChannelError::NoSubscribers)
    }
}

impl Default for HubChannel {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl NotificationChannel for HubChannel {
    async fn send_progress_update(&self, update: ProgressUpdate) -> Result<(), ChannelError> {
        self.publish(HubEvent::Progress(update))
    }

    async fn send_analysis_notification(&self, notice: AnalysisNotice) -> Result<(), ChannelError> {
        self.publish(HubEvent::Analysis(notice))
    }
}
