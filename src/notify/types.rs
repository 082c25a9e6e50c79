//! Notification message types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Event tag carried by a progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    DirtySaveReminder,
    AiAnalysisStarted,
    AiAnalysisCompleted,
    AiAnalysisFailed,
}

impl ProgressStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStage::DirtySaveReminder => "dirty_save_reminder",
            ProgressStage::AiAnalysisStarted => "ai_analysis_started",
            ProgressStage::AiAnalysisCompleted => "ai_analysis_completed",
            ProgressStage::AiAnalysisFailed => "ai_analysis_failed",
        }
    }
}

impl std::fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(assessmentId, eventType, percent, message)` sent to the external channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub assessment_id: String,
    pub stage: ProgressStage,
    /// 0–100.
    pub percent: u8,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(
        assessment_id: impl Into<String>,
        stage: ProgressStage,
        percent: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            assessment_id: assessment_id.into(),
            stage,
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// Summary broadcast after an analysis completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisNotice {
    pub module: String,
    pub assessment_name: Option<String>,
    pub duration: Option<String>,
}

/// Errors a channel may report. Callers log and drop them.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Nobody is listening.
    #[error("no subscribers connected")]
    NoSubscribers,

    /// Delivery failed in the transport.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Human-readable name for an assessment module.
pub fn module_display_name(module: &str) -> &str {
    match module {
        "infrastructure" => "Infrastructure Assessment",
        "security" => "Security Assessment",
        "devops" => "DevOps Assessment",
        "data-architecture" => "Data Architecture Assessment",
        "architecture" => "Architecture Review",
        "business-context" => "Business Context",
        "cloud-readiness" => "Cloud Readiness",
        "recommendations" => "Recommendations",
        other => other,
    }
}
