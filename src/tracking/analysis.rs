//! AI-analysis progress wrapper.
//!
//! Wraps one unit of analysis work with started/completed/failed
//! notifications. The work itself is never retried here.

use std::fmt::Display;
use std::future::Future;
use tokio::time::Instant;

use crate::notify::{module_display_name, AnalysisNotice, ProgressStage, ProgressUpdate};
use crate::tracking::DirtyStateRegistry;

impl DirtyStateRegistry {
    /// Run `analysis` and report its progress for `(assessment_id, module)`.
    ///
    /// Sends "started" before the call, then either an analysis notice plus
    /// "completed" with the elapsed whole seconds, or "failed" with the error
    /// text. The error is returned unchanged. Channel failures are logged only.
    pub async fn start_ai_analysis<F, Fut, T, E>(
        &self,
        assessment_id: &str,
        module: &str,
        analysis: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let name = module_display_name(module);

        self.inner
            .deliver(ProgressUpdate::new(
                assessment_id,
                ProgressStage::AiAnalysisStarted,
                0,
                format!("Starting {name} AI analysis..."),
            ))
            .await;

        let started = Instant::now();
        match analysis().await {
            Ok(value) => {
                let secs = rounded_secs(started.elapsed());
                tracing::info!(assessment = %assessment_id, module = %module, secs, "AI analysis completed");

                self.inner
                    .deliver_notice(AnalysisNotice {
                        module: module.to_string(),
                        assessment_name: Some(format!("Assessment {assessment_id}")),
                        duration: Some(format!("{secs}s")),
                    })
                    .await;
                self.inner
                    .deliver(ProgressUpdate::new(
                        assessment_id,
                        ProgressStage::AiAnalysisCompleted,
                        100,
                        format!("{name} AI analysis completed in {secs}s"),
                    ))
                    .await;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(assessment = %assessment_id, module = %module, error = %e, "AI analysis failed");

                self.inner
                    .deliver(ProgressUpdate::new(
                        assessment_id,
                        ProgressStage::AiAnalysisFailed,
                        0,
                        format!("{name} AI analysis failed: {e}"),
                    ))
                    .await;
                Err(e)
            }
        }
    }
}

/// Whole seconds, half rounding up.
fn rounded_secs(elapsed: std::time::Duration) -> u64 {
    (elapsed.as_secs() * 1000 + u64::from(elapsed.subsec_millis()) + 500) / 1000
}
