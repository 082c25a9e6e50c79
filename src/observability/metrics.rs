//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_probes_total` (counter): health probes by outcome
//! - `guard_short_circuits_total` (counter): status answers served without a probe, by reason
//! - `guard_circuit_mode` (gauge): 0=unknown, 1=available, 2=unavailable
//! - `guard_reminders_total` (counter): unsaved-changes reminders delivered
//! - `guard_notification_failures_total` (counter): channel failures by stage
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op, so library users
//!   and tests pay nothing
//! - Exporter is only installed by the binary

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::resilience::CircuitMode;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_probe(outcome: &'static str) {
    counter!("guard_probes_total", "outcome" => outcome).increment(1);
}

pub fn record_short_circuit(reason: &'static str) {
    counter!("guard_short_circuits_total", "reason" => reason).increment(1);
}

pub fn record_circuit_mode(mode: CircuitMode) {
    gauge!("guard_circuit_mode").set(mode.as_gauge());
}

pub fn record_reminder_sent() {
    counter!("guard_reminders_total").increment(1);
}

pub fn record_notification_failure(stage: &'static str) {
    counter!("guard_notification_failures_total", "stage" => stage).increment(1);
}
