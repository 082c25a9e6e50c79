//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows and periods > 0)
//! - Validate URLs, paths and addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use url::Url;

use crate::config::schema::GuardConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.backend.base_url) {
        Ok(url) if url.cannot_be_a_base() => {
            errors.push(ValidationError::new("backend.base_url", "must be an absolute URL"));
        }
        Ok(_) => {}
        Err(e) => {
            errors.push(ValidationError::new("backend.base_url", format!("invalid URL: {}", e)));
        }
    }

    if !config.backend.status_path.starts_with('/') {
        errors.push(ValidationError::new("backend.status_path", "must start with '/'"));
    }
    if !config.backend.analysis_path.starts_with('/') {
        errors.push(ValidationError::new("backend.analysis_path", "must start with '/'"));
    }
    if config.backend.probe_timeout_secs == Some(0) {
        errors.push(ValidationError::new("backend.probe_timeout_secs", "must be > 0 when set"));
    }

    if config.circuit.retry_window_secs == 0 {
        errors.push(ValidationError::new("circuit.retry_window_secs", "must be > 0"));
    }
    if config.circuit.cache_duration_secs == 0 {
        errors.push(ValidationError::new("circuit.cache_duration_secs", "must be > 0"));
    }
    if config.circuit.negative_cache_secs == 0 {
        errors.push(ValidationError::new("circuit.negative_cache_secs", "must be > 0"));
    }
    if config.circuit.marker_key.trim().is_empty() {
        errors.push(ValidationError::new("circuit.marker_key", "must not be empty"));
    }

    if config.reminders.period_secs == 0 {
        errors.push(ValidationError::new("reminders.period_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GuardConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GuardConfig::default();
        config.backend.base_url = "not a url".into();
        config.circuit.retry_window_secs = 0;
        config.reminders.period_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["backend.base_url", "circuit.retry_window_secs", "reminders.period_secs"]
        );
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = GuardConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "observability.metrics_address");
    }
}
