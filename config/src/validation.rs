//! # Configuration Validation
//!
//! Validation entry point for [`Config`] using the `validator` crate.

use crate::config::Config;
use validator::Validate;

/// Validate configuration structure.
///
/// ## Validation Rules
/// - `reporter.component_name`: 1-255 characters
/// - `dedup.ttl_seconds`: 1-86400
/// - `dedup.sweep_threshold`: at least 1
/// - `attribution.local_id_max`: at least 1
/// - `registration.window_seconds`: at most 3600
/// - `registration.interval_ms`: 10-60000
/// - `capture.flush_timeout_ms`: at most 60000
/// - `observability.logging_level`: "trace", "debug", "info", "warn" or "error"
pub fn validate(config: &Config) -> Result<(), validator::ValidationErrors> {
    config.validate()
}
