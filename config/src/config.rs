//! # Configuration Structures
//!
//! This module defines all configuration structures for the faultline
//! error-reporting bridge.
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization with per-field defaults
//! - Use `validator` for input validation

use fl_core::Severity;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Component name the capture crate reports under when no origin is known.
pub const DEFAULT_COMPONENT_NAME: &str = "capture";

/// Main configuration structure for the bridge.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Aggregates the settings of every pipeline stage: reporter identity, dedup
/// window, attribution rules, channel self-registration, capture threshold and
/// the bridge's own observability.
///
/// ## Usage
/// ```rust,no_run
/// use config::Config;
///
/// let config = Config::default();
/// println!("Dedup window: {}s", config.dedup.ttl_seconds);
/// ```
///
/// ## Validation
/// All nested configurations must pass their own validation rules.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct Config {
    /// Reporter identity (component name, user, environment, release)
    #[serde(default)]
    #[validate(nested)]
    pub reporter: ReporterConfig,

    /// Repeat suppression window
    #[serde(default)]
    #[validate(nested)]
    pub dedup: DedupConfig,

    /// Origin attribution rules
    #[serde(default)]
    #[validate(nested)]
    pub attribution: AttributionConfig,

    /// Logging sub-channel self-registration
    #[serde(default)]
    #[validate(nested)]
    pub registration: RegistrationConfig,

    /// Capture threshold and shutdown flushing
    #[serde(default)]
    #[validate(nested)]
    pub capture: CaptureConfig,

    /// Metrics and log level of the bridge itself
    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

/// Identity of the reporting client.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ReporterConfig {
    /// Name of the bridge's own component. Faults logged under this name are
    /// re-attributed from their stack.
    #[serde(default = "default_component_name")]
    #[validate(length(min = 1, max = 255))]
    pub component_name: String,

    /// User identity attached to every report
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub release: Option<String>,
}

fn default_component_name() -> String {
    DEFAULT_COMPONENT_NAME.to_string()
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            component_name: default_component_name(),
            user_id: None,
            environment: None,
            release: None,
        }
    }
}

/// Dedup window settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct DedupConfig {
    /// How long a reported fingerprint suppresses repeats
    #[serde(default = "default_dedup_ttl_seconds")]
    #[validate(range(min = 1, max = 86400))]
    pub ttl_seconds: u64,

    /// Entry count above which an insert also drops expired entries
    #[serde(default = "default_dedup_sweep_threshold")]
    #[validate(range(min = 1))]
    pub sweep_threshold: usize,
}

fn default_dedup_ttl_seconds() -> u64 {
    60
}

fn default_dedup_sweep_threshold() -> usize {
    1024
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_dedup_ttl_seconds(),
            sweep_threshold: default_dedup_sweep_threshold(),
        }
    }
}

/// Origin attribution settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct AttributionConfig {
    /// Components never blamed for a fault, on top of the bridge itself
    #[serde(default = "default_attribution_exclusions")]
    pub exclusions: Vec<String>,

    /// Registry ids in `(0, local_id_max)` are published; others are local builds
    #[serde(default = "default_local_id_max")]
    #[validate(range(min = 1))]
    pub local_id_max: i64,
}

fn default_attribution_exclusions() -> Vec<String> {
    ["fl_core", "tracing", "tracing_core", "tracing_subscriber", "log"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_local_id_max() -> i64 {
    1000
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            exclusions: default_attribution_exclusions(),
            local_id_max: default_local_id_max(),
        }
    }
}

/// Self-registration with the logging backbone.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RegistrationConfig {
    /// How long after start-up new sub-channels are still picked up
    #[serde(default = "default_registration_window_seconds")]
    #[validate(range(max = 3600))]
    pub window_seconds: u64,

    /// Rescan cadence
    #[serde(default = "default_registration_interval_ms")]
    #[validate(range(min = 10, max = 60000))]
    pub interval_ms: u64,

    /// Sub-channels that must never be listened to
    #[serde(default)]
    pub channel_exclusions: Vec<String>,
}

fn default_registration_window_seconds() -> u64 {
    60
}

fn default_registration_interval_ms() -> u64 {
    100
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_registration_window_seconds(),
            interval_ms: default_registration_interval_ms(),
            channel_exclusions: Vec::new(),
        }
    }
}

/// Capture threshold and shutdown behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CaptureConfig {
    /// Events below this severity are ignored
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,

    /// Upper bound for waiting on in-flight reports at shutdown
    #[serde(default = "default_flush_timeout_ms")]
    #[validate(range(max = 60000))]
    pub flush_timeout_ms: u64,
}

fn default_min_severity() -> Severity {
    Severity::Error
}

fn default_flush_timeout_ms() -> u64 {
    2000
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_severity: default_min_severity(),
            flush_timeout_ms: default_flush_timeout_ms(),
        }
    }
}

/// Observability of the bridge itself.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    /// Enable metrics collection
    #[serde(default = "default_observability_metrics_enabled")]
    pub metrics_enabled: bool,

    /// Logging level
    #[serde(default = "default_observability_logging_level")]
    #[validate(custom(function = "validate_logging_level"))]
    pub logging_level: String,
}

fn default_observability_metrics_enabled() -> bool {
    true
}

fn default_observability_logging_level() -> String {
    "info".to_string()
}

fn validate_logging_level(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid logging level")),
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_observability_metrics_enabled(),
            logging_level: default_observability_logging_level(),
        }
    }
}
