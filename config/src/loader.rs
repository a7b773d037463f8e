//! # Environment Variable Loader
//!
//! Loads configuration from environment variables following 12-factor app
//! principles. Every variable is optional; unset variables keep the default.

use crate::config::{
    AttributionConfig, CaptureConfig, Config, DedupConfig, ObservabilityConfig,
    RegistrationConfig, ReporterConfig,
};
use fl_core::Severity;
use std::env;

/// Load configuration from environment variables.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Builds a [`Config`] from `FL_*` environment variables. Malformed values
/// are reported as errors rather than silently replaced by defaults.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_env()?;
///     println!("Dedup window: {}s", config.dedup.ttl_seconds);
///     Ok(())
/// }
/// ```
///
/// ## Environment Variables
/// - `FL_COMPONENT_NAME`: own component name (default: "capture")
/// - `FL_USER_ID`, `FL_ENVIRONMENT`, `FL_RELEASE`: reporter identity (optional)
/// - `FL_DEDUP_TTL_SECONDS`: dedup window (default: 60)
/// - `FL_DEDUP_SWEEP_THRESHOLD`: entries before insert-time sweeping (default: 1024)
/// - `FL_ATTRIBUTION_EXCLUSIONS`: comma separated components never blamed
/// - `FL_LOCAL_ID_MAX`: upper bound of published registry ids (default: 1000)
/// - `FL_REGISTRATION_WINDOW_SECONDS`: self-registration window (default: 60)
/// - `FL_REGISTRATION_INTERVAL_MS`: rescan cadence (default: 100)
/// - `FL_CHANNEL_EXCLUSIONS`: comma separated sub-channels never listened to
/// - `FL_MIN_SEVERITY`: capture threshold (default: "error")
/// - `FL_FLUSH_TIMEOUT_MS`: shutdown flush bound (default: 2000)
/// - `FL_METRICS_ENABLED`: enable metrics (true/false, default: true)
/// - `FL_LOG_LEVEL`: logging level (trace/debug/info/warn/error, default: "info")
pub fn load_from_env() -> Result<Config, Box<dyn std::error::Error>> {
    let config = Config {
        reporter: load_reporter_from_env(),
        dedup: load_dedup_from_env()?,
        attribution: load_attribution_from_env()?,
        registration: load_registration_from_env()?,
        capture: load_capture_from_env()?,
        observability: load_observability_from_env()?,
    };

    Ok(config)
}

fn load_reporter_from_env() -> ReporterConfig {
    let defaults = ReporterConfig::default();
    ReporterConfig {
        component_name: env::var("FL_COMPONENT_NAME").unwrap_or(defaults.component_name),
        user_id: env::var("FL_USER_ID").ok(),
        environment: env::var("FL_ENVIRONMENT").ok(),
        release: env::var("FL_RELEASE").ok(),
    }
}

fn load_dedup_from_env() -> Result<DedupConfig, Box<dyn std::error::Error>> {
    let defaults = DedupConfig::default();
    Ok(DedupConfig {
        ttl_seconds: parse_optional("FL_DEDUP_TTL_SECONDS")?.unwrap_or(defaults.ttl_seconds),
        sweep_threshold: parse_optional("FL_DEDUP_SWEEP_THRESHOLD")?
            .unwrap_or(defaults.sweep_threshold),
    })
}

fn load_attribution_from_env() -> Result<AttributionConfig, Box<dyn std::error::Error>> {
    let defaults = AttributionConfig::default();
    Ok(AttributionConfig {
        exclusions: parse_list("FL_ATTRIBUTION_EXCLUSIONS").unwrap_or(defaults.exclusions),
        local_id_max: parse_optional("FL_LOCAL_ID_MAX")?.unwrap_or(defaults.local_id_max),
    })
}

fn load_registration_from_env() -> Result<RegistrationConfig, Box<dyn std::error::Error>> {
    let defaults = RegistrationConfig::default();
    Ok(RegistrationConfig {
        window_seconds: parse_optional("FL_REGISTRATION_WINDOW_SECONDS")?
            .unwrap_or(defaults.window_seconds),
        interval_ms: parse_optional("FL_REGISTRATION_INTERVAL_MS")?
            .unwrap_or(defaults.interval_ms),
        channel_exclusions: parse_list("FL_CHANNEL_EXCLUSIONS")
            .unwrap_or(defaults.channel_exclusions),
    })
}

fn load_capture_from_env() -> Result<CaptureConfig, Box<dyn std::error::Error>> {
    let defaults = CaptureConfig::default();
    Ok(CaptureConfig {
        min_severity: parse_optional::<Severity>("FL_MIN_SEVERITY")?
            .unwrap_or(defaults.min_severity),
        flush_timeout_ms: parse_optional("FL_FLUSH_TIMEOUT_MS")?
            .unwrap_or(defaults.flush_timeout_ms),
    })
}

fn load_observability_from_env() -> Result<ObservabilityConfig, Box<dyn std::error::Error>> {
    let defaults = ObservabilityConfig::default();
    Ok(ObservabilityConfig {
        metrics_enabled: parse_optional("FL_METRICS_ENABLED")?
            .unwrap_or(defaults.metrics_enabled),
        logging_level: env::var("FL_LOG_LEVEL").unwrap_or(defaults.logging_level),
    })
}

/// Parse a variable if it is set. A set but malformed value is an error.
fn parse_optional<T>(key: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(s) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("{key}: {e}").into()),
        Err(_) => Ok(None),
    }
}

fn parse_list(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect()
    })
}
