//! # Configuration System
//!
//! Configuration management for the faultline error-reporting bridge.
//!
//! This crate provides:
//! - Configuration structures for every pipeline stage
//! - Environment variable loading (`FL_*`, 12-factor app principles)
//! - Configuration file loading (TOML/YAML)
//! - Configuration validation

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod validation;

pub use config::{
    AttributionConfig, CaptureConfig, Config, DedupConfig, ObservabilityConfig,
    RegistrationConfig, ReporterConfig, DEFAULT_COMPONENT_NAME,
};
pub use file_loader::{ConfigFileError, ConfigFormat, load_from_file, load_from_toml, load_from_yaml};
pub use loader::load_from_env;
pub use validation::validate;
pub use validator::Validate;
