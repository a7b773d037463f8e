//! # Configuration File Loading
//!
//! Loads configuration from TOML or YAML files, detecting the format from the
//! file extension. Loaded files are validated before they are returned.

use crate::config::Config;
use std::path::Path;
use validator::Validate;

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {format}: {reason}")]
    Parse { format: ConfigFormat, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),
}

/// Supported on-disk formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConfigFormat {
    #[strum(serialize = "TOML")]
    Toml,
    #[strum(serialize = "YAML")]
    Yaml,
}

impl ConfigFormat {
    /// Detect the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigFileError> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or(ConfigFileError::NoExtension)?;

        match extension.to_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(ConfigFileError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Parse and validate configuration text in this format.
    pub fn parse(self, contents: &str) -> Result<Config, ConfigFileError> {
        let config: Config = match self {
            Self::Toml => toml::from_str(contents).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
        }
        .map_err(|reason| ConfigFileError::Parse {
            format: self,
            reason,
        })?;

        config.validate()?;
        Ok(config)
    }
}

fn read(path: &Path) -> Result<String, ConfigFileError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigFileError::FileNotFound(path.display().to_string()),
        _ => ConfigFileError::Io(e),
    })
}

/// Load configuration from a TOML file.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_toml;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_toml(Path::new("faultline.toml"))?;
///     println!("Dedup window: {}s", config.dedup.ttl_seconds);
///     Ok(())
/// }
/// ```
pub fn load_from_toml(path: &Path) -> Result<Config, ConfigFileError> {
    ConfigFormat::Toml.parse(&read(path)?)
}

/// Load configuration from a YAML file.
pub fn load_from_yaml(path: &Path) -> Result<Config, ConfigFileError> {
    ConfigFormat::Yaml.parse(&read(path)?)
}

/// Load configuration from file with auto-detection.
///
/// ## Supported Formats
/// - `.toml`: TOML format
/// - `.yaml` / `.yml`: YAML format
///
/// ## Error Handling
/// Returns `ConfigFileError` for a missing file, an unknown extension, a parse
/// failure in the detected format, or a configuration that fails validation.
pub fn load_from_file(path: &Path) -> Result<Config, ConfigFileError> {
    let format = ConfigFormat::from_path(path)?;
    format.parse(&read(path)?)
}
