//! # faultline Errors
//!
//! Error types for every failure category of the error-reporting bridge.
//!
//! - Transient failures (`SessionError`, `BackboneError`, async `ReporterError`)
//!   are swallowed at the point of use and only logged.
//! - Construction failures (`BridgeError`) surface to the host immediately.
//!
//! Uses `thiserror` for structured error definitions with named fields.

use thiserror::Error;

/// Failure while reading a host session accessor during enrichment
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session field {field} unavailable: {reason}")]
    Unavailable { field: String, reason: String },

    #[error("Session has ended")]
    Ended
}

impl SessionError {
    pub fn unavailable(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            field: field.into(),
            reason: reason.into()
        }
    }
}

/// Logging backbone errors raised while scanning or attaching to sub-channels
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackboneError {
    #[error("Attach to channel {channel} failed: {reason}")]
    AttachFailed { channel: String, reason: String },

    #[error("Channel unavailable: {channel}")]
    ChannelUnavailable { channel: String }
}

/// Outbound reporter client errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReporterError {
    #[error("Transport failed: {reason}")]
    Transport { reason: String },

    #[error("Report rejected with status {status}: {reason}")]
    Rejected { status: u16, reason: String },

    #[error("Timeout: send took longer than {timeout_ms}ms")]
    Timeout { timeout_ms: u64 }
}

impl ReporterError {
    /// Short, low-cardinality label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Rejected { .. } => "rejected",
            Self::Timeout { .. } => "timeout"
        }
    }
}

/// Construction-time errors. The capture service is never built half-way.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Missing session owner")]
    MissingSessionOwner,

    #[error("Invalid session owner: {reason}")]
    InvalidSessionOwner { reason: String },

    #[error("Missing collaborator: {name}")]
    MissingCollaborator { name: &'static str },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("No tokio runtime available to dispatch reports")]
    NoRuntime
}

pub type BridgeResult<T> = Result<T, BridgeError>;
