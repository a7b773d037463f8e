//! # faultline Core
//!
//! Shared types and traits for the faultline error-reporting bridge.
//!
//! This crate provides:
//! - The fault data model (frames, faults, fingerprints, log events)
//! - The report context handed to the outbound reporter
//! - Collaborator traits for the logging backbone, the reporter client, the
//!   component registry and the host session
//! - A parser for textual stack traces, including `std::backtrace` output

pub mod stack;
pub mod traits;
pub mod types;

pub use traits::{
    Clock, ComponentRegistry, HostSession, LogListener, LoggingBackbone, OutboundReporter,
    SystemClock,
};
pub use types::{
    ComponentInfo, Fault, FaultReport, Fingerprint, Frame, LifecycleState, ListenerId, LogEvent,
    LogPayload, ReportContext, SessionOwner, Severity, error_chain,
};
