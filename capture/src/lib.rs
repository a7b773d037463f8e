//! # faultline Capture Pipeline
//!
//! Observes log events, keeps those at error severity or worse, suppresses
//! repeats of the same fault, blames the most plausible component, enriches the
//! report with session context and hands it to the outbound reporter.
//!
//! ```text
//! LogEvent -> filter -> fingerprint -> dedup -> attribute -> enrich -> reporter
//! ```
//!
//! The self-registration loop keeps the service attached to every logging
//! sub-channel of the host for a bounded window after start-up, and the
//! lifecycle controller switches everything off for good once the session ends.

pub mod attribution;
pub mod context;
pub mod dedup;
pub mod dispatch;
pub mod enrich;
pub mod fingerprint;
pub mod layer;
pub mod lifecycle;
pub mod registration;
pub mod service;
pub mod telemetry;

pub use attribution::{Attributor, attribute};
pub use context::ServiceContext;
pub use dedup::DedupCache;
pub use enrich::Enricher;
pub use fingerprint::fingerprint;
pub use layer::{CaptureLayer, level_filter, log_filter};
pub use lifecycle::{Lifecycle, ShutdownReason};
pub use registration::{RegistrationHandle, RegistrationState, SelfRegistration, TickOutcome};
pub use service::{CaptureService, CaptureServiceBuilder, IngestOutcome};
pub use telemetry::CaptureTelemetry;

/// Crate name, used to recognise the bridge's own frames and log records.
pub const CRATE_NAME: &str = env!("CARGO_CRATE_NAME");
