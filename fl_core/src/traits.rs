//! Collaborator traits the capture pipeline consumes and exposes

use async_trait::async_trait;
use errors::{BackboneError, ReporterError, SessionError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::types::{ComponentInfo, FaultReport, ListenerId, LogEvent};

/// Receiver of log events from the logging backbone.
///
/// Implementations are called synchronously from whatever thread emitted the
/// record and must never panic or block.
pub trait LogListener: Send + Sync {
    fn listener_id(&self) -> ListenerId;

    fn on_event(&self, event: &LogEvent);

    fn on_events(&self, events: &[LogEvent]) {
        for event in events {
            self.on_event(event);
        }
    }
}

/// The host's logging backbone: a set of named sub-channels that listeners can
/// be attached to.
pub trait LoggingBackbone: Send + Sync {
    /// Names of all currently active sub-channels
    fn channels(&self) -> Vec<String>;

    fn is_attached(&self, channel: &str, listener: ListenerId) -> Result<bool, BackboneError>;

    fn attach(&self, channel: &str, listener: Arc<dyn LogListener>) -> Result<(), BackboneError>;
}

/// Client of the remote error-tracking service.
///
/// Awaiting `send` is the blocking path; the capture pipeline provides the
/// fire-and-forget path by dispatching `send` onto the runtime.
#[async_trait]
pub trait OutboundReporter: Send + Sync {
    async fn send(&self, report: FaultReport) -> Result<(), ReporterError>;
}

/// Registry of known components, looked up by name.
pub trait ComponentRegistry: Send + Sync {
    fn lookup(&self, name: &str) -> Option<ComponentInfo>;
}

/// Read-only accessors into the monitored host session.
pub trait HostSession: Send + Sync {
    fn level_name(&self) -> Result<String, SessionError>;

    fn mode(&self) -> Result<String, SessionError>;

    fn phase(&self) -> Result<String, SessionError>;

    fn build_version(&self) -> Result<String, SessionError>;

    fn latency_ms(&self) -> Result<u32, SessionError>;

    /// In-session time, independent of the wall clock
    fn game_time(&self) -> Result<Duration, SessionError>;
}

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
