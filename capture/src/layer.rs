//! `tracing` adapter: feeds events recorded through a `tracing` subscriber into
//! the capture pipeline, treating each crate that logs as a sub-channel.
//!
//! An event carries a fault when it has an `error` field or a `backtrace` /
//! `stack` field. `kind` names the fault category and `fatal = true` raises an
//! error event to fatal.
//!
//! ```rust,no_run
//! # fn install(service: std::sync::Arc<capture::CaptureService>, config: &config::Config) {
//! use tracing_subscriber::prelude::*;
//!
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer().with_filter(capture::log_filter(&config.observability)))
//!     .with(capture::CaptureLayer::new(service))
//!     .init();
//! # }
//! ```

use config::ObservabilityConfig;
use fl_core::{Fault, LogEvent, LogListener, Severity, error_chain};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::{Context, Layer};

use crate::service::CaptureService;

const DEFAULT_CATEGORY: &str = "Error";

pub struct CaptureLayer {
    service: Arc<CaptureService>,
}

impl CaptureLayer {
    pub fn new(service: Arc<CaptureService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<CaptureService> {
        &self.service
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let channel = channel_of(metadata.target());
        // never feed the pipeline its own records
        if channel == crate::CRATE_NAME {
            return;
        }

        // `fatal` can only promote an error event, so anything below both is dropped unvisited
        let mut severity = severity_of(metadata.level());
        if severity < self.service.min_severity().min(Severity::Error) {
            return;
        }

        let mut visitor = FaultVisitor::default();
        event.record(&mut visitor);
        if visitor.fatal && severity == Severity::Error {
            severity = Severity::Fatal;
        }

        let message = visitor.message.take().unwrap_or_default();
        let mut log_event = LogEvent::new(severity, channel, message.clone());
        if let Some(fault) = visitor.into_fault(message) {
            log_event = log_event.with_fault(Arc::new(fault));
        }
        self.service.on_event(&log_event);
    }
}

/// Filter for the host's own log output: `RUST_LOG` when it is set and valid,
/// the configured logging level otherwise.
pub fn log_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(config))
}

/// Filter built from the configured logging level alone.
pub fn level_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::new(&config.logging_level)
}

/// Sub-channel of a `tracing` target: its crate segment.
pub fn channel_of(target: &str) -> &str {
    utils::root_segment(target).unwrap_or(target)
}

pub fn severity_of(level: &Level) -> Severity {
    if *level == Level::ERROR {
        Severity::Error
    } else if *level == Level::WARN {
        Severity::Warn
    } else if *level == Level::INFO {
        Severity::Info
    } else if *level == Level::DEBUG {
        Severity::Debug
    } else {
        Severity::Trace
    }
}

#[derive(Default)]
struct FaultVisitor {
    message: Option<String>,
    error: Option<String>,
    kind: Option<String>,
    stack: Option<String>,
    fatal: bool,
}

impl FaultVisitor {
    fn set(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            "error" => self.error = Some(value),
            "kind" => self.kind = Some(value),
            "backtrace" | "stack" => self.stack = Some(value),
            _ => {}
        }
    }

    fn into_fault(self, message: String) -> Option<Fault> {
        if self.error.is_none() && self.stack.is_none() {
            return None;
        }
        let category = self.kind.unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let message = self.error.unwrap_or(message);
        Some(Fault::with_stack_trace(
            category,
            message,
            self.stack.unwrap_or_default(),
        ))
    }
}

impl Visit for FaultVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.set(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "fatal" {
            self.fatal = value;
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        self.set(field, error_chain(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.set(field, format!("{value:?}"));
    }
}
