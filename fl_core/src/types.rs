use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::stack;

/// Log severity, ordered from least to most severe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// One call frame of a fault's stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Declaring component (crate) name, `None` when it could not be resolved
    pub component: Option<String>,
    pub function: String,
    /// Frame belongs to the platform and is never blamed
    pub trusted: bool,
}

impl Frame {
    pub fn new(component: impl Into<String>, function: impl Into<String>) -> Self {
        let component = component.into();
        let trusted = stack::is_system_component(&component);
        Self {
            component: Some(component),
            function: function.into(),
            trusted,
        }
    }

    pub fn unresolved(function: impl Into<String>) -> Self {
        Self {
            component: None,
            function: function.into(),
            trusted: false,
        }
    }

    pub fn with_trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }
}

/// An observed error: category, message and call frames, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    category: String,
    message: String,
    frames: Vec<Frame>,
    stack_trace: String,
}

impl Fault {
    /// Build a fault from structured frames, innermost call first.
    pub fn new(category: impl Into<String>, message: impl Into<String>, frames: Vec<Frame>) -> Self {
        let stack_trace = stack::render(&frames);
        Self {
            category: category.into(),
            message: message.into(),
            frames,
            stack_trace,
        }
    }

    /// Build a fault from a textual stack trace. Frames are parsed from the text,
    /// the text itself is kept verbatim.
    pub fn with_stack_trace(
        category: impl Into<String>,
        message: impl Into<String>,
        stack_trace: impl Into<String>,
    ) -> Self {
        let stack_trace = stack_trace.into();
        let frames = stack::parse(&stack_trace);
        Self {
            category: category.into(),
            message: message.into(),
            frames,
            stack_trace,
        }
    }

    /// Capture a fault from a typed error at the current call site.
    pub fn from_error<E: Error + 'static>(err: &E) -> Self {
        let backtrace = Backtrace::force_capture();
        Self::with_stack_trace(
            std::any::type_name::<E>(),
            error_chain(err),
            backtrace.to_string(),
        )
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn stack_trace(&self) -> &str {
        &self.stack_trace
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

/// Render an error and its `source()` chain as `outer: inner: root`.
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Deduplication key of a fault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(digest: String) -> Self {
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message part of a log event. Some backbones allow an error object to be
/// logged in place of a message.
#[derive(Debug, Clone)]
pub enum LogPayload {
    Text(String),
    Fault(Arc<Fault>),
}

/// A single record emitted on a logging sub-channel.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub severity: Severity,
    /// Name of the originating sub-channel
    pub channel: String,
    pub message: LogPayload,
    /// Explicit exception payload
    pub fault: Option<Arc<Fault>>,
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    pub fn new(severity: Severity, channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            channel: channel.into(),
            message: LogPayload::Text(message.into()),
            fault: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_fault(mut self, fault: Arc<Fault>) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn with_fault_message(mut self, fault: Arc<Fault>) -> Self {
        self.message = LogPayload::Fault(fault);
        self
    }

    /// Explicit fault field first, then a fault logged as the message.
    pub fn fault_payload(&self) -> Option<&Arc<Fault>> {
        self.fault.as_ref().or(match &self.message {
            LogPayload::Fault(fault) => Some(fault),
            LogPayload::Text(_) => None,
        })
    }
}

/// Identity of a listener attached to the logging backbone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Component registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub name: String,
    pub id: i64,
    pub version: String,
}

/// The unit that owns the monitored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOwner {
    pub unit_id: String,
    pub unit_class: String,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LifecycleState {
    Active,
    Disabled,
}

/// Tags and extras attached to one outbound report.
///
/// Built fresh for every capture and never shared between captures.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportContext {
    /// Logger name the report is filed under, the origin component
    pub logger: String,
    pub user_id: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl ReportContext {
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn remove_tag(&mut self, key: &str) {
        self.tags.remove(key);
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn set_extra(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.extras.insert(key.into(), value);
    }

    pub fn extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extras.get(key)
    }
}

/// Unit of work handed to the outbound reporter.
#[derive(Debug, Clone, Serialize)]
pub struct FaultReport {
    pub event_id: Uuid,
    pub level: Severity,
    pub fault: Arc<Fault>,
    pub context: ReportContext,
    pub captured_at: DateTime<Utc>,
}

impl FaultReport {
    pub fn new(level: Severity, fault: Arc<Fault>, context: ReportContext) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            level,
            fault,
            context,
            captured_at: Utc::now(),
        }
    }
}
