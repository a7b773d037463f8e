use config::{Config, RegistrationConfig, Validate};
use errors::{BridgeError, BridgeResult, ReporterError};
use fl_core::{
    Clock, ComponentRegistry, Fault, FaultReport, HostSession, ListenerId, LogEvent, LogListener,
    LoggingBackbone, OutboundReporter, SessionOwner, Severity, SystemClock,
};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::attribution::Attributor;
use crate::context::ServiceContext;
use crate::dedup::DedupCache;
use crate::dispatch::Dispatcher;
use crate::enrich::Enricher;
use crate::fingerprint::fingerprint;
use crate::lifecycle::{Lifecycle, ShutdownReason};
use crate::registration::{RegistrationHandle, SelfRegistration};
use crate::telemetry::CaptureTelemetry;

/// What the ingest path did with a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The pipeline has been shut down
    Disabled,
    BelowThreshold,
    /// Neither the fault field nor the message carried a fault
    NoFault,
    /// Same fingerprint reported within the dedup window
    Suppressed,
    Dispatched(Uuid),
}

impl IngestOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::BelowThreshold => "below_threshold",
            Self::NoFault => "no_fault",
            Self::Suppressed => "suppressed",
            Self::Dispatched(_) => "dispatched",
        }
    }
}

/// The capture pipeline: filter, fingerprint, dedup, attribute, enrich, send.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Receives log events from the host's logging backbone (as a [`LogListener`])
/// and explicit captures from application code, and forwards enriched fault
/// reports to the [`OutboundReporter`].
///
/// ## Usage
/// ```rust,no_run
/// # use std::sync::Arc;
/// # async fn run(
/// #     reporter: Arc<dyn fl_core::OutboundReporter>,
/// #     registry: Arc<dyn fl_core::ComponentRegistry>,
/// #     session: Arc<dyn fl_core::HostSession>,
/// #     owner: fl_core::SessionOwner,
/// #     fault: Arc<fl_core::Fault>,
/// # ) -> Result<(), Box<dyn std::error::Error>> {
/// use capture::CaptureService;
///
/// let service = CaptureService::builder(config::Config::default())
///     .reporter(reporter)
///     .registry(registry)
///     .session(session)
///     .owner(owner)
///     .build()?;
///
/// service.capture(fault, "my_plugin").await?;
/// # Ok(())
/// # }
/// ```
///
/// ## Shutdown
/// Once the [`Lifecycle`] is disabled every entry point is a no-op. Reports
/// already dispatched keep going and can be awaited with [`CaptureService::flush`].
pub struct CaptureService {
    listener_id: ListenerId,
    min_severity: Severity,
    lifecycle: Lifecycle,
    dedup: DedupCache,
    enricher: Enricher,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    registration: RegistrationConfig,
    flush_timeout: Duration,
    telemetry: CaptureTelemetry,
}

impl CaptureService {
    pub fn builder(config: Config) -> CaptureServiceBuilder {
        CaptureServiceBuilder::new(config)
    }

    /// Enrich and send, waiting for the reporter. No dedup on this path.
    ///
    /// Returns `Ok(None)` when the pipeline is disabled.
    pub async fn capture(
        &self,
        fault: Arc<Fault>,
        origin: &str,
    ) -> Result<Option<Uuid>, ReporterError> {
        if !self.lifecycle.is_active() {
            return Ok(None);
        }

        let report = self.prepare(fault, origin, Severity::Error);
        let event_id = report.event_id;
        self.dispatcher.send(report).await?;
        Ok(Some(event_id))
    }

    /// Capture a typed error together with a backtrace taken here.
    pub async fn capture_error<E>(
        &self,
        err: &E,
        origin: &str,
    ) -> Result<Option<Uuid>, ReporterError>
    where
        E: std::error::Error + 'static,
    {
        if !self.lifecycle.is_active() {
            return Ok(None);
        }
        self.capture(Arc::new(Fault::from_error(err)), origin).await
    }

    /// Enrich and hand off without waiting. Returns the report's event id, or
    /// `None` when the pipeline is disabled.
    pub fn capture_async(&self, fault: Arc<Fault>, origin: &str) -> Option<Uuid> {
        self.dispatch_at(fault, origin, Severity::Error)
    }

    fn dispatch_at(&self, fault: Arc<Fault>, origin: &str, level: Severity) -> Option<Uuid> {
        if !self.lifecycle.is_active() {
            return None;
        }

        let report = self.prepare(fault, origin, level);
        let event_id = report.event_id;
        self.dispatcher.dispatch(report);
        Some(event_id)
    }

    fn prepare(&self, fault: Arc<Fault>, origin: &str, level: Severity) -> FaultReport {
        let context = self.enricher.enrich(&fault, origin);
        FaultReport::new(level, fault, context)
    }

    /// Ingest path of the logging backbone.
    pub fn ingest(&self, event: &LogEvent) -> IngestOutcome {
        let outcome = self.ingest_event(event);
        debug!(
            channel = %event.channel,
            severity = %event.severity,
            outcome = outcome.label(),
            "Log event ingested"
        );
        self.telemetry.record_ingest(outcome.label());
        outcome
    }

    fn ingest_event(&self, event: &LogEvent) -> IngestOutcome {
        if !self.lifecycle.is_active() {
            return IngestOutcome::Disabled;
        }

        if event.severity < self.min_severity {
            return IngestOutcome::BelowThreshold;
        }

        let Some(fault) = event.fault_payload() else {
            return IngestOutcome::NoFault;
        };

        let key = fingerprint(fault);
        let repeated = self.dedup.contains(&key);
        if !repeated {
            self.dedup.record(key);
        }
        // lookups and inserts both drop expired entries
        self.telemetry.set_dedup_entries(self.dedup.len());
        if repeated {
            return IngestOutcome::Suppressed;
        }

        match self.dispatch_at(Arc::clone(fault), &event.channel, event.severity) {
            Some(event_id) => IngestOutcome::Dispatched(event_id),
            None => IngestOutcome::Disabled,
        }
    }

    pub fn ingest_batch(&self, events: &[LogEvent]) -> Vec<IngestOutcome> {
        events.iter().map(|event| self.ingest(event)).collect()
    }

    /// Wait for dispatched reports, bounded by the configured flush timeout.
    pub async fn flush(&self) -> bool {
        self.flush_within(self.flush_timeout).await
    }

    pub async fn flush_within(&self, timeout: Duration) -> bool {
        let finished = self.dispatcher.flush(timeout).await;
        if !finished {
            warn!(
                in_flight = self.dispatcher.in_flight(),
                "Reports still in flight after flush timeout"
            );
        }
        finished
    }

    /// Disable the pipeline and wait for reports that are already on their way.
    pub async fn shutdown(&self, reason: ShutdownReason) -> bool {
        self.lifecycle.disable(reason);
        self.flush().await
    }

    /// Start the self-registration loop on `backbone`. The first scan runs
    /// immediately.
    pub fn start_registration(self: &Arc<Self>, backbone: Arc<dyn LoggingBackbone>) -> RegistrationHandle {
        let interval = Duration::from_millis(self.registration.interval_ms);
        Arc::new(SelfRegistration::new(self, backbone)).spawn(self.dispatcher.runtime(), interval)
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn registration_config(&self) -> &RegistrationConfig {
        &self.registration
    }

    pub fn telemetry(&self) -> CaptureTelemetry {
        self.telemetry
    }

    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }
}

impl LogListener for CaptureService {
    fn listener_id(&self) -> ListenerId {
        self.listener_id
    }

    /// Failure boundary towards the logging backbone: nothing escapes, not even
    /// a panic.
    fn on_event(&self, event: &LogEvent) {
        if catch_unwind(AssertUnwindSafe(|| self.ingest(event))).is_err() {
            warn!(channel = %event.channel, "Capture pipeline panicked on log event");
        }
    }
}

/// Builder for [`CaptureService`]; `build` fails fast on missing or invalid input.
pub struct CaptureServiceBuilder {
    config: Config,
    reporter: Option<Arc<dyn OutboundReporter>>,
    registry: Option<Arc<dyn ComponentRegistry>>,
    session: Option<Arc<dyn HostSession>>,
    owner: Option<SessionOwner>,
    clock: Arc<dyn Clock>,
    runtime: Option<Handle>,
    lifecycle: Option<Lifecycle>,
}

impl CaptureServiceBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            reporter: None,
            registry: None,
            session: None,
            owner: None,
            clock: Arc::new(SystemClock),
            runtime: None,
            lifecycle: None,
        }
    }

    pub fn reporter(mut self, reporter: Arc<dyn OutboundReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn ComponentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn session(mut self, session: Arc<dyn HostSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn owner(mut self, owner: SessionOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runtime that fire-and-forget sends are spawned on. Defaults to the
    /// runtime `build` is called from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Share a lifecycle the host already routes shutdown notifications to.
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn build(self) -> BridgeResult<Arc<CaptureService>> {
        let config = self.config;
        config.validate().map_err(|e| BridgeError::InvalidConfig {
            reason: e.to_string(),
        })?;

        let context = ServiceContext::new(self.owner)?;
        let reporter = self
            .reporter
            .ok_or(BridgeError::MissingCollaborator { name: "reporter" })?;
        let registry = self
            .registry
            .ok_or(BridgeError::MissingCollaborator { name: "registry" })?;
        let session = self
            .session
            .ok_or(BridgeError::MissingCollaborator { name: "session" })?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| BridgeError::NoRuntime)?,
        };

        let telemetry = CaptureTelemetry::new(config.observability.metrics_enabled);
        let own_component = config.reporter.component_name.clone();

        let attributor = Attributor::new(&own_component, config.attribution.exclusions.iter().cloned());
        let enricher = Enricher::new(
            own_component.clone(),
            attributor,
            registry,
            session,
            context,
            Arc::clone(&self.clock),
        )
        .with_local_id_max(config.attribution.local_id_max)
        .with_telemetry(telemetry)
        .with_base(
            config.reporter.user_id.clone(),
            config.reporter.environment.clone(),
            config.reporter.release.clone(),
        );

        let dedup = DedupCache::with_settings(
            Arc::clone(&self.clock),
            Duration::from_secs(config.dedup.ttl_seconds),
            config.dedup.sweep_threshold,
        );

        info!(
            component = %own_component,
            min_severity = %config.capture.min_severity,
            dedup_ttl_secs = config.dedup.ttl_seconds,
            "Capture service started"
        );

        Ok(Arc::new(CaptureService {
            listener_id: ListenerId::new(),
            min_severity: config.capture.min_severity,
            lifecycle: self.lifecycle.unwrap_or_default(),
            dedup,
            enricher,
            dispatcher: Dispatcher::new(reporter, runtime, telemetry),
            clock: self.clock,
            registration: config.registration,
            flush_timeout: Duration::from_millis(config.capture.flush_timeout_ms),
            telemetry,
        }))
    }
}
