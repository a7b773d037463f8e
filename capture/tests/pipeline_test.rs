//! End-to-end tests of the capture pipeline.
//!
//! Each test builds a service over in-memory collaborators with a manual clock,
//! so dedup windows are crossed by advancing time rather than sleeping.

use capture::{CaptureService, IngestOutcome, ShutdownReason};
use config::Config;
use errors::{BridgeError, ReporterError, SessionError};
use fl_core::{Fault, Frame, HostSession, LifecycleState, LogEvent, LogListener, Severity, SessionOwner};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use std::sync::Arc;
use std::time::Duration;
use testing::{FakeSession, ManualClock, RecordingReporter, StaticRegistry, component, fault_from, owner, unique_fault};

struct Harness {
    service: Arc<CaptureService>,
    reporter: Arc<RecordingReporter>,
    clock: Arc<ManualClock>,
}

fn registry() -> StaticRegistry {
    StaticRegistry::new()
        .with(component("plugin_x", 42, "1.4.0"))
        .with(component("plugin_z", 7, "2.0.1"))
}

fn harness_with(config: Config, session: Arc<dyn HostSession>) -> Harness {
    let reporter = Arc::new(RecordingReporter::new());
    let clock = Arc::new(ManualClock::new());
    let service = CaptureService::builder(config)
        .reporter(reporter.clone())
        .registry(Arc::new(registry()))
        .session(session)
        .owner(owner())
        .clock(clock.clone())
        .build()
        .unwrap();
    Harness {
        service,
        reporter,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(Config::default(), Arc::new(FakeSession::default()))
}

fn error_event(channel: &str, fault: Fault) -> LogEvent {
    LogEvent::new(Severity::Error, channel, "unhandled error").with_fault(Arc::new(fault))
}

#[tokio::test]
async fn test_identical_stack_traces_send_once() {
    let h = harness();
    let first = fault_from("plugin_x", "combat::tick");
    let second = Fault::with_stack_trace("OtherCategory", "other message", first.stack_trace());

    assert!(matches!(
        h.service.ingest(&error_event("plugin_x", first)),
        IngestOutcome::Dispatched(_)
    ));
    assert_eq!(
        h.service.ingest(&error_event("plugin_x", second)),
        IngestOutcome::Suppressed
    );

    assert!(h.service.flush().await);
    assert_eq!(h.reporter.sent(), 1);
}

#[tokio::test]
async fn test_unique_stack_traces_are_never_suppressed() {
    let h = harness();
    for _ in 0..5 {
        let outcome = h.service.ingest(&error_event("plugin_x", unique_fault("plugin_x")));
        assert!(matches!(outcome, IngestOutcome::Dispatched(_)));
    }

    assert!(h.service.flush().await);
    assert_eq!(h.reporter.sent(), 5);
}

#[tokio::test]
async fn test_recurring_fault_is_reported_again_after_window() {
    let h = harness();
    let fault = fault_from("plugin_x", "combat::tick");

    h.service.ingest(&error_event("plugin_x", fault.clone()));
    h.clock.advance(Duration::from_secs(30));
    assert_eq!(
        h.service.ingest(&error_event("plugin_x", fault.clone())),
        IngestOutcome::Suppressed
    );

    h.clock.advance(Duration::from_secs(31));
    assert!(matches!(
        h.service.ingest(&error_event("plugin_x", fault)),
        IngestOutcome::Dispatched(_)
    ));

    assert!(h.service.flush().await);
    assert_eq!(h.reporter.sent(), 2);
}

fn dedup_entries(snapshotter: &Snapshotter) -> Option<f64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(key, _, _, value)| match value {
            DebugValue::Gauge(entries) if key.key().name() == "faultline_dedup_entries" => Some(entries.0),
            _ => None,
        })
}

#[tokio::test]
async fn test_dedup_gauge_drops_expired_entries() {
    let mut config = Config::default();
    config.dedup.ttl_seconds = 1;
    config.dedup.sweep_threshold = 1;
    let h = harness_with(config, Arc::new(FakeSession::default()));

    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let ingest = |fault: Fault| {
        metrics::with_local_recorder(&recorder, || h.service.ingest(&error_event("plugin_x", fault)))
    };

    let tick = fault_from("plugin_x", "combat::tick");
    ingest(tick.clone());
    ingest(fault_from("plugin_x", "shop::buy"));
    assert_eq!(dedup_entries(&snapshotter), Some(2.0));

    h.clock.advance(Duration::from_secs(2));
    assert!(matches!(ingest(tick.clone()), IngestOutcome::Dispatched(_)));
    assert_eq!(dedup_entries(&snapshotter), Some(1.0));

    assert_eq!(ingest(tick), IngestOutcome::Suppressed);
    assert_eq!(dedup_entries(&snapshotter), Some(1.0));
}

#[tokio::test]
async fn test_fault_without_stack_is_keyed_by_category_and_message() {
    let h = harness();
    let a = Fault::new("Timeout", "lobby took too long", vec![]);
    let b = Fault::new("Timeout", "lobby took too long", vec![]);
    let c = Fault::new("Timeout", "shop took too long", vec![]);

    assert!(matches!(h.service.ingest(&error_event("plugin_x", a)), IngestOutcome::Dispatched(_)));
    assert_eq!(h.service.ingest(&error_event("plugin_x", b)), IngestOutcome::Suppressed);
    assert!(matches!(h.service.ingest(&error_event("plugin_x", c)), IngestOutcome::Dispatched(_)));
}

#[tokio::test]
async fn test_info_event_with_fault_is_below_threshold() {
    let h = harness();
    let event = LogEvent::new(Severity::Info, "plugin_x", "fyi")
        .with_fault(Arc::new(fault_from("plugin_x", "combat::tick")));

    assert_eq!(h.service.ingest(&event), IngestOutcome::BelowThreshold);
    assert!(h.service.dedup().is_empty());
    assert!(h.service.flush().await);
    assert_eq!(h.reporter.attempts(), 0);
}

#[tokio::test]
async fn test_error_event_without_fault_is_dropped() {
    let h = harness();
    let event = LogEvent::new(Severity::Error, "plugin_x", "something went wrong");

    assert_eq!(h.service.ingest(&event), IngestOutcome::NoFault);
    assert!(h.service.flush().await);
    assert_eq!(h.reporter.attempts(), 0);
}

#[tokio::test]
async fn test_fault_logged_as_message_is_captured() {
    let h = harness();
    let event = LogEvent::new(Severity::Error, "plugin_x", "")
        .with_fault_message(Arc::new(fault_from("plugin_x", "shop::buy")));

    assert!(matches!(h.service.ingest(&event), IngestOutcome::Dispatched(_)));
    assert!(h.service.flush().await);
    assert_eq!(h.reporter.sent(), 1);
}

#[tokio::test]
async fn test_fatal_event_is_enriched_with_channel_origin() {
    let h = harness();
    let event = LogEvent::new(Severity::Fatal, "plugin_z", "crashed")
        .with_fault(Arc::new(fault_from("plugin_x", "combat::tick")));

    let IngestOutcome::Dispatched(event_id) = h.service.ingest(&event) else {
        panic!("fatal event was not dispatched");
    };
    assert_eq!(h.service.dedup().len(), 1);

    assert!(h.service.flush().await);
    assert_eq!(h.reporter.sent(), 1);

    let report = h.reporter.last().unwrap();
    assert_eq!(report.event_id, event_id);
    assert_eq!(report.level, Severity::Fatal);
    assert_eq!(report.context.logger, "plugin_z");
    assert_eq!(report.context.tag("plugin"), Some("plugin_z"));
    assert_eq!(report.context.tag("id"), Some("7"));
    assert_eq!(report.context.tag("build"), Some("2.0.1"));
    assert_eq!(report.context.tag("unit"), Some("hero_mage"));
}

#[tokio::test]
async fn test_event_on_own_channel_is_reattributed() {
    let h = harness();
    let event = error_event("capture", fault_from("plugin_x", "combat::tick"));

    h.service.ingest(&event);
    assert!(h.service.flush().await);

    let report = h.reporter.last().unwrap();
    assert_eq!(report.context.tag("plugin"), Some("plugin_x"));
    assert_eq!(report.context.tag("id"), Some("42"));
}

#[tokio::test]
async fn test_capture_waits_for_send_and_skips_dedup() {
    let h = harness();
    let fault = Arc::new(fault_from("plugin_x", "combat::tick"));

    let first = h.service.capture(fault.clone(), "plugin_x").await.unwrap();
    let second = h.service.capture(fault, "plugin_x").await.unwrap();

    assert!(first.is_some());
    assert_ne!(first, second);
    assert_eq!(h.reporter.sent(), 2);
    assert!(h.service.dedup().is_empty());
    assert_eq!(h.reporter.last().unwrap().level, Severity::Error);
}

#[tokio::test]
async fn test_capture_surfaces_reporter_error() {
    let h = harness();
    h.reporter.fail_with(ReporterError::Rejected {
        status: 429,
        reason: "rate limited".to_string(),
    });

    let result = h
        .service
        .capture(Arc::new(unique_fault("plugin_x")), "plugin_x")
        .await;
    assert!(matches!(result, Err(ReporterError::Rejected { status: 429, .. })));
}

#[derive(Debug)]
struct LobbyError;

impl std::fmt::Display for LobbyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lobby closed")
    }
}

impl std::error::Error for LobbyError {}

#[tokio::test]
async fn test_capture_error_records_type_and_message() {
    let h = harness();

    let event_id = h.service.capture_error(&LobbyError, "plugin_x").await.unwrap();
    assert!(event_id.is_some());

    let report = h.reporter.last().unwrap();
    assert!(report.fault.category().ends_with("LobbyError"));
    assert_eq!(report.fault.message(), "lobby closed");
}

#[tokio::test]
async fn test_capture_async_returns_before_send_completes() {
    let h = harness();
    h.reporter.stall_for(Duration::from_millis(200));

    let event_id = h
        .service
        .capture_async(Arc::new(unique_fault("plugin_x")), "plugin_x");
    assert!(event_id.is_some());
    assert_eq!(h.reporter.attempts(), 0);
    assert_eq!(h.service.in_flight(), 1);

    assert!(h.service.flush().await);
    assert_eq!(h.reporter.sent(), 1);
    assert_eq!(h.reporter.last().unwrap().event_id, event_id.unwrap());
}

#[tokio::test]
async fn test_async_send_failure_is_swallowed() {
    let h = harness();
    h.reporter.fail_with(ReporterError::Transport {
        reason: "connection refused".to_string(),
    });

    let outcome = h.service.ingest(&error_event("plugin_x", unique_fault("plugin_x")));
    assert!(matches!(outcome, IngestOutcome::Dispatched(_)));

    assert!(h.service.flush().await);
    assert_eq!(h.reporter.attempts(), 1);
    assert_eq!(h.reporter.sent(), 0);
}

#[tokio::test]
async fn test_disabled_pipeline_is_a_no_op() {
    let h = harness();
    assert!(h.service.lifecycle().disable(ShutdownReason::SessionEnded));
    assert_eq!(h.service.lifecycle().state(), LifecycleState::Disabled);

    let fault = Arc::new(unique_fault("plugin_x"));
    assert_eq!(h.service.capture(fault.clone(), "plugin_x").await.unwrap(), None);
    assert_eq!(h.service.capture_async(fault.clone(), "plugin_x"), None);
    assert_eq!(h.service.capture_error(&LobbyError, "plugin_x").await.unwrap(), None);
    assert_eq!(
        h.service.ingest(&error_event("plugin_x", (*fault).clone())),
        IngestOutcome::Disabled
    );
    h.service.on_event(&error_event("plugin_x", unique_fault("plugin_x")));

    assert!(h.service.flush().await);
    assert_eq!(h.reporter.attempts(), 0);
    assert!(h.service.dedup().is_empty());
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_reports() {
    let h = harness();
    h.reporter.stall_for(Duration::from_millis(50));

    for _ in 0..3 {
        h.service.capture_async(Arc::new(unique_fault("plugin_x")), "plugin_x");
    }

    assert!(h.service.shutdown(ShutdownReason::ProcessExit).await);
    assert_eq!(h.reporter.sent(), 3);
    assert!(!h.service.lifecycle().is_active());
}

#[tokio::test]
async fn test_flush_times_out_on_stalled_reporter() {
    let h = harness();
    h.reporter.stall_for(Duration::from_secs(5));
    h.service.capture_async(Arc::new(unique_fault("plugin_x")), "plugin_x");

    assert!(!h.service.flush_within(Duration::from_millis(20)).await);
    assert_eq!(h.service.in_flight(), 1);
}

#[tokio::test]
async fn test_failing_session_still_reports() {
    let session = FakeSession::default()
        .failing("level_name")
        .failing("latency_ms");
    let h = harness_with(Config::default(), Arc::new(session));

    h.service.ingest(&error_event("plugin_x", unique_fault("plugin_x")));
    assert!(h.service.flush().await);

    let report = h.reporter.last().unwrap();
    assert_eq!(report.context.tag("plugin"), Some("plugin_x"));
    assert_eq!(report.context.tag("map"), None);
    assert_eq!(report.context.tag("latency"), None);
}

struct PanickingSession;

impl HostSession for PanickingSession {
    fn level_name(&self) -> Result<String, SessionError> {
        panic!("session accessor blew up")
    }

    fn mode(&self) -> Result<String, SessionError> {
        Err(SessionError::Ended)
    }

    fn phase(&self) -> Result<String, SessionError> {
        Err(SessionError::Ended)
    }

    fn build_version(&self) -> Result<String, SessionError> {
        Ok("7.35d".to_string())
    }

    fn latency_ms(&self) -> Result<u32, SessionError> {
        Err(SessionError::Ended)
    }

    fn game_time(&self) -> Result<Duration, SessionError> {
        Err(SessionError::Ended)
    }
}

#[tokio::test]
async fn test_panicking_session_accessor_still_reports() {
    let h = harness_with(Config::default(), Arc::new(PanickingSession));
    let fault = fault_from("plugin_x", "combat::tick");

    h.service.on_event(&error_event("plugin_x", fault.clone()));
    assert_eq!(
        h.service.ingest(&error_event("plugin_x", fault)),
        IngestOutcome::Suppressed
    );

    let event_id = h
        .service
        .capture_async(Arc::new(unique_fault("plugin_x")), "plugin_x");
    assert!(event_id.is_some());

    let sent = h
        .service
        .capture(Arc::new(unique_fault("plugin_x")), "plugin_x")
        .await
        .unwrap();
    assert!(sent.is_some());

    assert!(h.service.flush().await);
    assert_eq!(h.reporter.sent(), 3);
    for report in h.reporter.reports() {
        assert_eq!(report.context.tag("plugin"), Some("plugin_x"));
        assert_eq!(report.context.tag("map"), None);
    }
}

#[tokio::test]
async fn test_min_severity_from_config() {
    let mut config = Config::default();
    config.capture.min_severity = Severity::Fatal;
    let h = harness_with(config, Arc::new(FakeSession::default()));

    assert_eq!(
        h.service.ingest(&error_event("plugin_x", unique_fault("plugin_x"))),
        IngestOutcome::BelowThreshold
    );
}

#[tokio::test]
async fn test_ingest_batch_reports_each_outcome() {
    let h = harness();
    let fault = unique_fault("plugin_x");
    let events = vec![
        error_event("plugin_x", fault.clone()),
        error_event("plugin_x", fault),
        LogEvent::new(Severity::Warn, "plugin_x", "careful"),
    ];

    let outcomes = h.service.ingest_batch(&events);
    assert!(matches!(outcomes[0], IngestOutcome::Dispatched(_)));
    assert_eq!(outcomes[1], IngestOutcome::Suppressed);
    assert_eq!(outcomes[2], IngestOutcome::BelowThreshold);
}

#[tokio::test]
async fn test_build_rejects_missing_or_invalid_input() {
    let build = |owner: Option<SessionOwner>, config: Config| {
        let mut builder = CaptureService::builder(config)
            .reporter(Arc::new(RecordingReporter::new()))
            .registry(Arc::new(registry()))
            .session(Arc::new(FakeSession::default()));
        if let Some(owner) = owner {
            builder = builder.owner(owner);
        }
        builder.build()
    };

    assert!(matches!(
        build(None, Config::default()),
        Err(BridgeError::MissingSessionOwner)
    ));

    let mut stale = owner();
    stale.valid = false;
    assert!(matches!(
        build(Some(stale), Config::default()),
        Err(BridgeError::InvalidSessionOwner { .. })
    ));

    let mut config = Config::default();
    config.dedup.ttl_seconds = 0;
    assert!(matches!(
        build(Some(owner()), config),
        Err(BridgeError::InvalidConfig { .. })
    ));

    let missing = CaptureService::builder(Config::default())
        .registry(Arc::new(registry()))
        .session(Arc::new(FakeSession::default()))
        .owner(owner())
        .build();
    assert!(matches!(
        missing,
        Err(BridgeError::MissingCollaborator { name: "reporter" })
    ));
}

#[test]
fn test_build_outside_runtime_fails() {
    let result = CaptureService::builder(Config::default())
        .reporter(Arc::new(RecordingReporter::new()))
        .registry(Arc::new(registry()))
        .session(Arc::new(FakeSession::default()))
        .owner(owner())
        .build();
    assert!(matches!(result, Err(BridgeError::NoRuntime)));
}

#[tokio::test]
async fn test_unresolved_frames_fall_back_to_hint() {
    let h = harness();
    let fault = Fault::new(
        "Panic",
        "boom",
        vec![Frame::unresolved("<unknown>"), Frame::new("capture", "service::ingest")],
    );

    h.service.capture(Arc::new(fault), "capture").await.unwrap();
    let report = h.reporter.last().unwrap();
    assert_eq!(report.context.tag("plugin"), Some("capture"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_captures_keep_their_own_context() {
    let h = harness();
    let mut tasks = Vec::new();
    for origin in ["plugin_x", "plugin_z", "plugin_w"] {
        let service = h.service.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                service
                    .capture(Arc::new(unique_fault(origin)), origin)
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let reports = h.reporter.reports();
    assert_eq!(reports.len(), 30);
    for report in reports {
        assert_eq!(report.context.tag("plugin"), Some(report.context.logger.as_str()));
        let frame_component = report.fault.frames()[2].component.clone();
        assert_eq!(frame_component.as_deref(), Some(report.context.logger.as_str()));
    }
}
