//! Builds the report context for a fault that is about to be sent.
//!
//! Enrichment is best-effort: a session accessor that fails or panics is logged,
//! counted and left out, and the report goes out with whatever could be gathered.

use errors::SessionError;
use fl_core::{Clock, ComponentRegistry, Fault, HostSession, ReportContext};
use serde_json::{Map, Value};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::attribution::Attributor;
use crate::context::ServiceContext;
use crate::telemetry::CaptureTelemetry;

pub const TAG_PLUGIN: &str = "plugin";
pub const TAG_ID: &str = "id";
pub const TAG_BUILD: &str = "build";
pub const TAG_MAP: &str = "map";
pub const TAG_UNIT: &str = "unit";
pub const TAG_LATENCY: &str = "latency";
pub const TAG_GAME_VERSION: &str = "game_version";
pub const EXTRA_SESSION: &str = "session";

pub struct Enricher {
    own_component: String,
    attributor: Attributor,
    registry: Arc<dyn ComponentRegistry>,
    session: Arc<dyn HostSession>,
    context: ServiceContext,
    clock: Arc<dyn Clock>,
    started_at: Instant,
    local_id_max: i64,
    base: ReportContext,
    telemetry: CaptureTelemetry,
}

impl Enricher {
    pub fn new(
        own_component: impl Into<String>,
        attributor: Attributor,
        registry: Arc<dyn ComponentRegistry>,
        session: Arc<dyn HostSession>,
        context: ServiceContext,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let started_at = clock.now();
        Self {
            own_component: own_component.into(),
            attributor,
            registry,
            session,
            context,
            clock,
            started_at,
            local_id_max: 1000,
            base: ReportContext::default(),
            telemetry: CaptureTelemetry::default(),
        }
    }

    pub fn with_local_id_max(mut self, local_id_max: i64) -> Self {
        self.local_id_max = local_id_max;
        self
    }

    pub fn with_telemetry(mut self, telemetry: CaptureTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Session-scoped identity and tags shared by every report. The game
    /// version is read once here.
    pub fn with_base(
        mut self,
        user_id: Option<String>,
        environment: Option<String>,
        release: Option<String>,
    ) -> Self {
        let mut base = ReportContext {
            logger: self.own_component.clone(),
            user_id,
            ..ReportContext::default()
        };
        if let Some(environment) = environment {
            base.set_tag("environment", environment);
        }
        if let Some(release) = release {
            base.set_tag("release", release);
        }
        if let Some(version) = self.gather("build_version", || self.session.build_version()) {
            base.set_tag(TAG_GAME_VERSION, version);
        }
        self.base = base;
        self
    }

    pub fn own_component(&self) -> &str {
        &self.own_component
    }

    pub fn attributor(&self) -> &Attributor {
        &self.attributor
    }

    /// A fault logged under the bridge's own name is re-attributed from its
    /// stack; any other origin is trusted as-is.
    pub fn resolve_origin<'a>(&self, fault: &'a Fault, origin_hint: &'a str) -> &'a str {
        if origin_hint != self.own_component {
            return origin_hint;
        }
        match self.attributor.attribute(fault) {
            Some(component) => {
                debug!(component, "Fault re-attributed from stack");
                component
            }
            None => origin_hint,
        }
    }

    pub fn enrich(&self, fault: &Fault, origin_hint: &str) -> ReportContext {
        let origin = self.resolve_origin(fault, origin_hint);

        let mut ctx = self.base.clone();
        ctx.logger = origin.to_string();
        ctx.set_tag(TAG_PLUGIN, origin);
        self.component_tags(origin, &mut ctx);

        let unit = self.context.owner().unit_class.clone();
        ctx.set_tag(TAG_UNIT, unit.clone());

        let mut session = Map::new();
        session.insert("component".to_string(), Value::from(origin));
        session.insert("unit".to_string(), Value::from(unit));
        session.insert(
            "elapsed_secs".to_string(),
            Value::from(self.clock.now().duration_since(self.started_at).as_secs_f64()),
        );

        if let Some(level) = self.gather("level_name", || self.session.level_name()) {
            ctx.set_tag(TAG_MAP, level.clone());
            session.insert("level_name".to_string(), Value::from(level));
        }
        if let Some(latency) = self.gather("latency_ms", || self.session.latency_ms()) {
            ctx.set_tag(TAG_LATENCY, latency.to_string());
            session.insert("latency_ms".to_string(), Value::from(latency));
        }
        if let Some(mode) = self.gather("mode", || self.session.mode()) {
            session.insert("mode".to_string(), Value::from(mode));
        }
        if let Some(phase) = self.gather("phase", || self.session.phase()) {
            session.insert("phase".to_string(), Value::from(phase));
        }
        if let Some(game_time) = self.gather("game_time", || self.session.game_time()) {
            session.insert("game_time_secs".to_string(), Value::from(game_time.as_secs_f64()));
        }
        if let Some(version) = ctx.tag(TAG_GAME_VERSION) {
            session.insert("game_version".to_string(), Value::from(version));
        }

        ctx.set_extra(EXTRA_SESSION, Value::Object(session));
        ctx
    }

    fn component_tags(&self, origin: &str, ctx: &mut ReportContext) {
        match self.registry.lookup(origin) {
            Some(info) => {
                ctx.set_tag(TAG_ID, utils::component_id_tag(info.id, self.local_id_max));
                ctx.set_tag(TAG_BUILD, info.version);
            }
            None => {
                ctx.remove_tag(TAG_ID);
                ctx.remove_tag(TAG_BUILD);
            }
        }
    }

    /// Read one session field. An accessor that errors or panics is logged,
    /// counted and left out.
    fn gather<T>(
        &self,
        field: &'static str,
        read: impl FnOnce() -> Result<T, SessionError>,
    ) -> Option<T> {
        let result = catch_unwind(AssertUnwindSafe(read))
            .unwrap_or_else(|_| Err(SessionError::unavailable(field, "accessor panicked")));

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(field, error = %e, "Failed to read session field for report context");
                self.telemetry.record_enrichment_failure(field);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_core::{ComponentInfo, Frame, SessionOwner};
    use serde_json::json;
    use std::time::Duration;
    use testing::{FakeSession, ManualClock, StaticRegistry};

    fn owner() -> SessionOwner {
        SessionOwner {
            unit_id: "u-1".to_string(),
            unit_class: "hero_mage".to_string(),
            valid: true,
        }
    }

    fn enricher(session: FakeSession) -> (Arc<ManualClock>, Enricher) {
        let clock = Arc::new(ManualClock::new());
        let registry = StaticRegistry::new()
            .with(ComponentInfo {
                name: "plugin_x".to_string(),
                id: 42,
                version: "1.4.0".to_string(),
            })
            .with(ComponentInfo {
                name: "plugin_local".to_string(),
                id: 4242,
                version: "0.0.1-dev".to_string(),
            });
        let enricher = Enricher::new(
            "capture",
            Attributor::new("capture", ["fl_core"]),
            Arc::new(registry),
            Arc::new(session),
            ServiceContext::new(Some(owner())).unwrap(),
            clock.clone(),
        )
        .with_telemetry(CaptureTelemetry::disabled())
        .with_base(Some("user-1".to_string()), Some("staging".to_string()), None);
        (clock, enricher)
    }

    fn fault() -> Fault {
        Fault::new(
            "Panic",
            "boom",
            vec![
                Frame::new("capture", "service::capture"),
                Frame::new("plugin_x", "combat::tick"),
            ],
        )
    }

    #[test]
    fn test_own_component_hint_is_reattributed() {
        let (_clock, enricher) = enricher(FakeSession::default());
        let fault = fault();
        assert_eq!(enricher.resolve_origin(&fault, "capture"), "plugin_x");
        assert_eq!(enricher.resolve_origin(&fault, "plugin_z"), "plugin_z");

        let unattributable = Fault::new("Panic", "boom", vec![Frame::new("capture", "x")]);
        assert_eq!(enricher.resolve_origin(&unattributable, "capture"), "capture");
    }

    #[test]
    fn test_registered_component_tags() {
        let (_clock, enricher) = enricher(FakeSession::default());
        let ctx = enricher.enrich(&fault(), "capture");

        assert_eq!(ctx.logger, "plugin_x");
        assert_eq!(ctx.tag(TAG_PLUGIN), Some("plugin_x"));
        assert_eq!(ctx.tag(TAG_ID), Some("42"));
        assert_eq!(ctx.tag(TAG_BUILD), Some("1.4.0"));
        assert_eq!(ctx.tag(TAG_UNIT), Some("hero_mage"));
        assert_eq!(ctx.tag("environment"), Some("staging"));
        assert_eq!(ctx.user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_local_and_unknown_component_tags() {
        let (_clock, enricher) = enricher(FakeSession::default());

        let local = enricher.enrich(&fault(), "plugin_local");
        assert_eq!(local.tag(TAG_ID), Some("local"));
        assert_eq!(local.tag(TAG_BUILD), Some("0.0.1-dev"));

        let unknown = enricher.enrich(&fault(), "mystery");
        assert_eq!(unknown.tag(TAG_PLUGIN), Some("mystery"));
        assert_eq!(unknown.tag(TAG_ID), None);
        assert_eq!(unknown.tag(TAG_BUILD), None);
    }

    #[test]
    fn test_session_snapshot() {
        let session = FakeSession::default()
            .with_level_name("dota_arena")
            .with_latency_ms(48)
            .with_game_time(Duration::from_secs(90));
        let (clock, enricher) = enricher(session);
        clock.advance(Duration::from_secs(12));

        let ctx = enricher.enrich(&fault(), "plugin_x");
        assert_eq!(ctx.tag(TAG_MAP), Some("dota_arena"));
        assert_eq!(ctx.tag(TAG_LATENCY), Some("48"));
        assert_eq!(ctx.tag(TAG_GAME_VERSION), Some(FakeSession::DEFAULT_BUILD_VERSION));

        let session = ctx.extra(EXTRA_SESSION).unwrap();
        assert_eq!(session["latency_ms"], json!(48));
        assert_eq!(session["game_time_secs"], json!(90.0));
        assert_eq!(session["elapsed_secs"], json!(12.0));
        assert_eq!(session["component"], json!("plugin_x"));
    }

    #[test]
    fn test_failing_accessors_leave_partial_context() {
        let session = FakeSession::default()
            .failing("level_name")
            .failing("latency_ms")
            .failing("build_version");
        let (_clock, enricher) = enricher(session);

        let ctx = enricher.enrich(&fault(), "plugin_x");
        assert_eq!(ctx.tag(TAG_PLUGIN), Some("plugin_x"));
        assert_eq!(ctx.tag(TAG_MAP), None);
        assert_eq!(ctx.tag(TAG_LATENCY), None);
        assert_eq!(ctx.tag(TAG_GAME_VERSION), None);

        let session = ctx.extra(EXTRA_SESSION).unwrap();
        assert!(session.get("latency_ms").is_none());
        assert!(session.get("mode").is_some());
    }

    struct PanickingLatency(FakeSession);

    impl HostSession for PanickingLatency {
        fn level_name(&self) -> Result<String, SessionError> {
            self.0.level_name()
        }

        fn mode(&self) -> Result<String, SessionError> {
            self.0.mode()
        }

        fn phase(&self) -> Result<String, SessionError> {
            self.0.phase()
        }

        fn build_version(&self) -> Result<String, SessionError> {
            self.0.build_version()
        }

        fn latency_ms(&self) -> Result<u32, SessionError> {
            panic!("latency sampler crashed")
        }

        fn game_time(&self) -> Result<Duration, SessionError> {
            self.0.game_time()
        }
    }

    #[test]
    fn test_panicking_accessor_is_left_out() {
        let enricher = Enricher::new(
            "capture",
            Attributor::new("capture", ["fl_core"]),
            Arc::new(StaticRegistry::new()),
            Arc::new(PanickingLatency(FakeSession::default().with_level_name("dota_arena"))),
            ServiceContext::new(Some(owner())).unwrap(),
            Arc::new(ManualClock::new()),
        )
        .with_telemetry(CaptureTelemetry::disabled());

        let ctx = enricher.enrich(&fault(), "plugin_x");
        assert_eq!(ctx.tag(TAG_LATENCY), None);
        assert_eq!(ctx.tag(TAG_MAP), Some("dota_arena"));

        let session = ctx.extra(EXTRA_SESSION).unwrap();
        assert!(session.get("latency_ms").is_none());
        assert_eq!(session["level_name"], json!("dota_arena"));
    }
}
