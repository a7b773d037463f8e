use errors::SessionError;
use fl_core::{ComponentInfo, ComponentRegistry, HostSession};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Registry answering from a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    components: HashMap<String, ComponentInfo>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, info: ComponentInfo) -> Self {
        self.components.insert(info.name.clone(), info);
        self
    }
}

impl ComponentRegistry for StaticRegistry {
    fn lookup(&self, name: &str) -> Option<ComponentInfo> {
        self.components.get(name).cloned()
    }
}

/// Host session with settable values. Any accessor can be made to fail.
#[derive(Debug, Clone)]
pub struct FakeSession {
    level_name: String,
    mode: String,
    phase: String,
    build_version: String,
    latency_ms: u32,
    game_time: Duration,
    failing: HashSet<String>,
}

impl FakeSession {
    pub const DEFAULT_BUILD_VERSION: &'static str = "7.35d";

    pub fn with_level_name(mut self, level_name: impl Into<String>) -> Self {
        self.level_name = level_name.into();
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = phase.into();
        self
    }

    pub fn with_build_version(mut self, build_version: impl Into<String>) -> Self {
        self.build_version = build_version.into();
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u32) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_game_time(mut self, game_time: Duration) -> Self {
        self.game_time = game_time;
        self
    }

    /// Make the accessor named `field` fail, e.g. `"latency_ms"`.
    pub fn failing(mut self, field: impl Into<String>) -> Self {
        self.failing.insert(field.into());
        self
    }

    fn read<T: Clone>(&self, field: &str, value: &T) -> Result<T, SessionError> {
        if self.failing.contains(field) {
            Err(SessionError::unavailable(field, "accessor failed"))
        } else {
            Ok(value.clone())
        }
    }
}

impl Default for FakeSession {
    fn default() -> Self {
        Self {
            level_name: "training_grounds".to_string(),
            mode: "all_pick".to_string(),
            phase: "in_progress".to_string(),
            build_version: Self::DEFAULT_BUILD_VERSION.to_string(),
            latency_ms: 30,
            game_time: Duration::ZERO,
            failing: HashSet::new(),
        }
    }
}

impl HostSession for FakeSession {
    fn level_name(&self) -> Result<String, SessionError> {
        self.read("level_name", &self.level_name)
    }

    fn mode(&self) -> Result<String, SessionError> {
        self.read("mode", &self.mode)
    }

    fn phase(&self) -> Result<String, SessionError> {
        self.read("phase", &self.phase)
    }

    fn build_version(&self) -> Result<String, SessionError> {
        self.read("build_version", &self.build_version)
    }

    fn latency_ms(&self) -> Result<u32, SessionError> {
        self.read("latency_ms", &self.latency_ms)
    }

    fn game_time(&self) -> Result<Duration, SessionError> {
        self.read("game_time", &self.game_time)
    }
}
