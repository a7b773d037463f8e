//! Shared test collaborators for the faultline workspace.
//!
//! In-memory stand-ins for everything the capture pipeline talks to:
//! - [`ManualClock`]: time only moves when a test says so
//! - [`RecordingReporter`]: keeps every report, can be told to fail or stall
//! - [`InMemoryBackbone`]: named channels with listener bookkeeping
//! - [`StaticRegistry`] and [`FakeSession`]: host state lookups

mod backbone;
mod clock;
mod fixtures;
mod reporter;
mod session;

pub use backbone::InMemoryBackbone;
pub use clock::ManualClock;
pub use fixtures::*;
pub use reporter::RecordingReporter;
pub use session::{FakeSession, StaticRegistry};
