use fl_core::{ComponentInfo, Fault, Frame, SessionOwner};
use std::sync::atomic::{AtomicU32, Ordering};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

pub fn owner() -> SessionOwner {
    SessionOwner {
        unit_id: unique_id("unit"),
        unit_class: "hero_mage".to_string(),
        valid: true,
    }
}

pub fn component(name: &str, id: i64, version: &str) -> ComponentInfo {
    ComponentInfo {
        name: name.to_string(),
        id,
        version: version.to_string(),
    }
}

/// Fault raised in `component`, called through the bridge's own frames.
pub fn fault_from(component: &str, function: &str) -> Fault {
    Fault::new(
        "Panic",
        format!("{function} failed"),
        vec![
            Frame::new("std", "panicking::begin_panic"),
            Frame::new("capture", "service::CaptureService::capture"),
            Frame::new(component, function),
        ],
    )
}

/// Fault whose stack trace is unique per call.
pub fn unique_fault(component: &str) -> Fault {
    fault_from(component, &unique_id("handler"))
}
