//! "First external caller" heuristic.
//!
//! Frames are walked innermost first. Unresolvable frames, platform frames and
//! frames of excluded components (the bridge itself and shared toolkits) are
//! skipped; the first remaining component is blamed.

use fl_core::Fault;
use std::collections::HashSet;

pub fn attribute<'a>(fault: &'a Fault, exclusions: &HashSet<String>) -> Option<&'a str> {
    fault
        .frames()
        .iter()
        .filter(|frame| !frame.trusted)
        .filter_map(|frame| frame.component.as_deref())
        .find(|component| !exclusions.contains(*component))
}

/// Attribution with a fixed exclusion set.
#[derive(Debug, Clone)]
pub struct Attributor {
    exclusions: HashSet<String>,
}

impl Attributor {
    /// `own_component` is always excluded in addition to `exclusions`.
    pub fn new<I, S>(own_component: &str, exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: HashSet<String> = exclusions.into_iter().map(Into::into).collect();
        set.insert(own_component.to_string());
        Self { exclusions: set }
    }

    pub fn attribute<'a>(&self, fault: &'a Fault) -> Option<&'a str> {
        attribute(fault, &self.exclusions)
    }

    pub fn is_excluded(&self, component: &str) -> bool {
        self.exclusions.contains(component)
    }
}
