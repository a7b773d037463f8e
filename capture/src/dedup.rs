//! Time-windowed record of fingerprints that were already reported.
//!
//! An entry is present iff its fingerprint was recorded within the trailing
//! window. Expired entries count as absent and are removed lazily: on lookup,
//! and by a sweep on insert once the map has grown past the sweep threshold.
//! Check-then-record is left to the caller and is not atomic.

use dashmap::DashMap;
use fl_core::{Clock, Fingerprint};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);
const DEFAULT_SWEEP_THRESHOLD: usize = 1024;

pub struct DedupCache {
    entries: DashMap<Fingerprint, Instant>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    sweep_threshold: usize,
}

impl DedupCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_settings(clock, DEFAULT_TTL, DEFAULT_SWEEP_THRESHOLD)
    }

    pub fn with_settings(clock: Arc<dyn Clock>, default_ttl: Duration, sweep_threshold: usize) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            default_ttl,
            sweep_threshold: sweep_threshold.max(1),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// True iff an unexpired entry exists for `fingerprint`.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        let now = self.clock.now();
        match self.entries.get(fingerprint).map(|entry| *entry.value()) {
            Some(expires_at) if expires_at > now => true,
            Some(_) => {
                self.entries
                    .remove_if(fingerprint, |_, expires_at| *expires_at <= now);
                false
            }
            None => false,
        }
    }

    /// Record `fingerprint` for the default window, overwriting any entry.
    pub fn record(&self, fingerprint: Fingerprint) {
        self.record_for(fingerprint, self.default_ttl);
    }

    pub fn record_for(&self, fingerprint: Fingerprint, ttl: Duration) {
        let now = self.clock.now();
        if self.entries.len() >= self.sweep_threshold {
            self.entries.retain(|_, expires_at| *expires_at > now);
        }
        self.entries.insert(fingerprint, now + ttl);
    }

    /// Stored entries, expired ones not yet reclaimed included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for DedupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupCache")
            .field("entries", &self.entries.len())
            .field("default_ttl", &self.default_ttl)
            .field("sweep_threshold", &self.sweep_threshold)
            .finish()
    }
}
