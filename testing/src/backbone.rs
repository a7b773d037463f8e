use errors::BackboneError;
use fl_core::{ListenerId, LogEvent, LogListener, LoggingBackbone};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Logging backbone with named channels held in memory.
#[derive(Default)]
pub struct InMemoryBackbone {
    channels: Mutex<Vec<String>>,
    listeners: Mutex<HashMap<String, Vec<Arc<dyn LogListener>>>>,
    failing: Mutex<HashSet<String>>,
    scans: AtomicUsize,
    attach_calls: AtomicUsize,
}

impl InMemoryBackbone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backbone = Self::new();
        for channel in channels {
            backbone.add_channel(channel);
        }
        backbone
    }

    pub fn add_channel(&self, channel: impl Into<String>) {
        let channel = channel.into();
        let mut channels = self.channels.lock();
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }

    /// Make every attach to `channel` fail.
    pub fn fail_channel(&self, channel: impl Into<String>) {
        self.failing.lock().insert(channel.into());
    }

    pub fn heal_channel(&self, channel: &str) {
        self.failing.lock().remove(channel);
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.listeners.lock().get(channel).map_or(0, Vec::len)
    }

    /// Times `channels` was called
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn attach_calls(&self) -> usize {
        self.attach_calls.load(Ordering::SeqCst)
    }

    /// Deliver `event` to the listeners of `channel`, outside the lock.
    pub fn emit(&self, channel: &str, event: &LogEvent) -> usize {
        let listeners = self.listeners.lock().get(channel).cloned().unwrap_or_default();
        for listener in &listeners {
            listener.on_event(event);
        }
        listeners.len()
    }
}

impl LoggingBackbone for InMemoryBackbone {
    fn channels(&self) -> Vec<String> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.channels.lock().clone()
    }

    fn is_attached(&self, channel: &str, listener: ListenerId) -> Result<bool, BackboneError> {
        if !self.channels.lock().iter().any(|c| c == channel) {
            return Err(BackboneError::ChannelUnavailable {
                channel: channel.to_string(),
            });
        }
        Ok(self
            .listeners
            .lock()
            .get(channel)
            .is_some_and(|attached| attached.iter().any(|l| l.listener_id() == listener)))
    }

    fn attach(&self, channel: &str, listener: Arc<dyn LogListener>) -> Result<(), BackboneError> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(channel) {
            return Err(BackboneError::AttachFailed {
                channel: channel.to_string(),
                reason: "channel refused listener".to_string(),
            });
        }
        self.listeners
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push(listener);
        Ok(())
    }
}
