//! Periodic self-registration with the host's logging backbone.
//!
//! For a bounded window after start-up the service rescans the backbone's
//! sub-channels and attaches itself to any it is not yet listening on. The
//! tick that finds the window elapsed flips the loop to `Expired`, does one
//! last scan and ends the task.

use fl_core::{Clock, LogListener, LoggingBackbone};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::service::CaptureService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RegistrationState {
    Scanning,
    Expired,
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still inside the window
    Continue { attached: usize },
    /// The window closed on this tick; its scan was the last one
    Expired { attached: usize },
    /// The pipeline is disabled, nothing was scanned
    Stopped,
}

pub struct SelfRegistration {
    service: Arc<CaptureService>,
    backbone: Arc<dyn LoggingBackbone>,
    clock: Arc<dyn Clock>,
    deadline: Instant,
    exclusions: HashSet<String>,
    expired: AtomicBool,
}

impl SelfRegistration {
    /// The window starts now, measured on the service's clock.
    pub fn new(service: &Arc<CaptureService>, backbone: Arc<dyn LoggingBackbone>) -> Self {
        let clock = Arc::clone(service.clock());
        let config = service.registration_config();
        let deadline = clock.now() + Duration::from_secs(config.window_seconds);
        Self {
            service: Arc::clone(service),
            backbone,
            clock,
            deadline,
            exclusions: config.channel_exclusions.iter().cloned().collect(),
            expired: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> RegistrationState {
        if self.expired.load(Ordering::Acquire) {
            RegistrationState::Expired
        } else {
            RegistrationState::Scanning
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn tick(&self) -> TickOutcome {
        if !self.service.lifecycle().is_active() {
            return TickOutcome::Stopped;
        }

        let mut expired_now = false;
        if self.clock.now() > self.deadline && !self.expired.swap(true, Ordering::AcqRel) {
            info!("Registration window elapsed, running final channel scan");
            expired_now = true;
        }

        let attached = self.scan();
        if expired_now {
            TickOutcome::Expired { attached }
        } else {
            TickOutcome::Continue { attached }
        }
    }

    /// Attach to every channel not excluded and not yet attached. A channel that
    /// fails is logged and skipped. Returns the number of new attachments.
    pub fn scan(&self) -> usize {
        let listener_id = self.service.listener_id();
        let listener: Arc<dyn LogListener> = self.service.clone();
        let telemetry = self.service.telemetry();
        let mut attached = 0;

        for channel in self.backbone.channels() {
            if self.exclusions.contains(&channel) {
                continue;
            }

            let result = self
                .backbone
                .is_attached(&channel, listener_id)
                .and_then(|present| {
                    if present {
                        Ok(false)
                    } else {
                        self.backbone.attach(&channel, Arc::clone(&listener)).map(|()| true)
                    }
                });

            match result {
                Ok(true) => {
                    debug!(%channel, "Attached to logging channel");
                    telemetry.record_channel_attached();
                    attached += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(%channel, error = %e, "Failed to attach to logging channel");
                    telemetry.record_channel_attach_failure();
                }
            }
        }

        attached
    }

    /// Drive the loop on `runtime` every `interval`, first tick immediately.
    pub fn spawn(self: Arc<Self>, runtime: &Handle, interval: Duration) -> RegistrationHandle {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let shutdown = self.service.lifecycle().shutdown_signal();

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = stop.cancelled() => {
                        debug!("Registration loop cancelled");
                        break;
                    }
                    () = shutdown.cancelled() => {
                        debug!("Registration loop stopped by shutdown");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.tick() {
                            TickOutcome::Continue { .. } => {}
                            TickOutcome::Expired { .. } | TickOutcome::Stopped => break,
                        }
                    }
                }
            }
        });

        RegistrationHandle { cancel, task }
    }
}

/// Owned handle to the spawned registration task.
pub struct RegistrationHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RegistrationHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to end. A panic inside the task is logged, not propagated.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "Registration task ended abnormally");
        }
    }
}
