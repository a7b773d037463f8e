//! Hands finished reports to the outbound reporter.
//!
//! `send` is the awaited path. `dispatch` spawns the send on the runtime the
//! service was built on and returns at once; spawned sends are tracked so they
//! can be awaited on shutdown, but never cancelled.

use errors::ReporterError;
use fl_core::{FaultReport, OutboundReporter};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::telemetry::CaptureTelemetry;

pub struct Dispatcher {
    reporter: Arc<dyn OutboundReporter>,
    runtime: Handle,
    tracker: TaskTracker,
    telemetry: CaptureTelemetry,
}

impl Dispatcher {
    pub fn new(
        reporter: Arc<dyn OutboundReporter>,
        runtime: Handle,
        telemetry: CaptureTelemetry,
    ) -> Self {
        Self {
            reporter,
            runtime,
            tracker: TaskTracker::new(),
            telemetry,
        }
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub async fn send(&self, report: FaultReport) -> Result<(), ReporterError> {
        let event_id = report.event_id;
        match self.reporter.send(report).await {
            Ok(()) => {
                debug!(%event_id, "Report sent");
                self.telemetry.record_report_sent("sync");
                Ok(())
            }
            Err(e) => {
                warn!(%event_id, error = %e, "Failed to send report");
                self.telemetry.record_report_failure("sync", e.kind());
                Err(e)
            }
        }
    }

    pub fn dispatch(&self, report: FaultReport) {
        let reporter = Arc::clone(&self.reporter);
        let telemetry = self.telemetry;
        let event_id = report.event_id;

        self.tracker.spawn_on(
            async move {
                match reporter.send(report).await {
                    Ok(()) => {
                        debug!(%event_id, "Report sent");
                        telemetry.record_report_sent("async");
                    }
                    Err(e) => {
                        warn!(%event_id, error = %e, "Failed to send report");
                        telemetry.record_report_failure("async", e.kind());
                    }
                }
            },
            &self.runtime,
        );
    }

    /// Sends dispatched but not yet finished
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every dispatched send. Returns `false` if `timeout` elapsed first.
    pub async fn flush(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let finished = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        self.tracker.reopen();
        finished
    }
}
