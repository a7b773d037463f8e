use async_trait::async_trait;
use errors::ReporterError;
use fl_core::{FaultReport, OutboundReporter};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Reporter that keeps every report it accepts.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<FaultReport>>,
    failure: Mutex<Option<ReporterError>>,
    delay: Mutex<Option<Duration>>,
    attempts: AtomicUsize,
    notify: Notify,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following send with `error`.
    pub fn fail_with(&self, error: ReporterError) {
        *self.failure.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    /// Hold every following send for `delay` before answering.
    pub fn stall_for(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn reports(&self) -> Vec<FaultReport> {
        self.reports.lock().clone()
    }

    pub fn sent(&self) -> usize {
        self.reports.lock().len()
    }

    /// Sends attempted, successful or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<FaultReport> {
        self.reports.lock().last().cloned()
    }

    /// Wait until at least `count` sends were attempted. Returns `false` on timeout.
    pub async fn wait_for_attempts(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.attempts() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

#[async_trait]
impl OutboundReporter for RecordingReporter {
    async fn send(&self, report: FaultReport) -> Result<(), ReporterError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.lock().clone();
        let result = match failure {
            Some(error) => Err(error),
            None => {
                self.reports.lock().push(report);
                Ok(())
            }
        };

        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
        result
    }
}
