//! Single, terminal shutdown signal for the whole pipeline.
//!
//! The host routes whichever of its own notifications apply (session end,
//! module unload, process exit, ctrl-c) to [`Lifecycle::disable`], directly or
//! through [`Lifecycle::disable_when`]. Nothing re-enables a disabled pipeline.

use fl_core::LifecycleState;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ShutdownReason {
    SessionEnded,
    Unloading,
    ProcessExit,
    Requested,
}

#[derive(Debug, Default)]
struct LifecycleInner {
    disabled: AtomicBool,
    token: CancellationToken,
}

/// Cheaply clonable handle; all clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    inner: Arc<LifecycleInner>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        if self.is_active() {
            LifecycleState::Active
        } else {
            LifecycleState::Disabled
        }
    }

    pub fn is_active(&self) -> bool {
        !self.inner.disabled.load(Ordering::Acquire)
    }

    /// Disable the pipeline. Returns `true` for the call that made the transition.
    pub fn disable(&self, reason: ShutdownReason) -> bool {
        if self.inner.disabled.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!(%reason, "Stopping reporter");
        self.inner.token.cancel();
        true
    }

    /// Token cancelled when the pipeline is disabled.
    pub fn shutdown_signal(&self) -> CancellationToken {
        self.inner.token.child_token()
    }

    /// Resolves once the pipeline is disabled.
    pub async fn disabled(&self) {
        self.inner.token.cancelled().await;
    }

    /// Disable the pipeline when `trigger` resolves. Must be called within a
    /// tokio runtime.
    pub fn disable_when<F>(&self, trigger: F, reason: ShutdownReason) -> JoinHandle<()>
    where
        F: Future + Send + 'static,
    {
        let lifecycle = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = trigger => {
                    lifecycle.disable(reason);
                }
                () = lifecycle.disabled() => {}
            }
        })
    }
}
