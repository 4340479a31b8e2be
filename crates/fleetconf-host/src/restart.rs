//! Restart signalling between the engine and the agent's main loop.
//!
//! On the host a "restart" is a graceful process exit with
//! [`RESTART_EXIT_CODE`]; the service supervisor starts the agent again and
//! the new process picks up the stored effective configuration.

use std::sync::atomic::{AtomicBool, Ordering};

use fleetconf_core::RestartRequester;
use tokio::sync::Notify;
use tracing::info;

/// Exit status used when leaving to apply a new configuration (`EX_TEMPFAIL`).
pub const RESTART_EXIT_CODE: i32 = 75;

/// Latching restart flag with an async waiter.
#[derive(Debug, Default)]
pub struct RestartSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl RestartSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once a restart has been requested.
    pub async fn requested(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

impl RestartRequester for RestartSignal {
    fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            info!("restart requested");
        }
        self.notify.notify_waiters();
    }
}
