//! Device-side collaborators: restart requests and wall-clock time.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Asks the device to restart.
///
/// Fire-and-forget: the engine never waits for the restart to happen and
/// never observes a result. Implementations decide how the restart is
/// carried out (process exit, hardware reset, supervisor signal).
pub trait RestartRequester: Send + Sync {
    fn request(&self);
}

impl<T: RestartRequester + ?Sized> RestartRequester for &T {
    fn request(&self) {
        (**self).request()
    }
}

impl<T: RestartRequester + ?Sized> RestartRequester for Arc<T> {
    fn request(&self) {
        (**self).request()
    }
}

/// Source of wall-clock time for run reports.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
