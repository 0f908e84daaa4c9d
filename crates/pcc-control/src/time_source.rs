//! Clock abstraction used by the pacer.

use std::time::Instant;

#[cfg(test)]
use std::{sync::Arc, time::Duration};

pub trait TimeSource: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// A simple time source that returns the current time using `Instant::now()`.
#[derive(Clone, Copy, Debug, Default)]
pub struct InstantTimeSrc(());

impl InstantTimeSrc {
    pub fn new() -> Self {
        InstantTimeSrc(())
    }
}

impl TimeSource for InstantTimeSrc {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock whose clones all observe the same time.
#[cfg(test)]
#[derive(Clone)]
pub(crate) struct SharedMockTimeSource {
    current_instant: Arc<parking_lot::Mutex<Instant>>,
}

#[cfg(test)]
impl SharedMockTimeSource {
    pub(crate) fn new(start_instant: Instant) -> Self {
        SharedMockTimeSource {
            current_instant: Arc::new(parking_lot::Mutex::new(start_instant)),
        }
    }

    pub(crate) fn advance_time(&self, duration: Duration) {
        *self.current_instant.lock() += duration;
    }
}

#[cfg(test)]
impl TimeSource for SharedMockTimeSource {
    fn now(&self) -> Instant {
        *self.current_instant.lock()
    }
}
