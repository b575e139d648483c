use jiff::{Span, Timestamp};
use parking_lot::Mutex;
use std::sync::Arc;

/// Source of "now" for cookie expiry. Tests use a mock clock they can move.
#[derive(Clone, Default)]
pub struct TimeSource {
    mock: Option<Arc<Mutex<Timestamp>>>,
}

impl TimeSource {
    pub fn system() -> Self {
        Self { mock: None }
    }

    pub fn mock(initial_time: Timestamp) -> Self {
        Self {
            mock: Some(Arc::new(Mutex::new(initial_time))),
        }
    }

    pub fn now(&self) -> Timestamp {
        match &self.mock {
            Some(time) => *time.lock(),
            None => Timestamp::now(),
        }
    }

    /// Move a mock clock forward. No-op on the system clock.
    pub fn advance(&self, duration: Span) {
        if let Some(time) = &self.mock {
            let mut time = time.lock();
            match time.checked_add(duration) {
                Ok(next) => *time = next,
                Err(e) => tracing::warn!("cannot advance mock time: {e}"),
            }
        }
    }

    pub fn set(&self, now: Timestamp) {
        if let Some(time) = &self.mock {
            *time.lock() = now;
        }
    }
}
