//! Single-flight guard.

use crate::ui::StatusSink;
use std::sync::atomic::{AtomicBool, Ordering};

/// Allows at most one holder at a time. A second `try_acquire` while the
/// first guard is alive returns `None`; requests are never queued.
#[derive(Debug, Default)]
pub struct SingleFlight {
    running: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the flag, or `None` if it is already held.
    ///
    /// When the guard drops (normally, on error, or while unwinding) the flag
    /// is released and `sink.on_ready()` is called.
    pub fn try_acquire<'a>(&'a self, sink: &'a dyn StatusSink) -> Option<FlightGuard<'a>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(FlightGuard { flight: self, sink })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Releases the [`SingleFlight`] flag on drop.
pub struct FlightGuard<'a> {
    flight: &'a SingleFlight,
    sink: &'a dyn StatusSink,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flight.running.store(false, Ordering::Release);
        self.sink.on_ready();
    }
}
