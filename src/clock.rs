//! Wall-clock source shared by every component that derives phase timing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

/// Millisecond wall-clock handle.
///
/// Phase timing is always derived from an anchor timestamp instead of a live
/// countdown, so every caller re-computes remaining time from `now_ms()`
/// independently. The manual variant lets tests drive that derivation
/// deterministically.
#[derive(Debug, Clone)]
pub struct Clock {
    manual: Option<Arc<AtomicU64>>,
}

impl Clock {
    /// Clock backed by the system wall clock.
    pub fn system() -> Self {
        Self { manual: None }
    }

    /// Clock that only moves when advanced explicitly.
    pub fn manual(start_ms: u64) -> Self {
        Self {
            manual: Some(Arc::new(AtomicU64::new(start_ms))),
        }
    }

    /// Current time in milliseconds since the Unix epoch.
    pub fn now_ms(&self) -> u64 {
        match &self.manual {
            Some(cell) => cell.load(Ordering::SeqCst),
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_millis() as u64)
                .unwrap_or(0),
        }
    }

    /// Advance a manual clock by `delta_ms`. No effect on the system clock.
    pub fn advance_ms(&self, delta_ms: u64) {
        match &self.manual {
            Some(cell) => {
                cell.fetch_add(delta_ms, Ordering::SeqCst);
            }
            None => debug!(delta_ms, "ignoring advance on system clock"),
        }
    }
}
