//! Per-rider offer round: the ranked attempt list, the cursor, and the
//! driver currently holding the offer. At most one queue exists per rider,
//! and within a queue at most one driver is waiting at a time.

use std::time::Duration;

use tokio::task::AbortHandle;

use dispatch_core::model::{DriverAttempt, PickupPoint, Rider, Station};

/// How long a driver holds an offer before the round moves on.
pub(crate) const OFFER_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug)]
pub(crate) struct OfferQueue {
    pub rider: Rider,
    pub station: Station,
    pub pickup: PickupPoint,
    pub attempts: Vec<DriverAttempt>,
    pub index: usize,
    pub waiting: Option<String>,
    pub timer: Option<AbortHandle>,
}

impl OfferQueue {
    pub fn new(
        rider: Rider,
        station: Station,
        pickup: PickupPoint,
        attempts: Vec<DriverAttempt>,
    ) -> Self {
        Self {
            rider,
            station,
            pickup,
            attempts,
            index: 0,
            waiting: None,
            timer: None,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.index >= self.attempts.len()
    }

    /// Stops the pending timer, if any. Aborting an already finished task is
    /// harmless, so this is safe to call from any transition.
    pub fn abort_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}
