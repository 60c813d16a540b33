//! Per-trip rider confirmation: the pending approval context and the
//! human-readable copy for cancellation reasons.

use std::time::Duration;

use tokio::task::AbortHandle;

use dispatch_core::model::{PickupPoint, Rider, Station, Trip};

/// How long the rider has to confirm before the match is unwound.
pub(crate) const APPROVAL_TIMEOUT: Duration = Duration::from_secs(25);

#[derive(Debug)]
pub(crate) struct PendingApproval {
    pub trip: Trip,
    pub pickup: Option<PickupPoint>,
    pub station: Option<Station>,
    pub rider: Rider,
    pub driver_name: String,
    pub timer: Option<AbortHandle>,
}

impl PendingApproval {
    pub fn abort_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}

/// Push-notification copy for a cancelled match; unmapped reasons pass
/// through unchanged.
pub(crate) fn cancel_reason_message(reason: &str) -> String {
    match reason {
        "rider_timeout" => "Rider approval timed out".to_string(),
        "rider_declined" => "Rider declined the trip".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_reasons_map_to_readable_copy() {
        assert_eq!(cancel_reason_message("rider_timeout"), "Rider approval timed out");
        assert_eq!(cancel_reason_message("rider_declined"), "Rider declined the trip");
    }

    #[test]
    fn unknown_reasons_are_echoed() {
        assert_eq!(cancel_reason_message("rider_disconnected"), "rider_disconnected");
    }
}
