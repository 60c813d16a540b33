//! Simulated driver movement for demo shifts.
//!
//! The task hops through the pre-resolved waypoints (each pickup, then its
//! station) at a fixed cadence, feeding every synthetic position through the
//! same ingestion path as a real location update. Cancellation is an abort
//! of the task; the sleep points make that prompt, and the hub never waits
//! for the task to finish.

use std::time::Duration;

use tokio::task::AbortHandle;

use crate::hub::Hub;

/// Pause between simulated waypoints.
pub(crate) const SIMULATION_HOP: Duration = Duration::from_secs(3);

pub(crate) fn spawn(hub: Hub, driver_id: String, hops: Vec<(f64, f64)>) -> AbortHandle {
    let handle = tokio::spawn(async move {
        for (latitude, longitude) in hops {
            hub.record_location(&driver_id, latitude, longitude);
            tokio::time::sleep(SIMULATION_HOP).await;
        }
    });
    handle.abort_handle()
}
