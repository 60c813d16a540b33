//! The authoritative in-memory dispatch state.
//!
//! `DispatchState` owns drivers, riders, trips and driver plans. Every
//! operation is a plain synchronous `&mut self` method; the realtime layer
//! serializes calls behind its one lock and performs all I/O after release.
//! Cross-references between entities are id lookups, never pointers.
//!
//! Drivers, riders and trips live in insertion-ordered vectors (new riders
//! and trips go to the front, as the clients expect); plans are keyed by
//! driver id.

mod booking;
mod location;
mod routes;
mod trips;
mod view;

pub use booking::BookingResolution;
pub use location::LocationOutcome;
pub use view::{
    BackendSnapshot, DriverQueue, DriverSummary, DriverView, RiderRequestView, RouteView,
    SnapshotMetrics,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::catalog::Catalog;
use crate::model::{Driver, DriverPlan, Rider, RiderStatus, Trip};

static ID_SEQ: AtomicU64 = AtomicU64::new(0);

/// Process-unique id with a stable prefix, e.g. `trip-1731000000000000-17`.
fn next_id(prefix: &str) -> String {
    let seq = ID_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{}", Utc::now().timestamp_micros(), seq)
}

#[derive(Debug)]
pub struct DispatchState {
    catalog: Catalog,
    drivers: Vec<Driver>,
    riders: Vec<Rider>,
    trips: Vec<Trip>,
    plans: HashMap<String, DriverPlan>,
}

impl DispatchState {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            drivers: Vec::new(),
            riders: Vec::new(),
            trips: Vec::new(),
            plans: HashMap::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn driver(&self, id: &str) -> Option<&Driver> {
        self.drivers.iter().find(|d| d.id == id)
    }

    pub fn rider(&self, id: &str) -> Option<&Rider> {
        self.riders.iter().find(|r| r.id == id)
    }

    pub fn trip(&self, id: &str) -> Option<&Trip> {
        self.trips.iter().find(|t| t.id == id)
    }

    pub fn plan(&self, driver_id: &str) -> Option<&DriverPlan> {
        self.plans.get(driver_id)
    }

    fn driver_mut(&mut self, id: &str) -> Option<&mut Driver> {
        self.drivers.iter_mut().find(|d| d.id == id)
    }

    fn rider_mut(&mut self, id: &str) -> Option<&mut Rider> {
        self.riders.iter_mut().find(|r| r.id == id)
    }

    fn trip_mut(&mut self, id: &str) -> Option<&mut Trip> {
        self.trips.iter_mut().find(|t| t.id == id)
    }

    fn set_rider_status(&mut self, rider_id: &str, status: RiderStatus) {
        if let Some(rider) = self.rider_mut(rider_id) {
            rider.status = status;
        }
    }

    /// The rider's offer round has started.
    pub fn mark_rider_offering(&mut self, rider_id: &str) {
        self.set_rider_status(rider_id, RiderStatus::Offering);
    }

    /// The offer list was exhausted (or the match fell through); the rider is
    /// back in the waiting pool.
    pub fn reset_rider_waiting(&mut self, rider_id: &str) {
        self.set_rider_status(rider_id, RiderStatus::Waiting);
    }

    /// Hands one seat back to the driver and their plan, never exceeding the
    /// configured totals.
    fn return_seat(&mut self, driver_id: &str) {
        if let Some(driver) = self.driver_mut(driver_id) {
            if driver.seats_available < driver.seats_total {
                driver.seats_available += 1;
            }
        }
        if let Some(plan) = self.plans.get_mut(driver_id) {
            if plan.seats_available < plan.seats_total {
                plan.seats_available += 1;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_driver_for_test(&mut self, driver: Driver) {
        self.drivers.push(driver);
    }
}

#[cfg(test)]
mod invariant_tests {
    use super::*;
    use crate::model::{BookRideCommand, RouteConfigRequest, TripStatus};

    fn booked_state() -> (DispatchState, String) {
        let mut state = DispatchState::new(Catalog::metro_default());
        state
            .configure_driver_route(&RouteConfigRequest {
                driver_id: "d1".into(),
                name: "Ramesh".into(),
                car_details: "KA-01 Omni".into(),
                pickup_ids: vec!["pickup-wipro-gate".into()],
                seats: 2,
                ..Default::default()
            })
            .expect("configure route");
        state.record_driver_location("d1", 12.8471, 77.6621);
        state.start_driver_trip("d1", false).expect("start trip");
        let booking = state
            .book_ride(&BookRideCommand {
                command: "book".into(),
                rider_id: "r1".into(),
                name: "Priya".into(),
                pickup_id: "pickup-wipro-gate".into(),
                ..Default::default()
            })
            .expect("book ride");
        (state, booking.rider.id)
    }

    fn seats_plus_active_trips(state: &DispatchState, driver_id: &str) -> u32 {
        let active = state
            .trips
            .iter()
            .filter(|t| {
                t.driver_id == driver_id
                    && matches!(
                        t.status,
                        TripStatus::AwaitingRider | TripStatus::Pending | TripStatus::InProgress
                    )
            })
            .count() as u32;
        state.driver(driver_id).expect("driver").seats_available + active
    }

    #[test]
    fn seats_are_conserved_across_the_trip_lifecycle() {
        let (mut state, rider_id) = booked_state();
        assert_eq!(seats_plus_active_trips(&state, "d1"), 2);

        let trip = state.accept_offer("d1", &rider_id).expect("accept");
        assert_eq!(seats_plus_active_trips(&state, "d1"), 2);

        state.finalize_trip(&trip.id).expect("finalize");
        assert_eq!(seats_plus_active_trips(&state, "d1"), 2);

        state.complete_trip(&trip.id).expect("complete");
        assert_eq!(seats_plus_active_trips(&state, "d1"), 2);
        assert_eq!(state.driver("d1").unwrap().seats_available, 2);
    }

    #[test]
    fn seats_are_conserved_when_a_pending_trip_is_cancelled() {
        let (mut state, rider_id) = booked_state();
        let trip = state.accept_offer("d1", &rider_id).expect("accept");
        assert_eq!(state.driver("d1").unwrap().seats_available, 1);

        state.cancel_pending_trip(&trip.id).expect("cancel");
        assert_eq!(state.driver("d1").unwrap().seats_available, 2);
        assert_eq!(seats_plus_active_trips(&state, "d1"), 2);
        assert!(state.trip(&trip.id).is_none());
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = next_id("trip");
        let b = next_id("trip");
        assert_ne!(a, b);
    }
}
