//! Trip lifecycle: acceptance, the approval handshake outcome, and
//! completion. Seat accounting happens here and nowhere else.

use chrono::Utc;

use crate::error::DispatchError;
use crate::model::{compatible_destination, RiderStatus, Trip, TripStatus, DEFAULT_ETA_MINUTES};

use super::{next_id, DispatchState};

impl DispatchState {
    /// A driver takes the rider: consumes one seat and creates the trip in
    /// `awaiting_rider`, pending the rider's own confirmation.
    pub fn accept_offer(&mut self, driver_id: &str, rider_id: &str) -> Result<Trip, DispatchError> {
        let rider = self
            .rider(rider_id)
            .ok_or_else(|| DispatchError::not_found(format!("rider '{rider_id}' not found")))?
            .clone();

        let driver = self
            .driver(driver_id)
            .ok_or_else(|| DispatchError::not_found(format!("driver '{driver_id}' not found")))?;

        let (targets, seats_left, driver_destination) = match self.plans.get(driver_id) {
            Some(plan) => (
                plan.target_stations.clone(),
                plan.seats_available,
                plan.destination.clone(),
            ),
            None => (
                driver.route_targets.clone(),
                driver.seats_available,
                driver.destination.clone(),
            ),
        };

        if !targets.iter().any(|id| id == &rider.station_id) {
            return Err(DispatchError::precondition(format!(
                "driver '{driver_id}' is not routed to station '{}'",
                rider.station_id
            )));
        }
        if seats_left == 0 {
            return Err(DispatchError::precondition(format!(
                "driver '{driver_id}' has no seats left"
            )));
        }
        if !compatible_destination(&driver_destination, &rider.destination) {
            return Err(DispatchError::precondition(format!(
                "driver '{driver_id}' has a different destination"
            )));
        }

        if let Some(driver) = self.driver_mut(driver_id) {
            driver.seats_available = driver.seats_available.saturating_sub(1);
        }
        if let Some(plan) = self.plans.get_mut(driver_id) {
            plan.seats_available = plan.seats_available.saturating_sub(1);
        }

        let id = next_id("trip");
        let trip = Trip {
            id: id.clone(),
            driver_id: driver_id.to_string(),
            rider_id: rider.id.clone(),
            station_id: rider.station_id.clone(),
            pickup_id: rider.pickup_id.clone(),
            destination: rider.destination.clone(),
            eta_minutes: DEFAULT_ETA_MINUTES,
            status: TripStatus::AwaitingRider,
            created_at: Utc::now(),
            completed_at: None,
            room_id: id,
        };
        self.trips.insert(0, trip.clone());
        self.set_rider_status(&rider.id, RiderStatus::Matched);
        Ok(trip)
    }

    /// The rider confirmed: the trip leaves the approval queue and joins the
    /// live list.
    pub fn finalize_trip(&mut self, trip_id: &str) -> Result<Trip, DispatchError> {
        let trip = self
            .trip_mut(trip_id)
            .ok_or_else(|| DispatchError::not_found(format!("trip '{trip_id}' not found")))?;
        if trip.status != TripStatus::AwaitingRider {
            return Err(DispatchError::precondition(format!(
                "trip '{trip_id}' is not awaiting rider approval"
            )));
        }
        trip.status = TripStatus::Pending;
        let trip = trip.clone();
        self.set_rider_status(&trip.rider_id, RiderStatus::Confirmed);
        Ok(trip)
    }

    /// The handshake fell through (decline, timeout, disconnect): the trip is
    /// removed, the seat returned and the rider goes back to waiting.
    pub fn cancel_pending_trip(&mut self, trip_id: &str) -> Result<Trip, DispatchError> {
        let index = self
            .trips
            .iter()
            .position(|t| t.id == trip_id)
            .ok_or_else(|| DispatchError::not_found(format!("trip '{trip_id}' not found")))?;
        if self.trips[index].status != TripStatus::AwaitingRider {
            return Err(DispatchError::precondition(format!(
                "trip '{trip_id}' is not awaiting rider approval"
            )));
        }
        let trip = self.trips.remove(index);
        self.return_seat(&trip.driver_id);
        self.set_rider_status(&trip.rider_id, RiderStatus::Waiting);
        Ok(trip)
    }

    /// Completes a trip. Idempotent: only the first call flips the status and
    /// returns the seat; the boolean reports whether this call was the first.
    pub fn complete_trip(&mut self, trip_id: &str) -> Result<(Trip, bool), DispatchError> {
        let trip = self
            .trip_mut(trip_id)
            .ok_or_else(|| DispatchError::not_found(format!("trip '{trip_id}' not found")))?;
        if trip.status == TripStatus::Completed {
            return Ok((trip.clone(), false));
        }
        trip.status = TripStatus::Completed;
        trip.completed_at = Some(Utc::now());
        let trip = trip.clone();
        self.return_seat(&trip.driver_id);
        self.set_rider_status(&trip.rider_id, RiderStatus::Completed);
        Ok((trip, true))
    }
}
