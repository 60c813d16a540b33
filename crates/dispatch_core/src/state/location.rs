//! Location ingestion and checkpoint progression.
//!
//! Every accepted driver position does three things, in order: advance the
//! route index when the next pickup is within 120 m, start any pending trips
//! waiting at a crossed pickup, and complete any in-progress trips whose
//! station centroid is within 150 m.

use chrono::Utc;

use crate::geo;
use crate::model::{PickupPoint, RiderStatus, Trip, TripStatus};

use super::DispatchState;

/// What a single location update changed.
#[derive(Debug, Clone, Default)]
pub struct LocationOutcome {
    pub crossed_pickup: Option<PickupPoint>,
    pub started_trips: Vec<Trip>,
    pub completed_trips: Vec<Trip>,
}

impl DispatchState {
    /// Records a driver position. Unknown drivers are tolerated: the update
    /// simply has nothing to move.
    pub fn record_driver_location(
        &mut self,
        driver_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> LocationOutcome {
        if let Some(driver) = self.driver_mut(driver_id) {
            driver.latitude = latitude;
            driver.longitude = longitude;
        }

        let crossed_pickup = self.advance_route_checkpoint(driver_id, latitude, longitude);
        let started_trips = match &crossed_pickup {
            Some(pickup) => self.start_trips_at_pickup(driver_id, &pickup.id),
            None => Vec::new(),
        };
        let completed_trips = self.complete_trips_near_station(driver_id, latitude, longitude);

        LocationOutcome {
            crossed_pickup,
            started_trips,
            completed_trips,
        }
    }

    /// Moves the plan's route index forward when the driver reaches the next
    /// pickup. The index never moves backwards; a stop whose pickup id has
    /// vanished from the catalog is skipped.
    fn advance_route_checkpoint(
        &mut self,
        driver_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Option<PickupPoint> {
        let next_id = {
            let plan = self.plans.get(driver_id)?;
            plan.pickup_ids.get(plan.current_index)?.clone()
        };
        let pickup = self.catalog.pickup_by_id(&next_id).cloned();
        let plan = self.plans.get_mut(driver_id)?;
        match pickup {
            None => {
                plan.current_index += 1;
                None
            }
            Some(pickup) => {
                let distance =
                    geo::haversine_meters(latitude, longitude, pickup.latitude, pickup.longitude);
                if distance <= geo::PICKUP_RADIUS_M {
                    plan.current_index += 1;
                    Some(pickup)
                } else {
                    None
                }
            }
        }
    }

    fn start_trips_at_pickup(&mut self, driver_id: &str, pickup_id: &str) -> Vec<Trip> {
        let mut started = Vec::new();
        let trip_ids: Vec<String> = self
            .trips
            .iter()
            .filter(|t| {
                t.driver_id == driver_id
                    && t.pickup_id == pickup_id
                    && t.status == TripStatus::Pending
            })
            .map(|t| t.id.clone())
            .collect();
        for id in trip_ids {
            if let Some(trip) = self.trip_mut(&id) {
                trip.status = TripStatus::InProgress;
                started.push(trip.clone());
            }
        }
        for trip in &started {
            self.set_rider_status(&trip.rider_id, RiderStatus::PickedUp);
        }
        started
    }

    fn complete_trips_near_station(
        &mut self,
        driver_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Vec<Trip> {
        let now = Utc::now();
        let trip_ids: Vec<String> = self
            .trips
            .iter()
            .filter(|t| t.driver_id == driver_id && t.status == TripStatus::InProgress)
            .filter(|t| match self.catalog.station_by_id(&t.station_id) {
                Some(station) => {
                    geo::haversine_meters(latitude, longitude, station.latitude, station.longitude)
                        <= geo::DROPOFF_RADIUS_M
                }
                None => false,
            })
            .map(|t| t.id.clone())
            .collect();

        let mut completed = Vec::new();
        for id in trip_ids {
            if let Some(trip) = self.trip_mut(&id) {
                trip.status = TripStatus::Completed;
                trip.completed_at = Some(now);
                completed.push(trip.clone());
            }
        }
        for trip in &completed {
            self.return_seat(&trip.driver_id);
            self.set_rider_status(&trip.rider_id, RiderStatus::Completed);
        }
        completed
    }
}
