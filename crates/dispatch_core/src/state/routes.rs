//! Driver route configuration and shift start.

use chrono::Utc;

use crate::error::DispatchError;
use crate::model::{Driver, DriverPlan, DriverStatus, RouteConfigRequest, RoutePlan};

use super::DispatchState;

impl DispatchState {
    /// Installs (or replaces) a driver's plan from the raw pickup selection.
    /// Pickup ids are trimmed, deduplicated and checked against the catalog;
    /// a seat count of zero or less is coerced to one. The driver record is
    /// upserted alongside so candidate ranking sees the route immediately.
    pub fn configure_driver_route(
        &mut self,
        req: &RouteConfigRequest,
    ) -> Result<RoutePlan, DispatchError> {
        let driver_id = req.driver_id.trim();
        if driver_id.is_empty() {
            return Err(DispatchError::invalid("driverId is required"));
        }
        let normalized = self.catalog.normalize_pickup_ids(&req.pickup_ids);
        if normalized.is_empty() {
            return Err(DispatchError::invalid("select at least one pickup point"));
        }
        let seats = if req.seats <= 0 { 1 } else { req.seats as u32 };
        let targets = self.catalog.station_ids_for_pickups(&normalized);
        if targets.is_empty() {
            return Err(DispatchError::invalid(
                "unable to infer metro stations for selected pickups",
            ));
        }
        let mut destination = req.destination.trim().to_string();
        if destination.is_empty() {
            if let Some(last) = normalized.last() {
                destination = self.catalog.pickup_display_name(last);
            }
        }
        let pickup_points = self.catalog.pickups_for_ids(&normalized);

        self.plans.insert(
            driver_id.to_string(),
            DriverPlan {
                driver_id: driver_id.to_string(),
                pickup_ids: normalized,
                seats_total: seats,
                seats_available: seats,
                target_stations: targets.clone(),
                destination: destination.clone(),
                current_index: 0,
                active: false,
                started_at: None,
                simulated: false,
            },
        );
        self.upsert_driver(driver_id, &req.name, &req.car_details, seats, &targets, &destination);

        Ok(RoutePlan {
            driver_id: driver_id.to_string(),
            pickup_points,
            seats_total: seats,
            seats_available: seats,
            target_stations: targets,
            destination,
        })
    }

    /// Activates the driver's plan for a shift: full seat pool, route index
    /// back at the first stop. Fails when no route was configured.
    pub fn start_driver_trip(
        &mut self,
        driver_id: &str,
        simulate: bool,
    ) -> Result<RoutePlan, DispatchError> {
        let driver_id = driver_id.trim();
        if driver_id.is_empty() {
            return Err(DispatchError::invalid("driverId is required"));
        }
        let plan = self.plans.get_mut(driver_id).ok_or_else(|| {
            DispatchError::precondition("configure a route before starting a trip")
        })?;
        plan.active = true;
        plan.started_at = Some(Utc::now());
        plan.seats_available = plan.seats_total;
        plan.current_index = 0;
        plan.simulated = simulate;

        let pickup_ids = plan.pickup_ids.clone();
        let seats_total = plan.seats_total;
        let targets = plan.target_stations.clone();
        let destination = plan.destination.clone();

        if let Some(driver) = self.driver_mut(driver_id) {
            driver.seats_available = seats_total;
            driver.status = DriverStatus::Active;
        }

        Ok(RoutePlan {
            driver_id: driver_id.to_string(),
            pickup_points: self.catalog.pickups_for_ids(&pickup_ids),
            seats_total,
            seats_available: seats_total,
            target_stations: targets,
            destination,
        })
    }

    fn upsert_driver(
        &mut self,
        driver_id: &str,
        name: &str,
        car_details: &str,
        seats: u32,
        targets: &[String],
        destination: &str,
    ) {
        if let Some(driver) = self.driver_mut(driver_id) {
            if !name.trim().is_empty() {
                driver.name = name.trim().to_string();
            }
            if !car_details.trim().is_empty() {
                driver.car_details = car_details.trim().to_string();
            }
            driver.seats_total = seats;
            driver.seats_available = seats;
            driver.status = DriverStatus::Active;
            driver.route_targets = targets.to_vec();
            driver.destination = destination.to_string();
            return;
        }
        let display_name = if name.trim().is_empty() {
            driver_id.to_string()
        } else {
            name.trim().to_string()
        };
        self.drivers.push(Driver {
            id: driver_id.to_string(),
            name: display_name,
            car_details: car_details.trim().to_string(),
            seats_total: seats,
            seats_available: seats,
            status: DriverStatus::Active,
            route_targets: targets.to_vec(),
            destination: destination.to_string(),
            latitude: 0.0,
            longitude: 0.0,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn request(pickups: &[&str], seats: i64) -> RouteConfigRequest {
        RouteConfigRequest {
            driver_id: "d1".into(),
            name: "Ramesh".into(),
            car_details: "KA-01 Omni".into(),
            pickup_ids: pickups.iter().map(|p| p.to_string()).collect(),
            seats,
            ..Default::default()
        }
    }

    #[test]
    fn configure_normalizes_pickups_and_derives_targets() {
        let mut state = DispatchState::new(Catalog::metro_default());
        let plan = state
            .configure_driver_route(&request(
                &["pickup-wipro-gate", "pickup-wipro-gate", "pickup-siemens", "bogus"],
                2,
            ))
            .expect("configure");
        assert_eq!(plan.pickup_points.len(), 2);
        assert_eq!(plan.target_stations, vec!["station-ecity", "station-konappana"]);
        assert_eq!(plan.seats_total, 2);
        assert_eq!(state.driver("d1").unwrap().name, "Ramesh");
    }

    #[test]
    fn configure_defaults_destination_to_last_pickup() {
        let mut state = DispatchState::new(Catalog::metro_default());
        let plan = state
            .configure_driver_route(&request(&["pickup-wipro-gate", "pickup-siemens"], 2))
            .expect("configure");
        assert_eq!(plan.destination, "Siemens Campus · Konappana Agrahara");
    }

    #[test]
    fn configure_coerces_non_positive_seats_to_one() {
        let mut state = DispatchState::new(Catalog::metro_default());
        let plan = state
            .configure_driver_route(&request(&["pickup-wipro-gate"], 0))
            .expect("configure");
        assert_eq!(plan.seats_total, 1);
        assert_eq!(plan.seats_available, 1);
    }

    #[test]
    fn configure_rejects_empty_selection() {
        let mut state = DispatchState::new(Catalog::metro_default());
        let err = state
            .configure_driver_route(&request(&["bogus"], 2))
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidInput(_)));
    }

    #[test]
    fn start_requires_a_configured_route() {
        let mut state = DispatchState::new(Catalog::metro_default());
        let err = state.start_driver_trip("d1", false).unwrap_err();
        assert!(matches!(err, DispatchError::PreconditionFailed(_)));
    }

    #[test]
    fn start_resets_the_route_index_and_seat_pool() {
        let mut state = DispatchState::new(Catalog::metro_default());
        state
            .configure_driver_route(&request(&["pickup-wipro-gate"], 3))
            .expect("configure");
        // Driving past the pickup before the shift starts consumes the stop.
        state.record_driver_location("d1", 12.8467, 77.6624);
        assert_eq!(state.plan("d1").unwrap().current_index, 1);

        let plan = state.start_driver_trip("d1", false).expect("start");
        assert_eq!(plan.seats_available, 3);
        let stored = state.plan("d1").unwrap();
        assert!(stored.active);
        assert_eq!(stored.current_index, 0);
        assert!(stored.started_at.is_some());
    }
}
