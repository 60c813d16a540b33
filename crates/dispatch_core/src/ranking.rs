//! Candidate selection: filter eligible drivers for a (station, pickup) pair
//! and order them by great-circle distance to the pickup.

use std::collections::HashMap;

use crate::geo;
use crate::model::{Driver, DriverAttempt, DriverPlan, PickupPoint, Station};

/// Distance from a driver's last known position to the pickup, falling back
/// to the station centroid when the pickup carries no coordinates. Drivers
/// with no known position sort last.
pub fn driver_distance_to_pickup(
    driver: &Driver,
    pickup: &PickupPoint,
    station: &Station,
) -> f64 {
    if geo::is_unset(driver.latitude, driver.longitude) {
        return f64::INFINITY;
    }
    let (lat, lon) = if geo::is_unset(pickup.latitude, pickup.longitude) {
        if geo::is_unset(station.latitude, station.longitude) {
            return f64::INFINITY;
        }
        (station.latitude, station.longitude)
    } else {
        (pickup.latitude, pickup.longitude)
    };
    geo::haversine_meters(driver.latitude, driver.longitude, lat, lon)
}

/// Ranks drivers for an offer round. A driver qualifies when their route
/// targets the station and either their plan is active with this pickup still
/// ahead of the route index and seats left, or they have no plan but open
/// seats. The sort is stable, so equal distances keep registration order.
pub fn rank(
    station: &Station,
    pickup: &PickupPoint,
    drivers: &[Driver],
    plans: &HashMap<String, DriverPlan>,
) -> Vec<DriverAttempt> {
    let mut attempts: Vec<DriverAttempt> = Vec::new();
    for driver in drivers {
        let targets = match plans.get(&driver.id) {
            Some(plan) => &plan.target_stations,
            None => &driver.route_targets,
        };
        if !targets.iter().any(|id| id == &station.id) {
            continue;
        }
        match plans.get(&driver.id) {
            Some(plan) => {
                if !plan.active {
                    continue;
                }
                let position = plan.pickup_ids.iter().position(|id| id == &pickup.id);
                match position {
                    Some(idx) if idx >= plan.current_index => {}
                    _ => continue,
                }
                if plan.seats_available == 0 {
                    continue;
                }
            }
            None => {
                if driver.seats_available == 0 {
                    continue;
                }
            }
        }
        attempts.push(DriverAttempt {
            driver_id: driver.id.clone(),
            driver_name: driver.name.clone(),
            distance_meters: driver_distance_to_pickup(driver, pickup, station),
            accepted: false,
            reason: None,
        });
    }
    attempts.sort_by(|a, b| {
        a.distance_meters
            .partial_cmp(&b.distance_meters)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    attempts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn driver(id: &str, lat: f64, lon: f64, seats: u32) -> Driver {
        Driver {
            id: id.to_string(),
            name: id.to_string(),
            car_details: String::new(),
            seats_total: seats,
            seats_available: seats,
            status: crate::model::DriverStatus::Active,
            route_targets: vec!["station-ecity".to_string()],
            destination: String::new(),
            latitude: lat,
            longitude: lon,
        }
    }

    fn active_plan(driver_id: &str, pickups: &[&str], seats: u32) -> DriverPlan {
        DriverPlan {
            driver_id: driver_id.to_string(),
            pickup_ids: pickups.iter().map(|p| p.to_string()).collect(),
            seats_total: seats,
            seats_available: seats,
            target_stations: vec!["station-ecity".to_string()],
            destination: String::new(),
            current_index: 0,
            active: true,
            started_at: None,
            simulated: false,
        }
    }

    fn fixtures() -> (Station, PickupPoint) {
        let catalog = Catalog::metro_default();
        (
            catalog.station_by_id("station-ecity").unwrap().clone(),
            catalog.pickup_by_id("pickup-wipro-gate").unwrap().clone(),
        )
    }

    #[test]
    fn orders_candidates_by_ascending_distance() {
        let (station, pickup) = fixtures();
        let drivers = vec![
            driver("d-far", 12.884, 77.654, 2),
            driver("d-near", 12.8471, 77.6621, 2),
        ];
        let mut plans = HashMap::new();
        plans.insert("d-far".to_string(), active_plan("d-far", &["pickup-wipro-gate"], 2));
        plans.insert("d-near".to_string(), active_plan("d-near", &["pickup-wipro-gate"], 2));

        let ranked = rank(&station, &pickup, &drivers, &plans);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].driver_id, "d-near");
        assert!(ranked[0].distance_meters <= ranked[1].distance_meters);
    }

    #[test]
    fn skips_inactive_plans_passed_pickups_and_empty_seats() {
        let (station, pickup) = fixtures();
        let drivers = vec![
            driver("d-inactive", 12.8471, 77.6621, 2),
            driver("d-passed", 12.8471, 77.6621, 2),
            driver("d-full", 12.8471, 77.6621, 2),
        ];
        let mut plans = HashMap::new();
        let mut inactive = active_plan("d-inactive", &["pickup-wipro-gate"], 2);
        inactive.active = false;
        plans.insert("d-inactive".to_string(), inactive);
        let mut passed = active_plan("d-passed", &["pickup-wipro-gate"], 2);
        passed.current_index = 1;
        plans.insert("d-passed".to_string(), passed);
        let mut full = active_plan("d-full", &["pickup-wipro-gate"], 2);
        full.seats_available = 0;
        plans.insert("d-full".to_string(), full);

        assert!(rank(&station, &pickup, &drivers, &plans).is_empty());
    }

    #[test]
    fn planless_driver_with_seats_and_route_targets_qualifies() {
        let (station, pickup) = fixtures();
        let drivers = vec![driver("d-ext", 12.8471, 77.6621, 3)];
        let ranked = rank(&station, &pickup, &drivers, &HashMap::new());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].driver_id, "d-ext");
    }

    #[test]
    fn unknown_position_sorts_last() {
        let (station, pickup) = fixtures();
        let drivers = vec![
            driver("d-lost", 0.0, 0.0, 2),
            driver("d-near", 12.8471, 77.6621, 2),
        ];
        let ranked = rank(&station, &pickup, &drivers, &HashMap::new());
        assert_eq!(ranked[0].driver_id, "d-near");
        assert_eq!(ranked[1].driver_id, "d-lost");
        assert!(ranked[1].distance_meters.is_infinite());
    }

    #[test]
    fn equal_distances_keep_registration_order() {
        let (station, pickup) = fixtures();
        let drivers = vec![
            driver("d-first", 12.8471, 77.6621, 2),
            driver("d-second", 12.8471, 77.6621, 2),
        ];
        let ranked = rank(&station, &pickup, &drivers, &HashMap::new());
        assert_eq!(ranked[0].driver_id, "d-first");
        assert_eq!(ranked[1].driver_id, "d-second");
    }

    #[test]
    fn pickup_without_coordinates_falls_back_to_station() {
        let (station, mut pickup) = fixtures();
        pickup.latitude = 0.0;
        pickup.longitude = 0.0;
        let d = driver("d1", 12.8456, 77.66, 2);
        let distance = driver_distance_to_pickup(&d, &pickup, &station);
        assert_eq!(distance, 0.0);
    }
}
