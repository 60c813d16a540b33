//! Read-side projections: the per-driver request queue and the aggregate
//! snapshot the dashboard polls.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DispatchError;
use crate::model::{
    PickupPoint, Rider, RiderStatus, Station, Trip, TripStatus, DEFAULT_ETA_MINUTES,
};
use crate::ranking;

use super::DispatchState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverSummary {
    pub id: String,
    pub name: String,
    pub seats_available: u32,
    pub next_stop: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderRequestView {
    pub id: String,
    pub name: String,
    pub destination: String,
    pub arrival_time: DateTime<Utc>,
    pub station: Station,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup: Option<PickupPoint>,
    pub status: RiderStatus,
    pub distance_meters: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverQueue {
    pub driver: DriverSummary,
    pub requests: Vec<RiderRequestView>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteView {
    pub id: String,
    pub target_station_ids: Vec<String>,
    pub destination: String,
    pub pickup_points: Vec<PickupPoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverView {
    pub id: String,
    pub name: String,
    pub car_details: String,
    pub seats_available: u32,
    pub eta_minutes: u32,
    pub status: String,
    pub route: RouteView,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetrics {
    pub pending_matches: usize,
    pub riders_waiting: usize,
    pub seats_open: u32,
    pub avg_wait_minutes: f64,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendSnapshot {
    pub drivers: Vec<DriverView>,
    pub riders: Vec<Rider>,
    pub trips: Vec<Trip>,
    pub stations: Vec<Station>,
    pub metrics: SnapshotMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_trip: Option<Trip>,
    pub last_updated: DateTime<Utc>,
}

impl DispatchState {
    /// Riders waiting at any of the driver's target stations, nearest arrival
    /// first. Riders already picked up are excluded.
    pub fn driver_requests(&self, driver_id: &str) -> Result<DriverQueue, DispatchError> {
        let driver = self
            .driver(driver_id)
            .ok_or_else(|| DispatchError::not_found(format!("driver '{driver_id}' not found")))?;
        let targets = match self.plans.get(driver_id) {
            Some(plan) => &plan.target_stations,
            None => &driver.route_targets,
        };
        let next_stop = targets
            .first()
            .map(|id| match self.catalog.station_by_id(id) {
                Some(station) => station.name.clone(),
                None => id.clone(),
            })
            .unwrap_or_default();

        let mut requests: Vec<RiderRequestView> = Vec::new();
        for rider in &self.riders {
            if rider.status == RiderStatus::PickedUp {
                continue;
            }
            if !targets.iter().any(|id| id == &rider.station_id) {
                continue;
            }
            let station = match self.catalog.station_by_id(&rider.station_id) {
                Some(station) => station.clone(),
                None => continue,
            };
            let pickup = self.catalog.pickup_by_id(&rider.pickup_id).cloned();
            let distance_meters = match &pickup {
                Some(p) => ranking::driver_distance_to_pickup(driver, p, &station),
                None => f64::INFINITY,
            };
            requests.push(RiderRequestView {
                id: rider.id.clone(),
                name: rider.name.clone(),
                destination: rider.destination.clone(),
                arrival_time: rider.arrival_time,
                station,
                pickup,
                status: rider.status,
                distance_meters,
            });
        }
        requests.sort_by_key(|r| r.arrival_time);

        Ok(DriverQueue {
            driver: DriverSummary {
                id: driver.id.clone(),
                name: driver.name.clone(),
                seats_available: driver.seats_available,
                next_stop,
            },
            requests,
            generated_at: Utc::now(),
        })
    }

    /// The aggregate view: every driver with their route, all riders, trips
    /// and stations, plus derived metrics.
    pub fn snapshot(&self) -> BackendSnapshot {
        let drivers = self
            .drivers
            .iter()
            .map(|driver| {
                let route = match self.plans.get(&driver.id) {
                    Some(plan) => RouteView {
                        id: plan.driver_id.clone(),
                        target_station_ids: plan.target_stations.clone(),
                        destination: plan.destination.clone(),
                        pickup_points: self.catalog.pickups_for_ids(&plan.pickup_ids),
                    },
                    None => RouteView {
                        id: driver.id.clone(),
                        target_station_ids: driver.route_targets.clone(),
                        destination: if driver.destination.is_empty() {
                            "Unknown".to_string()
                        } else {
                            driver.destination.clone()
                        },
                        pickup_points: Vec::new(),
                    },
                };
                DriverView {
                    id: driver.id.clone(),
                    name: driver.name.clone(),
                    car_details: driver.car_details.clone(),
                    seats_available: driver.seats_available,
                    eta_minutes: DEFAULT_ETA_MINUTES,
                    status: driver.status.as_str().to_string(),
                    route,
                    latitude: driver.latitude,
                    longitude: driver.longitude,
                }
            })
            .collect();

        BackendSnapshot {
            drivers,
            riders: self.riders.clone(),
            trips: self.trips.clone(),
            stations: self.catalog.stations().to_vec(),
            metrics: self.metrics(),
            highlight_trip: self.trips.first().cloned(),
            last_updated: Utc::now(),
        }
    }

    fn metrics(&self) -> SnapshotMetrics {
        let now = Utc::now();
        let waiting: Vec<&Rider> = self
            .riders
            .iter()
            .filter(|r| r.status == RiderStatus::Waiting)
            .collect();
        let avg_wait_minutes = if waiting.is_empty() {
            0.0
        } else {
            let total: f64 = waiting
                .iter()
                .map(|r| {
                    let minutes = (r.arrival_time - now).num_seconds() as f64 / 60.0;
                    minutes.max(0.0)
                })
                .sum();
            total / waiting.len() as f64
        };

        SnapshotMetrics {
            pending_matches: self
                .trips
                .iter()
                .filter(|t| t.status == TripStatus::Pending)
                .count(),
            riders_waiting: waiting.len(),
            seats_open: self.drivers.iter().map(|d| d.seats_available).sum(),
            avg_wait_minutes,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
