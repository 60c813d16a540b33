//! Domain model shared across the dispatch engine and its network surfaces.
//!
//! Field names serialize in camelCase because the JSON shapes are part of the
//! client contract; status enums serialize as the snake_case strings the
//! mobile clients expect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minutes quoted to riders for a freshly matched driver.
pub const DEFAULT_ETA_MINUTES: u32 = 5;

/// A metro station with the neighbourhood names riders type when booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: String,
    pub name: String,
    pub nearby_areas: Vec<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// A named boarding coordinate tied to exactly one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupPoint {
    pub id: String,
    pub name: String,
    pub station_id: String,
    pub station_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Offline,
    Active,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Offline => "offline",
            DriverStatus::Active => "active",
        }
    }
}

/// A driver known to the coordinator. The route summary (`route_targets`,
/// `destination`) is a denormalized copy of the plan so that candidate
/// selection still works for drivers registered without a local plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub car_details: String,
    pub seats_total: u32,
    pub seats_available: u32,
    pub status: DriverStatus,
    pub route_targets: Vec<String>,
    pub destination: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiderStatus {
    Waiting,
    Offering,
    Matched,
    Confirmed,
    PickedUp,
    Completed,
    Cancelled,
}

impl RiderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiderStatus::Waiting => "waiting",
            RiderStatus::Offering => "offering",
            RiderStatus::Matched => "matched",
            RiderStatus::Confirmed => "confirmed",
            RiderStatus::PickedUp => "picked_up",
            RiderStatus::Completed => "completed",
            RiderStatus::Cancelled => "cancelled",
        }
    }
}

/// A rider waiting near a station for a seat towards their destination.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rider {
    pub id: String,
    pub name: String,
    pub destination: String,
    pub arrival_time: DateTime<Utc>,
    pub station_id: String,
    #[serde(rename = "pickupPointId")]
    pub pickup_id: String,
    pub status: RiderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    AwaitingRider,
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::AwaitingRider => "awaiting_rider",
            TripStatus::Pending => "pending",
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }
}

/// One matched driver/rider pairing. `room_id` doubles as the live-room key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub driver_id: String,
    pub rider_id: String,
    pub station_id: String,
    #[serde(rename = "pickupPointId")]
    pub pickup_id: String,
    pub destination: String,
    pub eta_minutes: u32,
    pub status: TripStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub room_id: String,
}

/// A driver's configured shift: ordered pickup stops, seat pool and the
/// derived target stations. At most one per driver; `current_index` only
/// ever moves forward.
#[derive(Debug, Clone)]
pub struct DriverPlan {
    pub driver_id: String,
    pub pickup_ids: Vec<String>,
    pub seats_total: u32,
    pub seats_available: u32,
    pub target_stations: Vec<String>,
    pub destination: String,
    pub current_index: usize,
    pub active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub simulated: bool,
}

/// One entry of a rider's ranked offer list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverAttempt {
    pub driver_id: String,
    pub driver_name: String,
    pub distance_meters: f64,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Snapshot of a configured route, returned by route configuration and trip
/// start and mirrored to the persistence sink.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    pub driver_id: String,
    pub pickup_points: Vec<PickupPoint>,
    pub seats_total: u32,
    pub seats_available: u32,
    pub target_stations: Vec<String>,
    pub destination: String,
}

/// Incoming booking request as posted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookRideCommand {
    pub command: String,
    pub rider_id: String,
    pub name: String,
    pub address: String,
    pub destination: String,
    pub station_id: String,
    #[serde(rename = "pickupPointId")]
    pub pickup_id: String,
}

/// Incoming route configuration as posted by a driver.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteConfigRequest {
    pub driver_id: String,
    pub name: String,
    pub car_details: String,
    #[serde(rename = "pickupPointIds")]
    pub pickup_ids: Vec<String>,
    pub seats: i64,
    pub destination: String,
}

/// Destination strings are compatible when either side is blank or the
/// placeholder "unknown", or one contains the other after normalization.
pub fn compatible_destination(driver_dest: &str, rider_dest: &str) -> bool {
    let driver = normalize_destination(driver_dest);
    let rider = normalize_destination(rider_dest);
    if driver.is_empty() || rider.is_empty() || driver == "unknown" || rider == "unknown" {
        return true;
    }
    driver == rider || driver.contains(&rider) || rider.contains(&driver)
}

fn normalize_destination(value: &str) -> String {
    value.trim().to_lowercase()
}
