//! Live per-trip room joining the driver and rider sessions.
//!
//! Room status is the rider-facing leg of the trip:
//! `awaiting_pickup → in_progress → completed`. Checkpoint crossings drive
//! the transitions; the room itself only holds presentation state.

use chrono::{DateTime, Utc};

use dispatch_core::model::{PickupPoint, Station, Trip};

use crate::events::TripStatusPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoomStatus {
    AwaitingPickup,
    InProgress,
    Completed,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::AwaitingPickup => "awaiting_pickup",
            RoomStatus::InProgress => "in_progress",
            RoomStatus::Completed => "completed",
        }
    }
}

#[derive(Debug)]
pub(crate) struct TripRoom {
    pub id: String,
    pub driver_id: String,
    pub rider_id: String,
    pub pickup: Option<PickupPoint>,
    pub station: Option<Station>,
    pub status: RoomStatus,
    pub last_lat: f64,
    pub last_lon: f64,
    pub updated_at: DateTime<Utc>,
}

impl TripRoom {
    pub fn new(trip: &Trip, pickup: Option<PickupPoint>, station: Option<Station>) -> Self {
        Self {
            id: trip.id.clone(),
            driver_id: trip.driver_id.clone(),
            rider_id: trip.rider_id.clone(),
            pickup,
            station,
            status: RoomStatus::AwaitingPickup,
            last_lat: 0.0,
            last_lon: 0.0,
            updated_at: Utc::now(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RoomStatus::Completed
    }

    /// Status payload with the room's pickup/station context attached.
    pub fn status_payload(&self) -> TripStatusPayload {
        let mut payload =
            TripStatusPayload::new(&self.id, self.status.as_str(), &self.driver_id, &self.rider_id);
        payload.pickup = self.pickup.clone();
        payload.station = self.station.clone();
        payload
    }

    /// Location broadcast payload for a fresh driver position.
    pub fn location_payload(&self, latitude: f64, longitude: f64) -> TripStatusPayload {
        let mut payload = self.status_payload();
        payload.latitude = Some(latitude);
        payload.longitude = Some(longitude);
        payload
    }
}
