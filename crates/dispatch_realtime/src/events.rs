//! The realtime wire protocol: event names, inbound message envelope and
//! outbound payload builders. Event names and JSON field names are part of
//! the client contract and never change casually.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use dispatch_core::model::{DriverAttempt, PickupPoint, Rider, Station, Trip};
use dispatch_core::state::DriverQueue;

use crate::session::Role;

pub const SESSION_ACK: &str = "session:ack";
pub const SESSION_ERROR: &str = "session:error";
pub const DRIVER_RIDER_OFFER: &str = "driver:rider-offer";
pub const DRIVER_RIDER_QUEUE: &str = "driver:rider-queue";
pub const DRIVER_TRIP_CANCELLED: &str = "driver:trip-cancelled";
pub const RIDER_APPROVAL_REQUEST: &str = "rider:approval-request";
pub const RIDER_STATUS: &str = "rider:status";
pub const TRIP_LOCATION: &str = "trip:location";
pub const TRIP_STATUS: &str = "trip:status";
pub const TRIP_ROOM_CREATED: &str = "trip:room-created";

/// One outbound event: `{"event": ..., "payload": ...}` on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct ServerEvent {
    pub event: String,
    pub payload: Value,
}

impl ServerEvent {
    pub fn new(event: &str, payload: &impl Serialize) -> Self {
        Self {
            event: event.to_string(),
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
        }
    }
}

/// Inbound client messages, same envelope shape as the outbound side.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ClientMessage {
    #[serde(rename = "session:init")]
    SessionInit(SessionInit),
    #[serde(rename = "driver:rider-response")]
    DriverResponse(DriverResponsePayload),
    #[serde(rename = "rider:approval-response")]
    ApprovalResponse(ApprovalResponsePayload),
    #[serde(rename = "trip:complete")]
    TripComplete(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionInit {
    pub role: String,
    pub user_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverResponsePayload {
    pub rider_id: String,
    pub accept: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalResponsePayload {
    pub trip_id: String,
    pub accept: bool,
    pub reason: Option<String>,
}

/// The shared trip/status payload used by `rider:status`, `trip:location`,
/// `trip:status` and `trip:room-created`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStatusPayload {
    pub trip_id: String,
    pub status: String,
    pub driver_id: String,
    pub rider_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup: Option<PickupPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<Station>,
    #[serde(rename = "latitude", skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(rename = "longitude", skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub recorded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip: Option<Trip>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rider: Option<Rider>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<DriverAttempt>,
}

impl TripStatusPayload {
    pub fn new(trip_id: &str, status: &str, driver_id: &str, rider_id: &str) -> Self {
        Self {
            trip_id: trip_id.to_string(),
            status: status.to_string(),
            driver_id: driver_id.to_string(),
            rider_id: rider_id.to_string(),
            pickup: None,
            station: None,
            latitude: None,
            longitude: None,
            recorded_at: Utc::now(),
            description: None,
            trip: None,
            rider: None,
            attempts: Vec::new(),
        }
    }

    /// The terminal "no drivers" notification with the attempt history.
    pub fn no_drivers(rider_id: &str, attempts: Vec<DriverAttempt>) -> Self {
        let mut payload = Self::new("", "no_drivers", "", rider_id);
        payload.attempts = attempts;
        payload
    }
}

/// REST response for `POST /rides/book`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRideResponse {
    pub status: String,
    pub message: String,
    pub rider: Rider,
    pub station: Station,
    pub pickup: Option<PickupPoint>,
    pub requested_destination: String,
    pub attempts: Vec<DriverAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip: Option<Trip>,
}

pub fn ack(role: Role, user_id: &str) -> ServerEvent {
    ServerEvent::new(SESSION_ACK, &json!({ "role": role.as_str(), "userId": user_id }))
}

pub fn session_error(message: &str) -> ServerEvent {
    ServerEvent::new(SESSION_ERROR, &json!({ "message": message }))
}

pub fn rider_offer(
    rider: &Rider,
    station: &Station,
    pickup: &PickupPoint,
    attempt: usize,
    total: usize,
) -> ServerEvent {
    ServerEvent::new(
        DRIVER_RIDER_OFFER,
        &json!({
            "rider": {
                "id": rider.id,
                "name": rider.name,
                "destination": rider.destination,
                "pickupId": rider.pickup_id,
                "pickupName": pickup.name,
                "status": rider.status,
            },
            "pickup": pickup,
            "station": station,
            "attempt": attempt,
            "total": total,
        }),
    )
}

pub fn driver_queue(queue: &DriverQueue) -> ServerEvent {
    ServerEvent::new(DRIVER_RIDER_QUEUE, queue)
}

pub fn trip_cancelled(trip_id: &str, reason: &str) -> ServerEvent {
    ServerEvent::new(
        DRIVER_TRIP_CANCELLED,
        &json!({ "tripId": trip_id, "reason": reason }),
    )
}

pub fn approval_request(
    trip: &Trip,
    driver_name: &str,
    pickup: &Option<PickupPoint>,
    station: &Option<Station>,
) -> ServerEvent {
    ServerEvent::new(
        RIDER_APPROVAL_REQUEST,
        &json!({
            "tripId": trip.id,
            "driverId": trip.driver_id,
            "driverName": driver_name,
            "pickup": pickup,
            "station": station,
        }),
    )
}

pub fn rider_status(payload: &TripStatusPayload) -> ServerEvent {
    ServerEvent::new(RIDER_STATUS, payload)
}

pub fn trip_location(payload: &TripStatusPayload) -> ServerEvent {
    ServerEvent::new(TRIP_LOCATION, payload)
}

pub fn trip_status(payload: &TripStatusPayload) -> ServerEvent {
    ServerEvent::new(TRIP_STATUS, payload)
}

pub fn room_created(payload: &TripStatusPayload) -> ServerEvent {
    ServerEvent::new(TRIP_ROOM_CREATED, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse_from_the_envelope() {
        let raw = r#"{"event":"session:init","payload":{"role":"driver","userId":"d1","name":"Ramesh"}}"#;
        let message: ClientMessage = serde_json::from_str(raw).expect("parse");
        match message {
            ClientMessage::SessionInit(init) => {
                assert_eq!(init.role, "driver");
                assert_eq!(init.user_id, "d1");
            }
            other => panic!("unexpected message {other:?}"),
        }

        let raw = r#"{"event":"driver:rider-response","payload":{"riderId":"r1","accept":false,"reason":"full"}}"#;
        let message: ClientMessage = serde_json::from_str(raw).expect("parse");
        match message {
            ClientMessage::DriverResponse(resp) => {
                assert_eq!(resp.rider_id, "r1");
                assert!(!resp.accept);
                assert_eq!(resp.reason.as_deref(), Some("full"));
            }
            other => panic!("unexpected message {other:?}"),
        }

        let raw = r#"{"event":"trip:complete","payload":"trip-1"}"#;
        let message: ClientMessage = serde_json::from_str(raw).expect("parse");
        assert!(matches!(message, ClientMessage::TripComplete(id) if id == "trip-1"));
    }

    #[test]
    fn status_payload_omits_unset_fields() {
        let payload = TripStatusPayload::new("trip-1", "awaiting_pickup", "d1", "r1");
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["tripId"], "trip-1");
        assert_eq!(value["status"], "awaiting_pickup");
        assert!(value.get("pickup").is_none());
        assert!(value.get("latitude").is_none());
        assert!(value.get("attempts").is_none());
    }

    #[test]
    fn no_drivers_payload_lists_the_attempt_history() {
        let payload = TripStatusPayload::no_drivers(
            "r1",
            vec![DriverAttempt {
                driver_id: "d1".into(),
                driver_name: "Ramesh".into(),
                distance_meters: 42.0,
                accepted: false,
                reason: None,
            }],
        );
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["status"], "no_drivers");
        assert_eq!(value["attempts"][0]["driverId"], "d1");
    }
}
