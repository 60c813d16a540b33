//! The live trip room: location broadcast, checkpoint transitions, manual
//! completion, and the simulated shift.

mod support;

use std::time::Duration;

use dispatch_core::model::RouteConfigRequest;
use dispatch_realtime::events::{
    DRIVER_RIDER_OFFER, RIDER_APPROVAL_REQUEST, TRIP_LOCATION, TRIP_ROOM_CREATED, TRIP_STATUS,
};
use dispatch_realtime::hub::Hub;
use dispatch_realtime::session::Role;
use support::{book, connect, hub, ready_driver, settle, TestClient};

const NEAR: (f64, f64) = (12.8471, 77.6621);
const WIPRO_GATE: (f64, f64) = (12.8467, 77.6624);
const ECITY_STATION: (f64, f64) = (12.8456, 77.66);

/// Drives the flow to an open room and returns the trip id.
fn open_room(hub: &Hub, d1: &mut TestClient, rider: &mut TestClient) -> String {
    book(hub, "r1", "pickup-wipro-gate");
    d1.next_event(DRIVER_RIDER_OFFER).expect("offer");
    hub.driver_response("d1", "r1", true, None);
    let request = rider.next_event(RIDER_APPROVAL_REQUEST).expect("approval request");
    let trip_id = request.payload["tripId"].as_str().expect("trip id").to_string();
    hub.rider_approval("r1", &trip_id, true, None);
    d1.next_event(TRIP_ROOM_CREATED).expect("room created");
    rider.drain();
    trip_id
}

#[tokio::test(start_paused = true)]
async fn the_happy_path_runs_from_booking_to_dropoff() {
    let hub = hub();
    ready_driver(&hub, "d1", &["pickup-wipro-gate"], 2, NEAR);
    let mut d1 = connect(&hub, Role::Driver, "d1", "Ramesh");
    let mut rider = connect(&hub, Role::Rider, "r1", "Priya");
    d1.drain();
    rider.drain();

    let trip_id = open_room(&hub, &mut d1, &mut rider);
    assert_eq!(hub.snapshot().drivers[0].seats_available, 1);

    // Driver reaches the pickup: both members see the position and the
    // pickup checkpoint flips the room to in_progress.
    hub.record_location("d1", WIPRO_GATE.0, WIPRO_GATE.1);
    let location = rider.next_event(TRIP_LOCATION).expect("location broadcast");
    assert_eq!(location.payload["latitude"], WIPRO_GATE.0);
    assert_eq!(location.payload["tripId"], trip_id.as_str());
    let status = rider.next_event(TRIP_STATUS).expect("pickup status");
    assert_eq!(status.payload["status"], "in_progress");
    assert!(d1.next_event(TRIP_STATUS).is_some(), "driver sees the transition too");

    // Driver reaches the station: the trip completes and the seat returns.
    hub.record_location("d1", ECITY_STATION.0, ECITY_STATION.1);
    let status = rider.next_event(TRIP_STATUS).expect("dropoff status");
    assert_eq!(status.payload["status"], "completed");

    let snapshot = hub.snapshot();
    let trip = snapshot.trips.iter().find(|t| t.id == trip_id).expect("trip");
    assert_eq!(trip.status.as_str(), "completed");
    assert!(trip.completed_at.is_some());
    assert_eq!(snapshot.drivers[0].seats_available, 2);
}

#[tokio::test(start_paused = true)]
async fn positions_outside_the_checkpoints_only_broadcast_location() {
    let hub = hub();
    ready_driver(&hub, "d1", &["pickup-wipro-gate"], 2, NEAR);
    let mut d1 = connect(&hub, Role::Driver, "d1", "Ramesh");
    let mut rider = connect(&hub, Role::Rider, "r1", "Priya");
    d1.drain();
    rider.drain();
    open_room(&hub, &mut d1, &mut rider);

    // Still far from the pickup (Singasandra, kilometres away).
    hub.record_location("d1", 12.884, 77.654);
    let location = rider.next_event(TRIP_LOCATION).expect("location broadcast");
    assert_eq!(location.payload["status"], "awaiting_pickup");
    assert!(rider.next_event(TRIP_STATUS).is_none(), "no checkpoint crossed");
}

#[tokio::test(start_paused = true)]
async fn manual_completion_tears_the_room_down_idempotently() {
    let hub = hub();
    ready_driver(&hub, "d1", &["pickup-wipro-gate"], 2, NEAR);
    let mut d1 = connect(&hub, Role::Driver, "d1", "Ramesh");
    let mut rider = connect(&hub, Role::Rider, "r1", "Priya");
    d1.drain();
    rider.drain();
    let trip_id = open_room(&hub, &mut d1, &mut rider);

    hub.complete_trip(&trip_id, "completed (manual)");
    let status = rider.next_event(TRIP_STATUS).expect("completion broadcast");
    assert_eq!(status.payload["status"], "completed");
    assert_eq!(status.payload["description"], "completed (manual)");
    assert_eq!(hub.snapshot().drivers[0].seats_available, 2);

    // A second completion changes nothing and emits nothing.
    hub.complete_trip(&trip_id, "completed (manual)");
    assert!(rider.next_event(TRIP_STATUS).is_none());
    assert_eq!(hub.snapshot().drivers[0].seats_available, 2);
}

#[tokio::test(start_paused = true)]
async fn location_updates_after_teardown_reach_no_room() {
    let hub = hub();
    ready_driver(&hub, "d1", &["pickup-wipro-gate"], 2, NEAR);
    let mut d1 = connect(&hub, Role::Driver, "d1", "Ramesh");
    let mut rider = connect(&hub, Role::Rider, "r1", "Priya");
    d1.drain();
    rider.drain();
    let trip_id = open_room(&hub, &mut d1, &mut rider);

    hub.complete_trip(&trip_id, "completed (manual)");
    rider.drain();

    hub.record_location("d1", WIPRO_GATE.0, WIPRO_GATE.1);
    assert!(rider.next_event(TRIP_LOCATION).is_none(), "room is gone");
}

#[tokio::test(start_paused = true)]
async fn a_simulated_shift_walks_the_route() {
    let hub = hub();
    hub.configure_route(&RouteConfigRequest {
        driver_id: "d1".to_string(),
        name: "Ramesh".to_string(),
        pickup_ids: vec!["pickup-wipro-gate".to_string(), "pickup-siemens".to_string()],
        seats: 2,
        ..Default::default()
    })
    .expect("configure");

    hub.start_trip("d1", true).expect("start simulated");
    settle().await;

    // First hop: the Wipro Gate pickup, which also crosses the checkpoint.
    let snapshot = hub.snapshot();
    assert_eq!(snapshot.drivers[0].latitude, WIPRO_GATE.0);

    tokio::time::advance(Duration::from_secs(4)).await;
    settle().await;
    // Second hop: the pickup's station centroid.
    assert_eq!(hub.snapshot().drivers[0].latitude, ECITY_STATION.0);
}

#[tokio::test(start_paused = true)]
async fn reconfiguring_the_route_cancels_the_simulation() {
    let hub = hub();
    hub.configure_route(&RouteConfigRequest {
        driver_id: "d1".to_string(),
        name: "Ramesh".to_string(),
        pickup_ids: vec!["pickup-wipro-gate".to_string(), "pickup-siemens".to_string()],
        seats: 2,
        ..Default::default()
    })
    .expect("configure");
    hub.start_trip("d1", true).expect("start simulated");
    settle().await;
    assert_eq!(hub.snapshot().drivers[0].latitude, WIPRO_GATE.0);

    hub.configure_route(&RouteConfigRequest {
        driver_id: "d1".to_string(),
        name: "Ramesh".to_string(),
        pickup_ids: vec!["pickup-wipro-gate".to_string()],
        seats: 2,
        ..Default::default()
    })
    .expect("reconfigure");

    // The aborted task must not keep hopping.
    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(hub.snapshot().drivers[0].latitude, WIPRO_GATE.0);
}
