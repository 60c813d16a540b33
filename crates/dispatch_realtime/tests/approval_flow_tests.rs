//! The rider-confirmation handshake: confirm, decline, 25 s timeout,
//! disconnect, and redelivery to a late-connecting rider.

mod support;

use std::time::Duration;

use dispatch_realtime::events::{
    DRIVER_RIDER_OFFER, DRIVER_TRIP_CANCELLED, RIDER_APPROVAL_REQUEST, RIDER_STATUS,
    TRIP_ROOM_CREATED,
};
use dispatch_realtime::session::Role;
use support::{book, connect, hub, ready_driver, settle};

const NEAR: (f64, f64) = (12.8471, 77.6621);

fn matched_trip(hub: &dispatch_realtime::hub::Hub) -> dispatch_core::model::Trip {
    hub.snapshot().trips.first().expect("trip").clone()
}

#[tokio::test(start_paused = true)]
async fn rider_confirmation_opens_the_trip_room() {
    let hub = hub();
    ready_driver(&hub, "d1", &["pickup-wipro-gate"], 2, NEAR);
    let mut d1 = connect(&hub, Role::Driver, "d1", "Ramesh");
    let mut rider = connect(&hub, Role::Rider, "r1", "Priya");
    d1.drain();
    rider.drain();

    book(&hub, "r1", "pickup-wipro-gate");
    d1.next_event(DRIVER_RIDER_OFFER).expect("offer");
    hub.driver_response("d1", "r1", true, None);

    let request = rider.next_event(RIDER_APPROVAL_REQUEST).expect("approval request");
    assert_eq!(request.payload["driverId"], "d1");
    assert_eq!(request.payload["driverName"], "Ramesh");
    let trip_id = request.payload["tripId"].as_str().expect("trip id").to_string();

    hub.rider_approval("r1", &trip_id, true, None);

    let created = d1.next_event(TRIP_ROOM_CREATED).expect("room for driver");
    assert_eq!(created.payload["status"], "awaiting_pickup");
    let status = rider.next_event(RIDER_STATUS).expect("status for rider");
    assert_eq!(status.payload["status"], "awaiting_pickup");
    assert_eq!(status.payload["trip"]["id"], trip_id.as_str());

    let trip = matched_trip(&hub);
    assert_eq!(trip.status.as_str(), "pending");
}

#[tokio::test(start_paused = true)]
async fn an_unanswered_approval_times_out_after_twenty_five_seconds() {
    let hub = hub();
    ready_driver(&hub, "d1", &["pickup-wipro-gate"], 2, NEAR);
    let mut d1 = connect(&hub, Role::Driver, "d1", "Ramesh");
    let mut rider = connect(&hub, Role::Rider, "r1", "Priya");
    d1.drain();
    rider.drain();

    book(&hub, "r1", "pickup-wipro-gate");
    hub.driver_response("d1", "r1", true, None);
    assert_eq!(hub.snapshot().drivers[0].seats_available, 1);

    tokio::time::advance(Duration::from_secs(24)).await;
    settle().await;
    assert!(d1.next_event(DRIVER_TRIP_CANCELLED).is_none(), "still inside the window");

    tokio::time::advance(Duration::from_secs(2)).await;
    settle().await;

    let cancelled = d1.next_event(DRIVER_TRIP_CANCELLED).expect("driver told");
    assert_eq!(cancelled.payload["reason"], "rider_timeout");

    let snapshot = hub.snapshot();
    assert!(snapshot.trips.is_empty(), "trip removed");
    assert_eq!(snapshot.drivers[0].seats_available, 2, "seat returned");
    let r1 = snapshot.riders.iter().find(|r| r.id == "r1").expect("rider");
    assert_eq!(r1.status.as_str(), "waiting");
}

#[tokio::test(start_paused = true)]
async fn a_declining_rider_unwinds_the_match() {
    let hub = hub();
    ready_driver(&hub, "d1", &["pickup-wipro-gate"], 2, NEAR);
    let mut d1 = connect(&hub, Role::Driver, "d1", "Ramesh");
    let mut rider = connect(&hub, Role::Rider, "r1", "Priya");
    d1.drain();
    rider.drain();

    book(&hub, "r1", "pickup-wipro-gate");
    hub.driver_response("d1", "r1", true, None);
    let request = rider.next_event(RIDER_APPROVAL_REQUEST).expect("approval request");
    let trip_id = request.payload["tripId"].as_str().expect("trip id").to_string();

    hub.rider_approval("r1", &trip_id, false, None);

    let cancelled = d1.next_event(DRIVER_TRIP_CANCELLED).expect("driver told");
    assert_eq!(cancelled.payload["reason"], "rider_declined");
    assert!(hub.snapshot().trips.is_empty());
    assert_eq!(hub.snapshot().drivers[0].seats_available, 2);
}

#[tokio::test(start_paused = true)]
async fn a_rider_disconnect_during_approval_cancels_the_match() {
    let hub = hub();
    ready_driver(&hub, "d1", &["pickup-wipro-gate"], 2, NEAR);
    let mut d1 = connect(&hub, Role::Driver, "d1", "Ramesh");
    let rider = connect(&hub, Role::Rider, "r1", "Priya");
    d1.drain();

    book(&hub, "r1", "pickup-wipro-gate");
    hub.driver_response("d1", "r1", true, None);
    assert_eq!(hub.snapshot().drivers[0].seats_available, 1);

    hub.remove_session(rider.conn_id);

    let cancelled = d1.next_event(DRIVER_TRIP_CANCELLED).expect("driver told");
    assert_eq!(cancelled.payload["reason"], "rider_disconnected");
    assert!(hub.snapshot().trips.is_empty());
    assert_eq!(hub.snapshot().drivers[0].seats_available, 2);
}

#[tokio::test(start_paused = true)]
async fn duplicate_or_foreign_approval_responses_are_dropped() {
    let hub = hub();
    ready_driver(&hub, "d1", &["pickup-wipro-gate"], 2, NEAR);
    let mut d1 = connect(&hub, Role::Driver, "d1", "Ramesh");
    let mut rider = connect(&hub, Role::Rider, "r1", "Priya");
    d1.drain();
    rider.drain();

    book(&hub, "r1", "pickup-wipro-gate");
    hub.driver_response("d1", "r1", true, None);
    let request = rider.next_event(RIDER_APPROVAL_REQUEST).expect("approval request");
    let trip_id = request.payload["tripId"].as_str().expect("trip id").to_string();

    // A different rider cannot settle this approval.
    hub.rider_approval("r2", &trip_id, false, None);
    assert_eq!(matched_trip(&hub).status.as_str(), "awaiting_rider");

    hub.rider_approval("r1", &trip_id, true, None);
    assert_eq!(matched_trip(&hub).status.as_str(), "pending");

    // Settling twice is a no-op.
    hub.rider_approval("r1", &trip_id, false, None);
    assert_eq!(matched_trip(&hub).status.as_str(), "pending");
    assert!(d1.next_event(DRIVER_TRIP_CANCELLED).is_none());
}

#[tokio::test(start_paused = true)]
async fn a_late_connecting_rider_receives_the_pending_approval() {
    let hub = hub();
    ready_driver(&hub, "d1", &["pickup-wipro-gate"], 2, NEAR);
    let mut d1 = connect(&hub, Role::Driver, "d1", "Ramesh");
    d1.drain();

    // The rider booked over REST and has no socket yet.
    book(&hub, "r1", "pickup-wipro-gate");
    hub.driver_response("d1", "r1", true, None);

    let mut rider = connect(&hub, Role::Rider, "r1", "Priya");
    let request = rider.next_event(RIDER_APPROVAL_REQUEST).expect("redelivered approval");
    assert_eq!(request.payload["driverId"], "d1");
}

#[tokio::test(start_paused = true)]
async fn the_rest_accept_path_also_goes_through_approval() {
    let hub = hub();
    ready_driver(&hub, "d1", &["pickup-wipro-gate"], 2, NEAR);
    let mut rider = connect(&hub, Role::Rider, "r1", "Priya");
    rider.drain();

    book(&hub, "r1", "pickup-wipro-gate");
    let trip = hub.accept_request("d1", "r1").expect("accept via REST");
    assert_eq!(trip.status.as_str(), "awaiting_rider");

    let request = rider.next_event(RIDER_APPROVAL_REQUEST).expect("approval request");
    assert_eq!(request.payload["tripId"], trip.id.as_str());

    // The rider's offer round was torn down together with the REST accept;
    // its timer must not fire later and reset anything.
    tokio::time::advance(Duration::from_secs(21)).await;
    settle().await;
    assert_eq!(matched_trip(&hub).status.as_str(), "awaiting_rider");
}
