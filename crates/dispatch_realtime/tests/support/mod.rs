//! Shared harness: a hub wired with no-op adapters, channel-backed client
//! sessions, and fixture drivers/riders on the metro catalog.
#![allow(dead_code)]

use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

use dispatch_core::catalog::Catalog;
use dispatch_core::model::{BookRideCommand, RouteConfigRequest};
use dispatch_core::state::DispatchState;
use dispatch_realtime::events::{BookRideResponse, ServerEvent};
use dispatch_realtime::hub::{Hub, HubAdapters};
use dispatch_realtime::session::Role;

pub struct TestClient {
    pub conn_id: Uuid,
    pub rx: UnboundedReceiver<ServerEvent>,
}

impl TestClient {
    /// Everything buffered so far.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            out.push(event);
        }
        out
    }

    /// The next buffered event with the given name, skipping unrelated ones.
    pub fn next_event(&mut self, name: &str) -> Option<ServerEvent> {
        while let Ok(event) = self.rx.try_recv() {
            if event.event == name {
                return Some(event);
            }
        }
        None
    }

    pub fn has_event(&mut self, name: &str) -> bool {
        self.next_event(name).is_some()
    }
}

pub fn hub() -> Hub {
    Hub::new(
        DispatchState::new(Catalog::metro_default()),
        HubAdapters::default(),
    )
}

pub fn connect(hub: &Hub, role: Role, user_id: &str, name: &str) -> TestClient {
    let (tx, rx) = mpsc::unbounded_channel();
    let conn_id = Uuid::new_v4();
    hub.register_session(role, user_id, name, conn_id, tx);
    TestClient { conn_id, rx }
}

/// Configures a route, reports the driver's position, and starts the shift.
/// The position is reported before the start so that driving within the
/// pickup radius does not consume the first stop.
pub fn ready_driver(hub: &Hub, driver_id: &str, pickups: &[&str], seats: i64, position: (f64, f64)) {
    hub.configure_route(&RouteConfigRequest {
        driver_id: driver_id.to_string(),
        name: format!("Driver {driver_id}"),
        car_details: "KA-01 Omni".to_string(),
        pickup_ids: pickups.iter().map(|p| p.to_string()).collect(),
        seats,
        ..Default::default()
    })
    .expect("configure route");
    hub.record_location(driver_id, position.0, position.1);
    hub.start_trip(driver_id, false).expect("start trip");
}

pub fn book(hub: &Hub, rider_id: &str, pickup_id: &str) -> BookRideResponse {
    hub.book_ride(&BookRideCommand {
        command: "book".to_string(),
        rider_id: rider_id.to_string(),
        name: format!("Rider {rider_id}"),
        pickup_id: pickup_id.to_string(),
        ..Default::default()
    })
    .expect("book ride")
}

/// Lets spawned tasks (fired timers, simulation hops) run without advancing
/// the paused clock.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
