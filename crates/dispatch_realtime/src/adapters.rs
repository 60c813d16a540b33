//! Fire-and-forget sinks at the edge of the coordinator.
//!
//! The hub hands snapshots to these traits after releasing its lock; an
//! implementation may spawn, queue or drop the work, but it must never block
//! the caller and never report failure upward. The concrete push, store and
//! directory clients live in the gateway crate.

use serde_json::Value;

use dispatch_core::model::{Driver, PickupPoint, Rider, RoutePlan, Trip};

/// A push notification ready to send: the token was already resolved.
#[derive(Debug, Clone)]
pub struct PushNote {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: Value,
}

/// One row (or row update) for the durable log.
#[derive(Debug, Clone)]
pub enum StoreRecord {
    DriverRoute {
        plan: RoutePlan,
        status: String,
        active: bool,
        simulated: bool,
    },
    RouteStatus {
        driver_id: String,
        status: String,
        active: bool,
        seats_available: u32,
    },
    RiderRequest {
        rider: Rider,
        pickup: Option<PickupPoint>,
        status: String,
    },
    RiderRequestStatus {
        rider_id: String,
        status: String,
        driver_id: String,
        trip_id: String,
    },
    Trip {
        trip: Trip,
        pickup: Option<PickupPoint>,
    },
    TripEvent {
        trip_id: String,
        event_type: String,
        payload: Value,
    },
}

pub trait PushGateway: Send + Sync {
    fn notify(&self, note: PushNote);
}

pub trait TripStore: Send + Sync {
    fn record(&self, record: StoreRecord);
}

pub trait DirectorySink: Send + Sync {
    /// Best-effort registration of the driver profile and route with the
    /// external driver service.
    fn register_route(&self, driver: &Driver, plan: &RoutePlan);

    /// Best-effort publication of a driver position to the location service.
    fn publish_location(&self, driver_id: &str, latitude: f64, longitude: f64);
}

pub struct NoopPush;

impl PushGateway for NoopPush {
    fn notify(&self, _note: PushNote) {}
}

pub struct NoopStore;

impl TripStore for NoopStore {
    fn record(&self, _record: StoreRecord) {}
}

pub struct NoopDirectory;

impl DirectorySink for NoopDirectory {
    fn register_route(&self, _driver: &Driver, _plan: &RoutePlan) {}
    fn publish_location(&self, _driver_id: &str, _latitude: f64, _longitude: f64) {}
}
