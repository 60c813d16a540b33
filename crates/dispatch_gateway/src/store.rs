//! Durable trip log backed by SQLite.
//!
//! Records are enqueued on an unbounded channel and drained by a dedicated
//! worker thread, so a slow or broken database never blocks a dispatch
//! transition. Write failures are logged at warn and dropped.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use serde_json::json;
use sqlite::Connection;
use tracing::warn;

use dispatch_realtime::adapters::{StoreRecord, TripStore};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS driver_routes (
    driver_id TEXT PRIMARY KEY,
    seats_total INTEGER NOT NULL,
    seats_available INTEGER NOT NULL,
    status TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 0,
    simulate INTEGER NOT NULL DEFAULT 0,
    metadata TEXT NOT NULL DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS driver_route_pickups (
    route_id TEXT NOT NULL,
    sequence INTEGER NOT NULL,
    pickup_id TEXT NOT NULL,
    pickup_name TEXT NOT NULL,
    station_id TEXT NOT NULL,
    station_name TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS rider_requests (
    rider_id TEXT PRIMARY KEY,
    pickup_id TEXT NOT NULL DEFAULT '',
    pickup_name TEXT NOT NULL DEFAULT '',
    station_id TEXT NOT NULL DEFAULT '',
    station_name TEXT NOT NULL DEFAULT '',
    destination TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    matched_driver_id TEXT NOT NULL DEFAULT '',
    matched_trip_id TEXT NOT NULL DEFAULT '',
    context TEXT NOT NULL DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS trips (
    id TEXT PRIMARY KEY,
    driver_id TEXT NOT NULL,
    rider_id TEXT NOT NULL,
    pickup_id TEXT NOT NULL DEFAULT '',
    pickup_name TEXT NOT NULL DEFAULT '',
    station_id TEXT NOT NULL DEFAULT '',
    station_name TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    eta_minutes INTEGER NOT NULL DEFAULT 0,
    started_at TEXT NOT NULL,
    completed_at TEXT NOT NULL DEFAULT '',
    destination TEXT NOT NULL DEFAULT '',
    metadata TEXT NOT NULL DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS trip_events (
    trip_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    payload TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

pub struct SqliteStore {
    sender: Sender<StoreRecord>,
}

impl SqliteStore {
    /// Opens (or creates) the database, applies the schema and starts the
    /// worker thread.
    pub fn open(path: &str) -> sqlite::Result<Self> {
        let mut connection = sqlite::open(path)?;
        connection.execute(SCHEMA)?;
        connection.set_busy_timeout(3000)?;

        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || drain(connection, receiver));
        Ok(Self { sender })
    }
}

impl TripStore for SqliteStore {
    fn record(&self, record: StoreRecord) {
        if self.sender.send(record).is_err() {
            warn!("trip store worker is gone; dropping record");
        }
    }
}

fn drain(connection: Connection, receiver: Receiver<StoreRecord>) {
    while let Ok(record) = receiver.recv() {
        if let Err(err) = apply(&connection, &record) {
            warn!(%err, "trip store write failed");
        }
    }
}

fn apply(connection: &Connection, record: &StoreRecord) -> sqlite::Result<()> {
    match record {
        StoreRecord::DriverRoute {
            plan,
            status,
            active,
            simulated,
        } => {
            let metadata = json!({
                "pickup_ids": plan.pickup_points.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
                "destination": plan.destination,
                "target_stops": plan.target_stations,
            })
            .to_string();
            let mut statement = connection.prepare(
                "INSERT INTO driver_routes (driver_id, seats_total, seats_available, status, active, simulate, metadata)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(driver_id) DO UPDATE SET
                     seats_total = excluded.seats_total,
                     seats_available = excluded.seats_available,
                     status = excluded.status,
                     active = excluded.active,
                     simulate = excluded.simulate,
                     metadata = excluded.metadata",
            )?;
            statement.bind((1, plan.driver_id.as_str()))?;
            statement.bind((2, plan.seats_total as i64))?;
            statement.bind((3, plan.seats_available as i64))?;
            statement.bind((4, status.as_str()))?;
            statement.bind((5, *active as i64))?;
            statement.bind((6, *simulated as i64))?;
            statement.bind((7, metadata.as_str()))?;
            statement.next()?;

            let mut cleanup = connection.prepare("DELETE FROM driver_route_pickups WHERE route_id = ?")?;
            cleanup.bind((1, plan.driver_id.as_str()))?;
            cleanup.next()?;

            for (sequence, pickup) in plan.pickup_points.iter().enumerate() {
                let mut insert = connection.prepare(
                    "INSERT INTO driver_route_pickups
                         (route_id, sequence, pickup_id, pickup_name, station_id, station_name, latitude, longitude)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )?;
                insert.bind((1, plan.driver_id.as_str()))?;
                insert.bind((2, sequence as i64))?;
                insert.bind((3, pickup.id.as_str()))?;
                insert.bind((4, pickup.name.as_str()))?;
                insert.bind((5, pickup.station_id.as_str()))?;
                insert.bind((6, pickup.station_name.as_str()))?;
                insert.bind((7, pickup.latitude))?;
                insert.bind((8, pickup.longitude))?;
                insert.next()?;
            }
        }
        StoreRecord::RouteStatus {
            driver_id,
            status,
            active,
            seats_available,
        } => {
            let mut statement = connection.prepare(
                "UPDATE driver_routes SET status = ?, active = ?, seats_available = ? WHERE driver_id = ?",
            )?;
            statement.bind((1, status.as_str()))?;
            statement.bind((2, *active as i64))?;
            statement.bind((3, *seats_available as i64))?;
            statement.bind((4, driver_id.as_str()))?;
            statement.next()?;
        }
        StoreRecord::RiderRequest {
            rider,
            pickup,
            status,
        } => {
            let (pickup_id, pickup_name, station_id, station_name) = match pickup {
                Some(p) => (
                    p.id.as_str(),
                    p.name.as_str(),
                    p.station_id.as_str(),
                    p.station_name.as_str(),
                ),
                None => ("", "", rider.station_id.as_str(), ""),
            };
            let context = json!({ "arrival_time": rider.arrival_time.to_rfc3339() }).to_string();
            let mut statement = connection.prepare(
                "INSERT INTO rider_requests
                     (rider_id, pickup_id, pickup_name, station_id, station_name, destination, status, context)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(rider_id) DO UPDATE SET
                     pickup_id = excluded.pickup_id,
                     pickup_name = excluded.pickup_name,
                     station_id = excluded.station_id,
                     station_name = excluded.station_name,
                     destination = excluded.destination,
                     status = excluded.status,
                     context = excluded.context",
            )?;
            statement.bind((1, rider.id.as_str()))?;
            statement.bind((2, pickup_id))?;
            statement.bind((3, pickup_name))?;
            statement.bind((4, station_id))?;
            statement.bind((5, station_name))?;
            statement.bind((6, rider.destination.as_str()))?;
            statement.bind((7, status.as_str()))?;
            statement.bind((8, context.as_str()))?;
            statement.next()?;
        }
        StoreRecord::RiderRequestStatus {
            rider_id,
            status,
            driver_id,
            trip_id,
        } => {
            let mut statement = connection.prepare(
                "UPDATE rider_requests SET status = ?, matched_driver_id = ?, matched_trip_id = ? WHERE rider_id = ?",
            )?;
            statement.bind((1, status.as_str()))?;
            statement.bind((2, driver_id.as_str()))?;
            statement.bind((3, trip_id.as_str()))?;
            statement.bind((4, rider_id.as_str()))?;
            statement.next()?;
        }
        StoreRecord::Trip { trip, pickup } => {
            let (pickup_name, station_name) = match pickup {
                Some(p) => (p.name.as_str(), p.station_name.as_str()),
                None => ("", ""),
            };
            let metadata = json!({ "status": trip.status, "created": trip.created_at.to_rfc3339() }).to_string();
            let completed_at = trip
                .completed_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            let mut statement = connection.prepare(
                "INSERT INTO trips
                     (id, driver_id, rider_id, pickup_id, pickup_name, station_id, station_name,
                      status, eta_minutes, started_at, completed_at, destination, metadata)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     status = excluded.status,
                     completed_at = excluded.completed_at,
                     metadata = excluded.metadata",
            )?;
            statement.bind((1, trip.id.as_str()))?;
            statement.bind((2, trip.driver_id.as_str()))?;
            statement.bind((3, trip.rider_id.as_str()))?;
            statement.bind((4, trip.pickup_id.as_str()))?;
            statement.bind((5, pickup_name))?;
            statement.bind((6, trip.station_id.as_str()))?;
            statement.bind((7, station_name))?;
            statement.bind((8, trip.status.as_str()))?;
            statement.bind((9, trip.eta_minutes as i64))?;
            statement.bind((10, trip.created_at.to_rfc3339().as_str()))?;
            statement.bind((11, completed_at.as_str()))?;
            statement.bind((12, trip.destination.as_str()))?;
            statement.bind((13, metadata.as_str()))?;
            statement.next()?;
        }
        StoreRecord::TripEvent {
            trip_id,
            event_type,
            payload,
        } => {
            let payload = payload.to_string();
            let mut statement = connection.prepare(
                "INSERT INTO trip_events (trip_id, event_type, payload) VALUES (?, ?, ?)",
            )?;
            statement.bind((1, trip_id.as_str()))?;
            statement.bind((2, event_type.as_str()))?;
            statement.bind((3, payload.as_str()))?;
            statement.next()?;
        }
    }
    Ok(())
}
