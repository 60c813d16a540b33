//! Best-effort mirror to the external driver/location directory.
//!
//! Registration and location publication never gate a state transition: the
//! calls run on their own tasks with per-call deadlines, and any failure is
//! logged and swallowed.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::warn;

use dispatch_core::model::{Driver, RoutePlan};
use dispatch_realtime::adapters::DirectorySink;

const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(3);
const LOCATION_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: Client,
    base: String,
}

impl HttpDirectory {
    pub fn new(base: &str) -> Self {
        let client = Client::builder()
            .timeout(DIRECTORY_TIMEOUT)
            .build()
            .expect("failed to build directory client");
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

impl DirectorySink for HttpDirectory {
    fn register_route(&self, driver: &Driver, plan: &RoutePlan) {
        let client = self.client.clone();
        let driver_url = format!("{}/drivers", self.base);
        let route_url = format!("{}/routes", self.base);
        let driver_payload = json!({
            "id": driver.id,
            "name": driver.name,
            "carDetails": driver.car_details,
        });
        let route_payload = json!({
            "driverId": plan.driver_id,
            "targetStationIds": plan.target_stations,
            "availableSeats": plan.seats_available,
            "destination": plan.destination,
        });
        let driver_id = driver.id.clone();
        tokio::spawn(async move {
            if let Err(err) = client.post(&driver_url).json(&driver_payload).send().await {
                warn!(%driver_id, %err, "driver registration failed");
            }
            if let Err(err) = client.post(&route_url).json(&route_payload).send().await {
                warn!(%driver_id, %err, "route registration failed");
            }
        });
    }

    fn publish_location(&self, driver_id: &str, latitude: f64, longitude: f64) {
        let client = self.client.clone();
        let url = format!("{}/locations", self.base);
        let payload = json!({
            "driverId": driver_id,
            "latitude": latitude,
            "longitude": longitude,
        });
        let driver_id = driver_id.to_string();
        tokio::spawn(async move {
            let request = client.post(&url).json(&payload).timeout(LOCATION_TIMEOUT);
            if let Err(err) = request.send().await {
                warn!(%driver_id, %err, "location publish failed");
            }
        });
    }
}
