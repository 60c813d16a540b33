//! Booking: resolve the request to a station + pickup, upsert the rider and
//! compute the ranked candidate list. The offer round itself runs above the
//! state, one driver at a time.

use chrono::{Duration, Utc};

use crate::error::DispatchError;
use crate::model::{BookRideCommand, DriverAttempt, PickupPoint, Rider, RiderStatus, Station};
use crate::ranking;

use super::{next_id, DispatchState};

/// Riders are told to expect the driver this many minutes out.
const RIDER_ARRIVAL_OFFSET_MIN: i64 = 7;

/// Everything the offer loop needs to start contacting drivers.
#[derive(Debug, Clone)]
pub struct BookingResolution {
    pub rider: Rider,
    pub station: Station,
    pub pickup: PickupPoint,
    pub requested_destination: String,
    pub attempts: Vec<DriverAttempt>,
}

impl DispatchState {
    /// Resolves the booking to a station + pickup, registers the rider as
    /// waiting and ranks the eligible drivers. An empty attempt list is a
    /// valid outcome; the rider simply stays queued.
    pub fn book_ride(&mut self, cmd: &BookRideCommand) -> Result<BookingResolution, DispatchError> {
        let command = cmd.command.trim().to_lowercase();
        if command != "book" {
            return Err(DispatchError::invalid(format!(
                "unsupported command '{}'",
                cmd.command
            )));
        }

        let (station, pickup, inferred_area) = self.resolve_station(cmd)?;
        let pickup = pickup.ok_or_else(|| DispatchError::invalid("pickup point required"))?;

        let mut destination = cmd.destination.trim().to_string();
        if destination.is_empty() {
            destination = inferred_area;
        }
        if destination.is_empty() {
            destination = pickup.name.clone();
        }
        let mut name = cmd.name.trim().to_string();
        if name.is_empty() {
            name = "Guest Rider".to_string();
        }

        let rider = self.upsert_rider(&cmd.rider_id, &name, &station, &destination, &pickup);
        let attempts = ranking::rank(&station, &pickup, &self.drivers, &self.plans);

        Ok(BookingResolution {
            rider,
            station,
            pickup,
            requested_destination: destination,
            attempts,
        })
    }

    /// Station resolution order: explicit pickup id, explicit station id,
    /// then free-text inference (pickup name first, nearby area second).
    fn resolve_station(
        &self,
        cmd: &BookRideCommand,
    ) -> Result<(Station, Option<PickupPoint>, String), DispatchError> {
        if !cmd.pickup_id.is_empty() {
            let pickup = self
                .catalog
                .pickup_by_id(&cmd.pickup_id)
                .ok_or_else(|| DispatchError::invalid(format!("unknown pickup '{}'", cmd.pickup_id)))?;
            let station = self.catalog.station_by_id(&pickup.station_id).ok_or_else(|| {
                DispatchError::invalid(format!("unknown station '{}'", pickup.station_id))
            })?;
            return Ok((station.clone(), Some(pickup.clone()), pickup.name.clone()));
        }

        if !cmd.station_id.is_empty() {
            let station = self.catalog.station_by_id(&cmd.station_id).ok_or_else(|| {
                DispatchError::invalid(format!("unknown station '{}'", cmd.station_id))
            })?;
            return Ok((station.clone(), None, cmd.destination.trim().to_string()));
        }

        let text = format!("{} {}", cmd.address, cmd.destination);
        let text = text.trim();
        if text.is_empty() {
            return Err(DispatchError::invalid("address or pickup is required"));
        }

        if let Some(pickup) = self.catalog.match_pickup_by_text(text) {
            let station = self.catalog.station_by_id(&pickup.station_id).ok_or_else(|| {
                DispatchError::invalid(format!("unknown station '{}'", pickup.station_id))
            })?;
            return Ok((station.clone(), Some(pickup.clone()), pickup.name.clone()));
        }

        let (station, area) = self
            .catalog
            .match_station_by_text(text)
            .ok_or_else(|| DispatchError::invalid(format!("could not infer station from '{text}'")))?;
        let station = station.clone();
        let pickup = self
            .catalog
            .match_pickup_by_text(&area.to_lowercase())
            .cloned();
        Ok((station, pickup, area))
    }

    fn upsert_rider(
        &mut self,
        rider_id: &str,
        name: &str,
        station: &Station,
        destination: &str,
        pickup: &PickupPoint,
    ) -> Rider {
        let arrival = Utc::now() + Duration::minutes(RIDER_ARRIVAL_OFFSET_MIN);
        if !rider_id.is_empty() {
            if let Some(rider) = self.rider_mut(rider_id) {
                rider.name = name.to_string();
                rider.station_id = station.id.clone();
                rider.destination = destination.to_string();
                rider.status = RiderStatus::Waiting;
                rider.arrival_time = arrival;
                rider.pickup_id = pickup.id.clone();
                return rider.clone();
            }
        }

        let id = if rider_id.is_empty() {
            next_id("rider")
        } else {
            rider_id.to_string()
        };
        let rider = Rider {
            id,
            name: name.to_string(),
            destination: destination.to_string(),
            arrival_time: arrival,
            station_id: station.id.clone(),
            pickup_id: pickup.id.clone(),
            status: RiderStatus::Waiting,
        };
        self.riders.insert(0, rider.clone());
        rider
    }
}
