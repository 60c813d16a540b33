//! The dispatch hub: one lock over the whole coordinator.
//!
//! A single mutex serializes the domain state together with the transient
//! maps that hang off it (sessions, offer queues, pending approvals, trip
//! rooms, push tokens, simulation handles). Every public operation follows
//! the same discipline: acquire the lock, drive the state machine, enqueue
//! outbound events on the affected sessions (a non-blocking channel push, so
//! channel order equals commit order), collect side effects, release, then
//! hand the side effects to the fire-and-forget adapters.
//!
//! Timers (offer 20 s, approval 25 s) are spawned tasks that re-enter the
//! hub when they fire; each one re-validates its target under the lock and
//! becomes a no-op when the state has moved on. Cancelling a timer is an
//! abort-and-forget: nothing ever waits for a timer while holding the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde_json::json;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use dispatch_core::error::DispatchError;
use dispatch_core::model::{
    BookRideCommand, PickupPoint, RouteConfigRequest, RoutePlan, Trip,
};
use dispatch_core::state::{BackendSnapshot, DispatchState, DriverQueue};

use crate::adapters::{
    DirectorySink, NoopDirectory, NoopPush, NoopStore, PushGateway, PushNote, StoreRecord,
    TripStore,
};
use crate::approval::{cancel_reason_message, PendingApproval, APPROVAL_TIMEOUT};
use crate::events::{self, BookRideResponse, ServerEvent, TripStatusPayload};
use crate::offer::{OfferQueue, OFFER_TIMEOUT};
use crate::room::{RoomStatus, TripRoom};
use crate::session::{Outbox, Role, Session};
use crate::simulate;

/// The adapter set a hub is wired with. Defaults to no-ops, which is what
/// the tests use.
pub struct HubAdapters {
    pub push: Box<dyn PushGateway>,
    pub store: Box<dyn TripStore>,
    pub directory: Box<dyn DirectorySink>,
}

impl Default for HubAdapters {
    fn default() -> Self {
        Self {
            push: Box::new(NoopPush),
            store: Box::new(NoopStore),
            directory: Box::new(NoopDirectory),
        }
    }
}

/// Cheap-to-clone handle onto the shared coordinator.
#[derive(Clone)]
pub struct Hub {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<HubState>,
    push: Box<dyn PushGateway>,
    store: Box<dyn TripStore>,
    directory: Box<dyn DirectorySink>,
}

struct HubState {
    dispatch: DispatchState,
    drivers: HashMap<String, Session>,
    riders: HashMap<String, Session>,
    offers: HashMap<String, OfferQueue>,
    approvals: HashMap<String, PendingApproval>,
    rooms: HashMap<String, TripRoom>,
    push_tokens: HashMap<String, String>,
    sim_tasks: HashMap<String, AbortHandle>,
}

impl HubState {
    fn emit_to_driver(&self, driver_id: &str, event: ServerEvent) {
        if let Some(session) = self.drivers.get(driver_id) {
            session.send(event);
        }
    }

    fn emit_to_rider(&self, rider_id: &str, event: ServerEvent) {
        if let Some(session) = self.riders.get(rider_id) {
            session.send(event);
        }
    }

    fn emit_to_room(&self, room: &TripRoom, event: ServerEvent) {
        self.emit_to_driver(&room.driver_id, event.clone());
        self.emit_to_rider(&room.rider_id, event);
    }

    fn push_note(&self, user_id: &str, title: &str, body: String, data: serde_json::Value) -> Option<PushNote> {
        let token = self.push_tokens.get(user_id)?;
        Some(PushNote {
            token: token.clone(),
            title: title.to_string(),
            body,
            data,
        })
    }

    fn driver_display_name(&self, driver_id: &str) -> String {
        match self.dispatch.driver(driver_id) {
            Some(driver) if !driver.name.is_empty() => driver.name.clone(),
            _ => "Driver".to_string(),
        }
    }
}

/// Work deferred until after the lock is released.
#[derive(Default)]
struct Effects {
    pushes: Vec<PushNote>,
    records: Vec<StoreRecord>,
    register_route: Option<(dispatch_core::model::Driver, RoutePlan)>,
    publish_location: Option<(String, f64, f64)>,
    dispatch_next: Option<String>,
    spawn_sim: Option<(String, Vec<(f64, f64)>)>,
}

impl Hub {
    pub fn new(state: DispatchState, adapters: HubAdapters) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(HubState {
                    dispatch: state,
                    drivers: HashMap::new(),
                    riders: HashMap::new(),
                    offers: HashMap::new(),
                    approvals: HashMap::new(),
                    rooms: HashMap::new(),
                    push_tokens: HashMap::new(),
                    sim_tasks: HashMap::new(),
                }),
                push: adapters.push,
                store: adapters.store,
                directory: adapters.directory,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, fx: Effects) {
        for note in fx.pushes {
            self.shared.push.notify(note);
        }
        for record in fx.records {
            self.shared.store.record(record);
        }
        if let Some((driver, plan)) = fx.register_route {
            self.shared.directory.register_route(&driver, &plan);
        }
        if let Some((driver_id, lat, lon)) = fx.publish_location {
            self.shared.directory.publish_location(&driver_id, lat, lon);
        }
        if let Some((driver_id, hops)) = fx.spawn_sim {
            let handle = simulate::spawn(self.clone(), driver_id.clone(), hops);
            let mut guard = self.lock();
            if let Some(old) = guard.sim_tasks.insert(driver_id, handle) {
                old.abort();
            }
        }
        if let Some(rider_id) = fx.dispatch_next {
            self.dispatch_next(&rider_id);
        }
    }

    // ── sessions ───────────────────────────────────────────────────

    /// Registers a connection for `(role, user_id)`, superseding any earlier
    /// session. Drivers immediately receive their request queue; riders are
    /// re-sent any approval still pending for them.
    pub fn register_session(&self, role: Role, user_id: &str, name: &str, conn_id: Uuid, outbox: Outbox) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let session = Session::new(user_id, name, conn_id, outbox);
        session.send(events::ack(role, user_id));
        match role {
            Role::Driver => {
                state.drivers.insert(user_id.to_string(), session);
                refresh_driver_queue(state, user_id);
            }
            Role::Rider => {
                state.riders.insert(user_id.to_string(), session);
                let pending: Vec<ServerEvent> = state
                    .approvals
                    .values()
                    .filter(|a| a.rider.id == user_id)
                    .map(|a| events::approval_request(&a.trip, &a.driver_name, &a.pickup, &a.station))
                    .collect();
                for event in pending {
                    state.emit_to_rider(user_id, event);
                }
            }
        }
    }

    /// Handles a socket disconnect. A rider going away cancels their offer
    /// round and every approval they still owe a response to. Stale
    /// disconnects from superseded sockets do not match any session and fall
    /// through.
    pub fn remove_session(&self, conn_id: Uuid) {
        let mut fx = Effects::default();
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            let driver_id = state
                .drivers
                .iter()
                .find(|(_, s)| s.conn_id == conn_id)
                .map(|(id, _)| id.clone());
            if let Some(driver_id) = driver_id {
                state.drivers.remove(&driver_id);
                return;
            }
            let rider_id = match state
                .riders
                .iter()
                .find(|(_, s)| s.conn_id == conn_id)
                .map(|(id, _)| id.clone())
            {
                Some(id) => id,
                None => return,
            };
            state.riders.remove(&rider_id);

            if let Some(queue) = state.offers.remove(&rider_id) {
                queue.abort_timer();
                state.dispatch.reset_rider_waiting(&rider_id);
            }
            let owed: Vec<String> = state
                .approvals
                .values()
                .filter(|a| a.rider.id == rider_id)
                .map(|a| a.trip.id.clone())
                .collect();
            for trip_id in owed {
                cancel_pending(state, &trip_id, "rider_disconnected", &mut fx);
            }
        }
        self.flush(fx);
    }

    // ── booking & the offer loop ───────────────────────────────────

    /// Books a ride: resolves the request, registers the rider and, when any
    /// candidate exists, starts the sequential offer round.
    pub fn book_ride(&self, cmd: &BookRideCommand) -> Result<BookRideResponse, DispatchError> {
        let mut fx = Effects::default();
        let response = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let resolution = state.dispatch.book_ride(cmd)?;

            fx.records.push(StoreRecord::RiderRequest {
                rider: resolution.rider.clone(),
                pickup: Some(resolution.pickup.clone()),
                status: "waiting".to_string(),
            });

            let message = if resolution.attempts.is_empty() {
                format!("No drivers available near {} yet", resolution.station.name)
            } else {
                let rider_id = resolution.rider.id.clone();
                if let Some(old) = state.offers.remove(&rider_id) {
                    old.abort_timer();
                }
                state.offers.insert(
                    rider_id.clone(),
                    OfferQueue::new(
                        resolution.rider.clone(),
                        resolution.station.clone(),
                        resolution.pickup.clone(),
                        resolution.attempts.clone(),
                    ),
                );
                fx.dispatch_next = Some(rider_id);
                format!(
                    "Contacting {} drivers near {}",
                    resolution.attempts.len(),
                    resolution.station.name
                )
            };

            BookRideResponse {
                status: "queued".to_string(),
                message,
                rider: resolution.rider,
                station: resolution.station,
                pickup: Some(resolution.pickup),
                requested_destination: resolution.requested_destination,
                attempts: resolution.attempts,
                trip: None,
            }
        };
        self.flush(fx);
        Ok(response)
    }

    /// Pushes the offer to the next candidate, or ends the round with a
    /// `no_drivers` status once the list is exhausted.
    fn dispatch_next(&self, rider_id: &str) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let exhausted = match state.offers.get_mut(rider_id) {
            None => return,
            Some(queue) => {
                queue.abort_timer();
                queue.timer = None;
                queue.exhausted()
            }
        };
        if exhausted {
            if let Some(queue) = state.offers.remove(rider_id) {
                state.dispatch.reset_rider_waiting(rider_id);
                let payload = TripStatusPayload::no_drivers(rider_id, queue.attempts);
                state.emit_to_rider(rider_id, events::rider_status(&payload));
            }
            return;
        }

        let offer = {
            let queue = match state.offers.get_mut(rider_id) {
                Some(queue) => queue,
                None => return,
            };
            let attempt = queue.attempts[queue.index].clone();
            queue.waiting = Some(attempt.driver_id.clone());

            let hub = self.clone();
            let rider = rider_id.to_string();
            let driver = attempt.driver_id.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(OFFER_TIMEOUT).await;
                hub.offer_timed_out(&rider, &driver);
            });
            queue.timer = Some(handle.abort_handle());

            events::rider_offer(
                &queue.rider,
                &queue.station,
                &queue.pickup,
                queue.index + 1,
                queue.attempts.len(),
            )
        };
        state.dispatch.mark_rider_offering(rider_id);
        let driver_id = match state.offers.get(rider_id).and_then(|q| q.waiting.clone()) {
            Some(id) => id,
            None => return,
        };
        state.emit_to_driver(&driver_id, offer);
    }

    /// Offer timer fired. A response that raced ahead of the timer has
    /// already moved the queue; in that case this is a no-op.
    fn offer_timed_out(&self, rider_id: &str, driver_id: &str) {
        let advanced = {
            let mut guard = self.lock();
            let state = &mut *guard;
            match state.offers.get_mut(rider_id) {
                Some(queue) if queue.waiting.as_deref() == Some(driver_id) => {
                    queue.index += 1;
                    queue.waiting = None;
                    queue.timer = None;
                    true
                }
                _ => {
                    debug!(rider_id, driver_id, "offer timer fired for a stale attempt");
                    false
                }
            }
        };
        if advanced {
            self.dispatch_next(rider_id);
        }
    }

    /// A driver's answer to an offer. Responses from drivers that do not
    /// hold the rider's current offer are dropped.
    pub fn driver_response(&self, driver_id: &str, rider_id: &str, accept: bool, reason: Option<String>) {
        let mut fx = Effects::default();
        let advance = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let holds = matches!(
                state.offers.get(rider_id),
                Some(queue) if queue.waiting.as_deref() == Some(driver_id)
            );
            if !holds {
                debug!(driver_id, rider_id, "response from a driver that does not hold the offer");
                return;
            }
            if let Some(queue) = state.offers.get_mut(rider_id) {
                queue.abort_timer();
                queue.timer = None;
            }

            if accept {
                match state.dispatch.accept_offer(driver_id, rider_id) {
                    Ok(trip) => {
                        state.offers.remove(rider_id);
                        self.begin_approval(state, trip, &mut fx);
                        false
                    }
                    Err(err) => {
                        // Seats vanished or the destination no longer fits:
                        // downgrade to a reject and keep the round moving.
                        debug!(driver_id, rider_id, %err, "accept failed, advancing the offer round");
                        if let Some(queue) = state.offers.get_mut(rider_id) {
                            let index = queue.index;
                            if let Some(attempt) = queue.attempts.get_mut(index) {
                                attempt.reason = Some(err.to_string());
                            }
                            queue.index += 1;
                            queue.waiting = None;
                        }
                        true
                    }
                }
            } else {
                if let Some(queue) = state.offers.get_mut(rider_id) {
                    let index = queue.index;
                    if let Some(attempt) = queue.attempts.get_mut(index) {
                        attempt.reason = reason.clone();
                    }
                    queue.index += 1;
                    queue.waiting = None;
                }
                true
            }
        };
        self.flush(fx);
        if advance {
            self.dispatch_next(rider_id);
        }
    }

    /// REST accept path: a driver picks a rider from the browsed queue. The
    /// match still goes through the rider approval handshake.
    pub fn accept_request(&self, driver_id: &str, rider_id: &str) -> Result<Trip, DispatchError> {
        let mut fx = Effects::default();
        let trip = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let trip = state.dispatch.accept_offer(driver_id, rider_id)?;
            // The rider is matched now; any outstanding offer round is moot.
            if let Some(queue) = state.offers.remove(rider_id) {
                queue.abort_timer();
            }
            self.begin_approval(state, trip.clone(), &mut fx);
            trip
        };
        self.flush(fx);
        Ok(trip)
    }

    // ── the approval loop ──────────────────────────────────────────

    /// Opens the rider-confirmation window for a freshly accepted trip.
    fn begin_approval(&self, state: &mut HubState, trip: Trip, fx: &mut Effects) {
        let rider = match state.dispatch.rider(&trip.rider_id) {
            Some(rider) => rider.clone(),
            None => {
                warn!(trip_id = %trip.id, rider_id = %trip.rider_id, "accepted trip without a rider record");
                return;
            }
        };
        let pickup = state.dispatch.catalog().pickup_by_id(&trip.pickup_id).cloned();
        let station = state.dispatch.catalog().station_by_id(&trip.station_id).cloned();
        let driver_name = state.driver_display_name(&trip.driver_id);

        let hub = self.clone();
        let trip_id = trip.id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(APPROVAL_TIMEOUT).await;
            hub.approval_timed_out(&trip_id);
        });

        let pickup_name = pickup.as_ref().map(|p| p.name.clone()).unwrap_or_default();
        if let Some(note) = state.push_note(
            &trip.rider_id,
            "Driver ready for pickup",
            format!("{driver_name} is ready near {pickup_name}"),
            json!({ "tripId": trip.id, "driverId": trip.driver_id }),
        ) {
            fx.pushes.push(note);
        }

        let approval = PendingApproval {
            trip: trip.clone(),
            pickup,
            station,
            rider,
            driver_name,
            timer: Some(handle.abort_handle()),
        };
        let event = events::approval_request(&approval.trip, &approval.driver_name, &approval.pickup, &approval.station);
        state.approvals.insert(trip.id.clone(), approval);
        state.emit_to_rider(&trip.rider_id, event);
    }

    /// The rider's answer. Only the rider the approval belongs to may settle
    /// it; anything else is dropped.
    pub fn rider_approval(&self, rider_id: &str, trip_id: &str, accept: bool, reason: Option<String>) {
        let mut fx = Effects::default();
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            let owns = matches!(
                state.approvals.get(trip_id),
                Some(approval) if approval.rider.id == rider_id
            );
            if !owns {
                debug!(rider_id, trip_id, "approval response without a matching pending approval");
                return;
            }
            if accept {
                if let Some(approval) = state.approvals.remove(trip_id) {
                    approval.abort_timer();
                    match state.dispatch.finalize_trip(trip_id) {
                        Ok(trip) => confirm_trip(state, trip, &approval, &mut fx),
                        Err(err) => warn!(trip_id, %err, "finalize after rider approval failed"),
                    }
                }
            } else {
                let reason = reason
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| "rider_declined".to_string());
                cancel_pending(state, trip_id, &reason, &mut fx);
            }
        }
        self.flush(fx);
    }

    /// Approval timer fired; if the approval is still pending, the match is
    /// unwound with `rider_timeout`.
    fn approval_timed_out(&self, trip_id: &str) {
        let mut fx = Effects::default();
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            if !state.approvals.contains_key(trip_id) {
                return;
            }
            cancel_pending(state, trip_id, "rider_timeout", &mut fx);
        }
        self.flush(fx);
    }

    // ── location & trip rooms ──────────────────────────────────────

    /// Ingests a driver position: updates the state machine, broadcasts to
    /// the driver's live rooms and advances room status over the pickup and
    /// dropoff checkpoints.
    pub fn record_location(&self, driver_id: &str, latitude: f64, longitude: f64) {
        let mut fx = Effects::default();
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            let outcome = state.dispatch.record_driver_location(driver_id, latitude, longitude);

            let now = Utc::now();
            let live_rooms: Vec<String> = state
                .rooms
                .values()
                .filter(|room| room.driver_id == driver_id && !room.is_completed())
                .map(|room| room.id.clone())
                .collect();
            for room_id in &live_rooms {
                if let Some(room) = state.rooms.get_mut(room_id) {
                    room.last_lat = latitude;
                    room.last_lon = longitude;
                    room.updated_at = now;
                }
                if let Some(room) = state.rooms.get(room_id) {
                    let payload = room.location_payload(latitude, longitude);
                    state.emit_to_room(room, events::trip_location(&payload));
                }
            }

            if let Some(pickup) = &outcome.crossed_pickup {
                for room_id in &live_rooms {
                    let matches_pickup = state.rooms.get(room_id).is_some_and(|room| {
                        room.status == RoomStatus::AwaitingPickup
                            && room.pickup.as_ref().is_some_and(|p| p.id == pickup.id)
                    });
                    if !matches_pickup {
                        continue;
                    }
                    if let Some(room) = state.rooms.get_mut(room_id) {
                        room.status = RoomStatus::InProgress;
                    }
                    if let Some(room) = state.rooms.get(room_id) {
                        let payload = room.status_payload();
                        state.emit_to_room(room, events::trip_status(&payload));
                    }
                }
                for trip in &outcome.started_trips {
                    fx.records.push(StoreRecord::Trip {
                        trip: trip.clone(),
                        pickup: Some(pickup.clone()),
                    });
                    fx.records.push(StoreRecord::TripEvent {
                        trip_id: trip.id.clone(),
                        event_type: "pickup_reached".to_string(),
                        payload: json!({ "pickupId": pickup.id }),
                    });
                }
            }

            for trip in &outcome.completed_trips {
                if let Some(mut room) = state.rooms.remove(&trip.id) {
                    room.status = RoomStatus::Completed;
                    let payload = room.status_payload();
                    state.emit_to_room(&room, events::trip_status(&payload));
                }
                fx.records.push(StoreRecord::Trip {
                    trip: trip.clone(),
                    pickup: state.dispatch.catalog().pickup_by_id(&trip.pickup_id).cloned(),
                });
                fx.records.push(StoreRecord::TripEvent {
                    trip_id: trip.id.clone(),
                    event_type: "dropoff_reached".to_string(),
                    payload: json!({ "stationId": trip.station_id }),
                });
                fx.records.push(StoreRecord::RiderRequestStatus {
                    rider_id: trip.rider_id.clone(),
                    status: "completed".to_string(),
                    driver_id: trip.driver_id.clone(),
                    trip_id: trip.id.clone(),
                });
            }
            if !outcome.completed_trips.is_empty() {
                refresh_driver_queue(state, driver_id);
            }

            fx.publish_location = Some((driver_id.to_string(), latitude, longitude));
        }
        self.flush(fx);
    }

    /// Manual or auto completion of a live trip. Idempotent end to end: the
    /// seat and the durable records are produced only on the first call.
    pub fn complete_trip(&self, trip_id: &str, description: &str) {
        let mut fx = Effects::default();
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            let room = state.rooms.remove(trip_id);
            match state.dispatch.complete_trip(trip_id) {
                Ok((trip, first)) => {
                    if let Some(mut room) = room {
                        room.status = RoomStatus::Completed;
                        let mut payload = room.status_payload();
                        payload.description = Some(description.to_string());
                        state.emit_to_room(&room, events::trip_status(&payload));
                    }
                    if first {
                        fx.records.push(StoreRecord::Trip {
                            trip: trip.clone(),
                            pickup: state.dispatch.catalog().pickup_by_id(&trip.pickup_id).cloned(),
                        });
                        fx.records.push(StoreRecord::TripEvent {
                            trip_id: trip.id.clone(),
                            event_type: "completed".to_string(),
                            payload: json!({ "riderId": trip.rider_id }),
                        });
                        fx.records.push(StoreRecord::RiderRequestStatus {
                            rider_id: trip.rider_id.clone(),
                            status: "completed".to_string(),
                            driver_id: trip.driver_id.clone(),
                            trip_id: trip.id.clone(),
                        });
                        refresh_driver_queue(state, &trip.driver_id);
                    }
                }
                Err(err) => warn!(trip_id, %err, "trip completion failed"),
            }
        }
        self.flush(fx);
    }

    // ── driver routes ──────────────────────────────────────────────

    /// Configures (or replaces) a driver's route. Any running simulation for
    /// the driver is cancelled first.
    pub fn configure_route(&self, req: &RouteConfigRequest) -> Result<RoutePlan, DispatchError> {
        let mut fx = Effects::default();
        let plan = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let plan = state.dispatch.configure_driver_route(req)?;
            if let Some(handle) = state.sim_tasks.remove(&plan.driver_id) {
                handle.abort();
            }
            if let Some(driver) = state.dispatch.driver(&plan.driver_id).cloned() {
                fx.register_route = Some((driver, plan.clone()));
            }
            fx.records.push(StoreRecord::DriverRoute {
                plan: plan.clone(),
                status: "configured".to_string(),
                active: false,
                simulated: false,
            });
            refresh_driver_queue(state, &plan.driver_id);
            plan
        };
        self.flush(fx);
        Ok(plan)
    }

    /// Starts the driver's shift; with `simulate` the hub also spawns the
    /// waypoint-hopping location task.
    pub fn start_trip(&self, driver_id: &str, simulate: bool) -> Result<RoutePlan, DispatchError> {
        let mut fx = Effects::default();
        let plan = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let plan = state.dispatch.start_driver_trip(driver_id, simulate)?;
            if let Some(handle) = state.sim_tasks.remove(&plan.driver_id) {
                handle.abort();
            }
            if simulate && !plan.pickup_points.is_empty() {
                fx.spawn_sim = Some((plan.driver_id.clone(), simulation_hops(state, &plan.pickup_points)));
            }
            fx.records.push(StoreRecord::RouteStatus {
                driver_id: plan.driver_id.clone(),
                status: "active".to_string(),
                active: true,
                seats_available: plan.seats_available,
            });
            refresh_driver_queue(state, &plan.driver_id);
            plan
        };
        self.flush(fx);
        Ok(plan)
    }

    // ── reads & small writes ───────────────────────────────────────

    pub fn driver_requests(&self, driver_id: &str) -> Result<DriverQueue, DispatchError> {
        self.lock().dispatch.driver_requests(driver_id)
    }

    pub fn snapshot(&self) -> BackendSnapshot {
        self.lock().dispatch.snapshot()
    }

    pub fn pickup_points(&self) -> Vec<PickupPoint> {
        self.lock().dispatch.catalog().pickup_points().to_vec()
    }

    pub fn set_push_token(&self, user_id: &str, token: &str) {
        self.lock()
            .push_tokens
            .insert(user_id.to_string(), token.to_string());
    }
}

/// Unwinds a pending approval: removes the trip, returns the seat, resets
/// the rider and tells the driver why.
fn cancel_pending(state: &mut HubState, trip_id: &str, reason: &str, fx: &mut Effects) {
    let approval = match state.approvals.remove(trip_id) {
        Some(approval) => approval,
        None => return,
    };
    approval.abort_timer();
    match state.dispatch.cancel_pending_trip(trip_id) {
        Ok(trip) => {
            state.emit_to_driver(&trip.driver_id, events::trip_cancelled(trip_id, reason));
            fx.records.push(StoreRecord::TripEvent {
                trip_id: trip_id.to_string(),
                event_type: "cancelled".to_string(),
                payload: json!({ "reason": reason }),
            });
            if let Some(note) = state.push_note(
                &trip.driver_id,
                "Ride cancelled",
                cancel_reason_message(reason),
                json!({ "tripId": trip_id }),
            ) {
                fx.pushes.push(note);
            }
        }
        Err(err) => warn!(trip_id, reason, %err, "cancel pending trip failed"),
    }
}

/// The rider confirmed: open the room and notify both sides.
fn confirm_trip(state: &mut HubState, trip: Trip, approval: &PendingApproval, fx: &mut Effects) {
    let room = TripRoom::new(&trip, approval.pickup.clone(), approval.station.clone());
    let mut payload = room.status_payload();
    payload.trip = Some(trip.clone());
    payload.rider = state.dispatch.rider(&trip.rider_id).cloned();
    state.rooms.insert(trip.id.clone(), room);

    state.emit_to_driver(&trip.driver_id, events::room_created(&payload));
    state.emit_to_rider(&trip.rider_id, events::rider_status(&payload));
    refresh_driver_queue(state, &trip.driver_id);

    fx.records.push(StoreRecord::Trip {
        trip: trip.clone(),
        pickup: approval.pickup.clone(),
    });
    fx.records.push(StoreRecord::TripEvent {
        trip_id: trip.id.clone(),
        event_type: "matched".to_string(),
        payload: json!({ "driverId": trip.driver_id, "riderId": trip.rider_id }),
    });
    fx.records.push(StoreRecord::RiderRequestStatus {
        rider_id: trip.rider_id.clone(),
        status: "matched".to_string(),
        driver_id: trip.driver_id.clone(),
        trip_id: trip.id.clone(),
    });
    let rider_name = if approval.rider.name.is_empty() {
        "Rider".to_string()
    } else {
        approval.rider.name.clone()
    };
    if let Some(note) = state.push_note(
        &trip.driver_id,
        "Rider confirmed",
        format!("{rider_name} confirmed pickup"),
        json!({ "tripId": trip.id, "riderId": trip.rider_id }),
    ) {
        fx.pushes.push(note);
    }
}

/// Recomputes and pushes the driver's request queue, if the driver is
/// connected and known.
fn refresh_driver_queue(state: &HubState, driver_id: &str) {
    if !state.drivers.contains_key(driver_id) {
        return;
    }
    match state.dispatch.driver_requests(driver_id) {
        Ok(queue) => state.emit_to_driver(driver_id, events::driver_queue(&queue)),
        Err(err) => debug!(driver_id, %err, "driver queue refresh skipped"),
    }
}

/// Expands the pickup list into the simulated waypoint sequence: each pickup
/// followed by its station centroid.
fn simulation_hops(state: &HubState, pickups: &[PickupPoint]) -> Vec<(f64, f64)> {
    let mut hops = Vec::with_capacity(pickups.len() * 2);
    for pickup in pickups {
        hops.push((pickup.latitude, pickup.longitude));
        if let Some(station) = state.dispatch.catalog().station_by_id(&pickup.station_id) {
            hops.push((station.latitude, station.longitude));
        }
    }
    hops
}
