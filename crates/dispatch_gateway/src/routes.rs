//! REST surface. Handlers validate, delegate to the hub, and map
//! `DispatchError` onto 400/404 with a JSON error body.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use dispatch_core::error::DispatchError;
use dispatch_core::model::{BookRideCommand, RouteConfigRequest, RoutePlan, Trip};
use dispatch_core::state::{BackendSnapshot, DriverQueue};
use dispatch_realtime::events::BookRideResponse;
use dispatch_realtime::hub::Hub;

#[derive(Clone)]
pub struct AppContext {
    pub hub: Hub,
}

pub fn router(hub: Hub) -> Router {
    Router::new()
        .route("/rides/book", post(book_ride))
        .route("/drivers/routes", post(configure_route))
        .route("/drivers/trip/start", post(start_trip))
        .route("/drivers/requests/accept", post(accept_request))
        .route("/drivers/requests", get(driver_requests))
        .route("/aggregates/snapshot", get(snapshot))
        .route("/location/update", post(update_location))
        .route("/notifications/token", post(register_push_token))
        .route("/metro/pickups", get(pickup_points))
        .route("/realtime", get(crate::ws::realtime_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(AppContext { hub })
}

pub struct ApiError(DispatchError);

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DispatchError::InvalidInput(_) | DispatchError::PreconditionFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "error": self.0.message() }))).into_response()
    }
}

async fn book_ride(
    State(ctx): State<AppContext>,
    Json(cmd): Json<BookRideCommand>,
) -> Result<Json<BookRideResponse>, ApiError> {
    Ok(Json(ctx.hub.book_ride(&cmd)?))
}

async fn configure_route(
    State(ctx): State<AppContext>,
    Json(req): Json<RouteConfigRequest>,
) -> Result<Json<RoutePlan>, ApiError> {
    Ok(Json(ctx.hub.configure_route(&req)?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StartTripRequest {
    driver_id: String,
    simulate: bool,
}

async fn start_trip(
    State(ctx): State<AppContext>,
    Json(req): Json<StartTripRequest>,
) -> Result<Json<RoutePlan>, ApiError> {
    Ok(Json(ctx.hub.start_trip(&req.driver_id, req.simulate)?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AcceptRequest {
    driver_id: String,
    rider_id: String,
}

async fn accept_request(
    State(ctx): State<AppContext>,
    Json(req): Json<AcceptRequest>,
) -> Result<Json<Trip>, ApiError> {
    if req.driver_id.is_empty() || req.rider_id.is_empty() {
        return Err(DispatchError::invalid("driverId and riderId are required").into());
    }
    Ok(Json(ctx.hub.accept_request(&req.driver_id, &req.rider_id)?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DriverQuery {
    driver_id: String,
}

async fn driver_requests(
    State(ctx): State<AppContext>,
    Query(query): Query<DriverQuery>,
) -> Result<Json<DriverQueue>, ApiError> {
    if query.driver_id.is_empty() {
        return Err(DispatchError::invalid("driverId required").into());
    }
    Ok(Json(ctx.hub.driver_requests(&query.driver_id)?))
}

async fn snapshot(State(ctx): State<AppContext>) -> Json<BackendSnapshot> {
    Json(ctx.hub.snapshot())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LocationUpdate {
    driver_id: String,
    latitude: f64,
    longitude: f64,
}

async fn update_location(
    State(ctx): State<AppContext>,
    Json(update): Json<LocationUpdate>,
) -> Result<StatusCode, ApiError> {
    if update.driver_id.is_empty() {
        return Err(DispatchError::invalid("driverId required").into());
    }
    ctx.hub
        .record_location(&update.driver_id, update.latitude, update.longitude);
    Ok(StatusCode::OK)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PushTokenRequest {
    user_id: String,
    token: String,
}

async fn register_push_token(
    State(ctx): State<AppContext>,
    Json(req): Json<PushTokenRequest>,
) -> Result<StatusCode, ApiError> {
    if req.user_id.trim().is_empty() || req.token.trim().is_empty() {
        return Err(DispatchError::invalid("userId and token required").into());
    }
    ctx.hub.set_push_token(req.user_id.trim(), req.token.trim());
    Ok(StatusCode::NO_CONTENT)
}

async fn pickup_points(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!({ "pickupPoints": ctx.hub.pickup_points() }))
}
