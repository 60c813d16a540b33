//! WebSocket protocol façade.
//!
//! Messages travel in a `{"event": ..., "payload": ...}` envelope both ways.
//! The read loop translates client events into hub calls; a writer task
//! drains the session's outbound channel so hub emission never touches the
//! socket directly. A connection must identify itself with `session:init`
//! before any other event is honoured.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use dispatch_realtime::events::{self, ClientMessage, ServerEvent};
use dispatch_realtime::hub::Hub;
use dispatch_realtime::session::Role;

use crate::routes::AppContext;

pub async fn realtime_handler(
    State(ctx): State<AppContext>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_socket(socket, ctx.hub))
}

async fn handle_socket(socket: WebSocket, hub: Hub) {
    let conn_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(_) => continue,
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut identity: Option<(Role, String)> = None;
    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(_) => break,
        };
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let parsed: ClientMessage = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(%err, "dropping unparseable client message");
                continue;
            }
        };
        match parsed {
            ClientMessage::SessionInit(init) => {
                let user_id = init.user_id.trim().to_string();
                match Role::parse(&init.role) {
                    Some(role) if !user_id.is_empty() => {
                        identity = Some((role, user_id.clone()));
                        hub.register_session(role, &user_id, &init.name, conn_id, tx.clone());
                    }
                    _ => {
                        let _ = tx.send(events::session_error("role and userId required"));
                    }
                }
            }
            ClientMessage::DriverResponse(payload) => {
                if let Some((Role::Driver, driver_id)) = &identity {
                    hub.driver_response(driver_id, &payload.rider_id, payload.accept, payload.reason);
                }
            }
            ClientMessage::ApprovalResponse(payload) => {
                if let Some((Role::Rider, rider_id)) = &identity {
                    if !payload.trip_id.is_empty() {
                        hub.rider_approval(rider_id, &payload.trip_id, payload.accept, payload.reason);
                    }
                }
            }
            ClientMessage::TripComplete(trip_id) => {
                if matches!(&identity, Some((Role::Driver, _))) && !trip_id.is_empty() {
                    hub.complete_trip(&trip_id, "completed (manual)");
                }
            }
        }
    }

    hub.remove_session(conn_id);
    writer.abort();
}
