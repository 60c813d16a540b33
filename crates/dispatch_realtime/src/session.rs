//! Connected client sessions.
//!
//! A session is the hub-side handle of one socket: an unbounded outbound
//! channel drained by the connection's writer task, plus a connection id so
//! that a late disconnect from a superseded socket cannot evict its
//! successor.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::ServerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Driver,
    Rider,
}

impl Role {
    /// Parses the wire role, tolerating case and surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_lowercase().as_str() {
            "driver" => Some(Role::Driver),
            "rider" => Some(Role::Rider),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Driver => "driver",
            Role::Rider => "rider",
        }
    }
}

/// Outbound half of a session. Sending never blocks; the writer task performs
/// the actual socket write.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub conn_id: Uuid,
    pub connected_at: DateTime<Utc>,
    outbox: Outbox,
}

impl Session {
    pub fn new(user_id: &str, name: &str, conn_id: Uuid, outbox: Outbox) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: name.to_string(),
            conn_id,
            connected_at: Utc::now(),
            outbox,
        }
    }

    /// Enqueues an event for the writer task. A closed channel means the
    /// socket is gone; the event is simply dropped.
    pub fn send(&self, event: ServerEvent) {
        let _ = self.outbox.send(event);
    }
}
