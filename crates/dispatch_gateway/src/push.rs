//! Expo-style push delivery. Fire-and-forget: each note is posted from its
//! own task with a short deadline, and failures are logged and dropped.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::warn;

use dispatch_realtime::adapters::{PushGateway, PushNote};

const PUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ExpoPush {
    client: Client,
    endpoint: String,
}

impl ExpoPush {
    pub fn new(endpoint: &str) -> Self {
        let client = Client::builder()
            .timeout(PUSH_TIMEOUT)
            .build()
            .expect("failed to build push client");
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

impl PushGateway for ExpoPush {
    fn notify(&self, note: PushNote) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            let payload = json!({
                "to": note.token,
                "title": note.title,
                "body": note.body,
                "sound": "default",
                "data": note.data,
            });
            match client.post(&endpoint).json(&payload).send().await {
                Ok(response) if !response.status().is_success() => {
                    warn!(status = %response.status(), "push delivery returned non-success");
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "push delivery failed"),
            }
        });
    }
}
