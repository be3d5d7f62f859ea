//! HTTP transport for an out-of-process player.
//!
//! Each message is sent as `POST <endpoint>/<channel>` with the JSON payload
//! as the body. A non-2xx response is a `Transport` error; nothing is
//! retried.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::Transport;
use crate::error::{Error, Result};

pub struct WebhookTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookTransport {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, channel: &str) -> String {
        format!("{}/{}", self.endpoint, channel)
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        let url = self.url_for(channel);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(payload.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "bus endpoint {} returned {}: {}",
                url, status, body_text
            )));
        }
        debug!(url = %url, %status, "webhook publish");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use std::sync::{Arc, Mutex};

    #[test]
    fn url_joins_endpoint_and_channel() {
        let t = WebhookTransport::new("http://127.0.0.1:7340/bus/", Duration::from_secs(1))
            .unwrap();
        assert_eq!(t.url_for("tvremote"), "http://127.0.0.1:7340/bus/tvremote");
    }

    async fn spawn_player() -> (String, Arc<Mutex<Vec<String>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let app = Router::new()
            .route(
                "/bus/tvremote",
                post(move |body: String| {
                    let sink = sink.clone();
                    async move {
                        sink.lock().unwrap().push(body);
                        StatusCode::NO_CONTENT
                    }
                }),
            )
            .route(
                "/bus/broken",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "player down") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/bus", addr), received)
    }

    #[tokio::test]
    async fn posts_payload_to_channel_path() {
        let (endpoint, received) = spawn_player().await;
        let t = WebhookTransport::new(&endpoint, Duration::from_secs(5)).unwrap();
        t.publish("tvremote", r#"{"command":"stop"}"#).await.unwrap();
        assert_eq!(
            received.lock().unwrap().as_slice(),
            [r#"{"command":"stop"}"#.to_string()]
        );
    }

    #[tokio::test]
    async fn non_success_status_is_transport_error() {
        let (endpoint, _) = spawn_player().await;
        let t = WebhookTransport::new(&endpoint, Duration::from_secs(5)).unwrap();
        let err = t.publish("broken", "{}").await.unwrap_err();
        assert!(matches!(err, Error::Transport(ref m) if m.contains("player down")));
    }
}
