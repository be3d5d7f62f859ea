//! Video title lookup over oEmbed.
//!
//! Sends `GET <endpoint>?url=<video>&format=json` and reads the `title`
//! field of the response. Providers such as YouTube answer this without an
//! API key.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct OembedResponse {
    #[serde(default)]
    title: String,
}

pub struct OembedTitles {
    client: reqwest::Client,
    endpoint: String,
}

impl OembedTitles {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// Title the provider reports for `url`.
    ///
    /// A non-2xx status or a blank title is a `Transport` error.
    pub async fn title(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("url", url), ("format", "json")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "oembed endpoint {} returned {} for {}",
                self.endpoint, status, url
            )));
        }

        let body: OembedResponse = response.json().await?;
        let title = body.title.trim();
        if title.is_empty() {
            return Err(Error::Transport(format!("oembed returned no title for {}", url)));
        }
        debug!(url = %url, title = %title, "resolved video title");
        Ok(title.to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    /// Serve `/oembed`, answering with a title only for `https://video.test/known`.
    pub(crate) async fn spawn_oembed() -> String {
        let app = Router::new().route(
            "/oembed",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let url = params.get("url").map(String::as_str);
                let format = params.get("format").map(String::as_str);
                match (url, format) {
                    (Some("https://video.test/known"), Some("json")) => Ok(Json(serde_json::json!({
                        "title": "Launch Livestream",
                        "provider_name": "VideoTest"
                    }))),
                    _ => Err(StatusCode::NOT_FOUND),
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/oembed", addr)
    }

    #[tokio::test]
    async fn resolves_title_from_provider() {
        let endpoint = spawn_oembed().await;
        let titles = OembedTitles::new(&endpoint, Duration::from_secs(5)).unwrap();
        assert_eq!(
            titles.title("https://video.test/known").await.unwrap(),
            "Launch Livestream"
        );
    }

    #[tokio::test]
    async fn unknown_video_is_transport_error() {
        let endpoint = spawn_oembed().await;
        let titles = OembedTitles::new(&endpoint, Duration::from_secs(5)).unwrap();
        let err = titles.title("https://video.test/missing").await.unwrap_err();
        assert!(matches!(err, Error::Transport(ref m) if m.contains("404")));
    }
}
