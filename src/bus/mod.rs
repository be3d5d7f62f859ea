//! Remote command bus: publishes playback commands for the player.
//!
//! Messages are JSON objects tagged by `command`:
//!
//! ```json
//! {"command":"play","title":"Channel One","url":"http://example.test/1.m3u8"}
//! {"command":"stop"}
//! {"command":"restart"}
//! ```
//!
//! Publishing is fire-and-forget. There is no acknowledgement from the
//! player and no retry. A transport failure surfaces to the caller.
//!
//! Two publications from one [`CommandBus`] call reach the transport in
//! program order. Calls issued concurrently by different tasks are not
//! ordered relative to each other.

pub mod broadcast;
pub mod oembed;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::BusConfig;
use crate::context::OpContext;
use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::models::ChannelRecord;

pub use broadcast::{BroadcastTransport, Published};
pub use oembed::OembedTitles;
pub use webhook::WebhookTransport;

/// Title used by [`CommandBus::play_external`] when none is given and the
/// lookup is disabled or fails.
pub const DEFAULT_EXTERNAL_TITLE: &str = "External video";

/// A command as it travels on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum BusMessage {
    Play { title: String, url: String },
    Stop,
    Restart,
}

impl BusMessage {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    fn label(&self) -> &'static str {
        match self {
            BusMessage::Play { .. } => "play",
            BusMessage::Stop => "stop",
            BusMessage::Restart => "restart",
        }
    }
}

/// Delivers encoded messages to a named channel.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, channel: &str, payload: &str) -> Result<()>;
}

/// Build the transport named in `[bus]`.
pub fn open_transport(config: &BusConfig) -> Result<Arc<dyn Transport>> {
    match config.transport.as_str() {
        "broadcast" => Ok(Arc::new(BroadcastTransport::new())),
        "webhook" => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                Error::Configuration("bus.endpoint is required for the webhook transport".into())
            })?;
            Ok(Arc::new(WebhookTransport::new(
                endpoint,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        other => Err(Error::Configuration(format!(
            "unknown bus transport: '{}'",
            other
        ))),
    }
}

/// Build the external title lookup when `bus.title_lookup` is set.
pub fn open_titles(config: &BusConfig) -> Result<Option<OembedTitles>> {
    config
        .title_lookup
        .as_deref()
        .map(|endpoint| OembedTitles::new(endpoint, Duration::from_secs(config.timeout_secs)))
        .transpose()
}

/// Playback control over one directory and one transport.
pub struct CommandBus {
    directory: Arc<Directory>,
    transport: Arc<dyn Transport>,
    titles: Option<OembedTitles>,
    channel: String,
    settle: Duration,
    restart_wait: Duration,
}

impl CommandBus {
    pub fn new(
        directory: Arc<Directory>,
        transport: Arc<dyn Transport>,
        config: &BusConfig,
    ) -> Self {
        Self {
            directory,
            transport,
            titles: None,
            channel: config.channel.clone(),
            settle: config.settle(),
            restart_wait: config.restart_wait(),
        }
    }

    pub fn with_titles(mut self, titles: Option<OembedTitles>) -> Self {
        self.titles = titles;
        self
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    async fn publish(&self, cx: &OpContext, message: &BusMessage) -> Result<()> {
        let payload = message.encode()?;
        cx.run(self.transport.publish(&self.channel, &payload))
            .await?;
        info!(
            channel = %self.channel,
            transport = self.transport.name(),
            command = message.label(),
            "published bus command"
        );
        Ok(())
    }

    /// Resolve `id`, publish `Stop`, wait the settle interval, publish `Play`.
    ///
    /// An unknown id fails before anything is published.
    pub async fn play(&self, cx: &OpContext, id: &str) -> Result<ChannelRecord> {
        let record = self.directory.get_by_id(cx, id).await?;
        self.publish(cx, &BusMessage::Stop).await?;
        cx.sleep(self.settle).await?;
        self.publish(
            cx,
            &BusMessage::Play {
                title: record.name.clone(),
                url: record.url.clone(),
            },
        )
        .await?;
        Ok(record)
    }

    pub async fn stop(&self, cx: &OpContext) -> Result<()> {
        self.publish(cx, &BusMessage::Stop).await
    }

    /// Publish `Restart`, wait, then replay the current channel.
    pub async fn restart(&self, cx: &OpContext) -> Result<ChannelRecord> {
        self.publish(cx, &BusMessage::Restart).await?;
        cx.sleep(self.restart_wait).await?;
        let current = self.directory.get_current(cx).await?;
        self.play(cx, &current.id).await
    }

    /// Play a uniformly drawn id.
    pub async fn play_random(&self, cx: &OpContext) -> Result<ChannelRecord> {
        let id = self.directory.random_id(cx).await?;
        self.play(cx, &id.to_string()).await
    }

    /// Play a url that is not in the directory. No `Stop` is sent first.
    ///
    /// Without a given title the configured lookup is asked; a failed lookup
    /// falls back to [`DEFAULT_EXTERNAL_TITLE`].
    pub async fn play_external(
        &self,
        cx: &OpContext,
        url: &str,
        title: Option<&str>,
    ) -> Result<String> {
        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(given) => given.to_string(),
            None => self.lookup_title(cx, url).await?,
        };
        self.publish(
            cx,
            &BusMessage::Play {
                title: title.clone(),
                url: url.to_string(),
            },
        )
        .await?;
        Ok(title)
    }

    async fn lookup_title(&self, cx: &OpContext, url: &str) -> Result<String> {
        let Some(titles) = &self.titles else {
            return Ok(DEFAULT_EXTERNAL_TITLE.to_string());
        };
        match cx.run(titles.title(url)).await {
            Ok(title) => Ok(title),
            Err(err @ (Error::Cancelled | Error::DeadlineExceeded)) => Err(err),
            Err(err) => {
                warn!(url = %url, error = %err, "video title lookup failed");
                Ok(DEFAULT_EXTERNAL_TITLE.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::Instant;

    const SETTLE: Duration = Duration::from_millis(40);

    fn bus_config() -> BusConfig {
        BusConfig {
            settle_ms: SETTLE.as_millis() as u64,
            restart_wait_ms: SETTLE.as_millis() as u64,
            ..BusConfig::default()
        }
    }

    async fn fixture() -> (CommandBus, Arc<BroadcastTransport>) {
        let dir = Arc::new(Directory::new(
            Arc::new(MemoryKv::new()),
            "channel",
            "/nonexistent",
        ));
        let cx = OpContext::background();
        dir.save(
            &cx,
            &ChannelRecord::new("0", "Channel One", "http://example.test/1.m3u8"),
        )
        .await
        .unwrap();
        dir.save(
            &cx,
            &ChannelRecord::new("1", "Channel Two", "http://example.test/2.m3u8"),
        )
        .await
        .unwrap();
        let transport = Arc::new(BroadcastTransport::new());
        let bus = CommandBus::new(dir, transport.clone(), &bus_config());
        (bus, transport)
    }

    fn decode(p: Published) -> BusMessage {
        BusMessage::decode(&p.payload).unwrap()
    }

    #[test]
    fn wire_format_is_tagged_json() {
        assert_eq!(BusMessage::Stop.encode().unwrap(), r#"{"command":"stop"}"#);
        assert_eq!(
            BusMessage::Play {
                title: "T".into(),
                url: "u".into()
            }
            .encode()
            .unwrap(),
            r#"{"command":"play","title":"T","url":"u"}"#
        );
        assert_eq!(
            BusMessage::decode(r#"{"command":"restart"}"#).unwrap(),
            BusMessage::Restart
        );
        assert!(matches!(
            BusMessage::decode(r#"{"command":"rewind"}"#),
            Err(Error::Parse(_))
        ));
    }

    #[tokio::test]
    async fn play_sends_stop_then_play_after_settle() {
        let (bus, transport) = fixture().await;
        let mut rx = transport.subscribe();

        let started = Instant::now();
        let record = bus.play(&OpContext::background(), "1").await.unwrap();
        assert!(started.elapsed() >= SETTLE);
        assert_eq!(record.name, "Channel Two");

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.channel, "tvremote");
        assert_eq!(decode(first), BusMessage::Stop);
        assert_eq!(
            decode(second),
            BusMessage::Play {
                title: "Channel Two".into(),
                url: "http://example.test/2.m3u8".into()
            }
        );
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn unknown_id_publishes_nothing() {
        let (bus, transport) = fixture().await;
        let mut rx = transport.subscribe();
        let err = bus.play(&OpContext::background(), "99").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn stop_publishes_single_message() {
        let (bus, transport) = fixture().await;
        let mut rx = transport.subscribe();
        bus.stop(&OpContext::background()).await.unwrap();
        assert_eq!(decode(rx.recv().await.unwrap()), BusMessage::Stop);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_ok() {
        let (bus, _transport) = fixture().await;
        bus.stop(&OpContext::background()).await.unwrap();
    }

    #[tokio::test]
    async fn restart_replays_current_channel() {
        let (bus, transport) = fixture().await;
        let cx = OpContext::background();
        let current = bus.directory().get_by_id(&cx, "0").await.unwrap();
        bus.directory().register_current(&cx, &current).await.unwrap();

        let mut rx = transport.subscribe();
        let replayed = bus.restart(&cx).await.unwrap();
        assert_eq!(replayed, current);

        let msgs: Vec<BusMessage> = vec![
            decode(rx.recv().await.unwrap()),
            decode(rx.recv().await.unwrap()),
            decode(rx.recv().await.unwrap()),
        ];
        assert_eq!(
            msgs,
            vec![
                BusMessage::Restart,
                BusMessage::Stop,
                BusMessage::Play {
                    title: "Channel One".into(),
                    url: "http://example.test/1.m3u8".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn restart_without_current_fails_after_restart_message() {
        let (bus, transport) = fixture().await;
        let mut rx = transport.subscribe();
        let err = bus.restart(&OpContext::background()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(decode(rx.recv().await.unwrap()), BusMessage::Restart);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn random_on_empty_directory_publishes_nothing() {
        let dir = Arc::new(Directory::new(
            Arc::new(MemoryKv::new()),
            "channel",
            "/nonexistent",
        ));
        let transport = Arc::new(BroadcastTransport::new());
        let mut rx = transport.subscribe();
        let bus = CommandBus::new(dir, transport.clone(), &bus_config());
        assert!(matches!(
            bus.play_random(&OpContext::background()).await,
            Err(Error::EmptyDirectory)
        ));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn random_plays_a_known_channel() {
        let (bus, _transport) = fixture().await;
        let record = bus.play_random(&OpContext::background()).await.unwrap();
        assert!(record.id == "0" || record.id == "1");
    }

    #[tokio::test]
    async fn external_play_skips_stop_and_defaults_title() {
        let (bus, transport) = fixture().await;
        let mut rx = transport.subscribe();
        let title = bus
            .play_external(&OpContext::background(), "https://video.test/v", None)
            .await
            .unwrap();
        assert_eq!(title, DEFAULT_EXTERNAL_TITLE);
        assert_eq!(
            decode(rx.recv().await.unwrap()),
            BusMessage::Play {
                title: DEFAULT_EXTERNAL_TITLE.into(),
                url: "https://video.test/v".into()
            }
        );
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn external_play_uses_looked_up_title() {
        let endpoint = oembed::tests::spawn_oembed().await;
        let (bus, transport) = fixture().await;
        let bus = bus.with_titles(Some(
            OembedTitles::new(&endpoint, Duration::from_secs(5)).unwrap(),
        ));
        let mut rx = transport.subscribe();
        let cx = OpContext::background();

        let title = bus
            .play_external(&cx, "https://video.test/known", None)
            .await
            .unwrap();
        assert_eq!(title, "Launch Livestream");
        assert_eq!(
            decode(rx.recv().await.unwrap()),
            BusMessage::Play {
                title: "Launch Livestream".into(),
                url: "https://video.test/known".into()
            }
        );

        let given = bus
            .play_external(&cx, "https://video.test/known", Some("Mine"))
            .await
            .unwrap();
        assert_eq!(given, "Mine");
    }

    #[tokio::test]
    async fn failed_title_lookup_falls_back_to_default() {
        let endpoint = oembed::tests::spawn_oembed().await;
        let (bus, transport) = fixture().await;
        let bus = bus.with_titles(Some(
            OembedTitles::new(&endpoint, Duration::from_secs(5)).unwrap(),
        ));
        let mut rx = transport.subscribe();

        let title = bus
            .play_external(&OpContext::background(), "https://video.test/missing", None)
            .await
            .unwrap();
        assert_eq!(title, DEFAULT_EXTERNAL_TITLE);
        assert_eq!(
            decode(rx.recv().await.unwrap()),
            BusMessage::Play {
                title: DEFAULT_EXTERNAL_TITLE.into(),
                url: "https://video.test/missing".into()
            }
        );
    }

    #[tokio::test]
    async fn long_settle_does_not_block_other_callers() {
        let (bus, transport) = fixture().await;
        let config = BusConfig {
            settle_ms: 2000,
            restart_wait_ms: 2000,
            ..BusConfig::default()
        };
        let bus = Arc::new(CommandBus::new(
            bus.directory().clone(),
            transport.clone(),
            &config,
        ));
        let mut rx = transport.subscribe();

        let player = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.play(&OpContext::background(), "0").await })
        };
        // The first Stop marks the start of the settle wait.
        assert_eq!(decode(rx.recv().await.unwrap()), BusMessage::Stop);

        let window = Duration::from_millis(500);
        let cx = OpContext::background();
        let started = Instant::now();
        tokio::time::timeout(window, bus.stop(&cx))
            .await
            .expect("stop waited on the settling play")
            .unwrap();
        let found = tokio::time::timeout(window, bus.directory().search_by_name(&cx, "channel"))
            .await
            .expect("search waited on the settling play")
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(started.elapsed() < window);
        assert!(!player.is_finished());

        player.abort();
    }

    #[tokio::test]
    async fn cancellation_during_settle_skips_play() {
        let (bus, transport) = fixture().await;
        let mut rx = transport.subscribe();
        let token = tokio_util::sync::CancellationToken::new();
        let cx = OpContext::background().with_cancel(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(SETTLE / 4).await;
            token.cancel();
        });
        let err = bus.play(&cx, "0").await.unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(decode(rx.recv().await.unwrap()), BusMessage::Stop);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
