//! Remote commands and their text replies.
//!
//! [`RemoteCommand`] is the closed set of operations a remote client can
//! request. [`Controller::handle`] runs one command against a
//! [`CommandBus`] and returns the reply a chat client would display.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bus::CommandBus;
use crate::context::OpContext;
use crate::directory::Directory;
use crate::error::Result;
use crate::models::ChannelRecord;

/// Maximum reply length accepted by chat clients.
pub const MAX_REPLY_CHARS: usize = 2000;

const TRUNCATED_SUFFIX: &str = "\n\nSearch truncated, be more specific";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum RemoteCommand {
    Tv {
        channel: u64,
    },
    Yt {
        url: String,
        #[serde(default)]
        title: Option<String>,
    },
    Stop,
    Search {
        query: String,
    },
    Restart,
    Random,
    Catalog,
}

impl RemoteCommand {
    pub fn name(&self) -> &'static str {
        match self {
            RemoteCommand::Tv { .. } => "tv",
            RemoteCommand::Yt { .. } => "yt",
            RemoteCommand::Stop => "stop",
            RemoteCommand::Search { .. } => "search",
            RemoteCommand::Restart => "restart",
            RemoteCommand::Random => "random",
            RemoteCommand::Catalog => "catalog",
        }
    }
}

/// Text reply plus the structured result it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Reply {
    fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            channel: None,
            path: None,
        }
    }

    fn with_channel(content: String, channel: ChannelRecord) -> Self {
        Self {
            content,
            channel: Some(channel),
            path: None,
        }
    }
}

/// Name and one-line description of a command, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    pub name: &'static str,
    pub description: String,
}

pub struct Controller {
    bus: Arc<CommandBus>,
}

impl Controller {
    pub fn new(bus: Arc<CommandBus>) -> Self {
        Self { bus }
    }

    fn directory(&self) -> &Arc<Directory> {
        self.bus.directory()
    }

    pub async fn handle(&self, cx: &OpContext, command: RemoteCommand) -> Result<Reply> {
        info!(command = command.name(), "handling remote command");
        match command {
            RemoteCommand::Tv { channel } => {
                let record = self.bus.play(cx, &channel.to_string()).await?;
                self.directory().register_current(cx, &record).await?;
                Ok(Reply::with_channel(
                    format!("TV channel set to {} - {}", record.id, record.name),
                    record,
                ))
            }
            RemoteCommand::Random => {
                let record = self.bus.play_random(cx).await?;
                self.directory().register_current(cx, &record).await?;
                Ok(Reply::with_channel(
                    format!("Random channel set to {} - {}", record.id, record.name),
                    record,
                ))
            }
            RemoteCommand::Stop => {
                self.bus.stop(cx).await?;
                Ok(Reply::text("TV stopped"))
            }
            RemoteCommand::Search { query } => {
                let channels = self.directory().search_by_name(cx, &query).await?;
                Ok(Reply::text(render_search(&channels)))
            }
            RemoteCommand::Restart => {
                let record = self.bus.restart(cx).await?;
                Ok(Reply::with_channel(
                    format!("Player restarted on {} - {}", record.id, record.name),
                    record,
                ))
            }
            RemoteCommand::Yt { url, title } => {
                let title = self.bus.play_external(cx, &url, title.as_deref()).await?;
                Ok(Reply::text(format!("Playing video: {}", title)))
            }
            RemoteCommand::Catalog => {
                let exported = self.directory().export_csv(cx).await?;
                Ok(Reply {
                    content: format!("Catalog exported to {}", exported.path.display()),
                    channel: None,
                    path: Some(exported.path),
                })
            }
        }
    }

    /// Valid `tv` ids, `0..=count-1`; `None` when the directory is empty.
    pub async fn channel_range(&self, cx: &OpContext) -> Result<Option<RangeInclusive<u64>>> {
        let count = self.directory().count(cx).await?;
        Ok(count.checked_sub(1).map(|last| 0..=last))
    }

    /// Every command with its description, `tv` showing the current id range.
    pub async fn describe(&self, cx: &OpContext) -> Result<Vec<CommandInfo>> {
        let tv = match self.channel_range(cx).await? {
            Some(range) => format!("Set the TV channel (0-{})", range.end()),
            None => "Set the TV channel (directory is empty)".to_string(),
        };
        let info = |name, description: &str| CommandInfo {
            name,
            description: description.to_string(),
        };
        Ok(vec![
            CommandInfo {
                name: "tv",
                description: tv,
            },
            info("yt", "Play an external video url"),
            info("stop", "Stop the TV"),
            info("search", "Search channels by name"),
            info("restart", "Restart the player on the current channel"),
            info("random", "Play a random channel"),
            info("catalog", "Export the channel catalog as CSV"),
        ])
    }
}

/// Search reply text, cut to [`MAX_REPLY_CHARS`] on a character boundary.
pub fn render_search(channels: &[ChannelRecord]) -> String {
    if channels.is_empty() {
        return "No channels found".to_string();
    }
    let mut content = String::from("Channels found:\n");
    for channel in channels {
        content.push_str(&channel.id);
        content.push_str(" - ");
        content.push_str(&channel.name);
        content.push('\n');
    }
    truncate_reply(content)
}

fn truncate_reply(content: String) -> String {
    let max = MAX_REPLY_CHARS - TRUNCATED_SUFFIX.chars().count();
    match content.char_indices().nth(max) {
        Some((cut, _)) => {
            let mut out = content[..cut].to_string();
            out.push_str(TRUNCATED_SUFFIX);
            out
        }
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BroadcastTransport, BusMessage};
    use crate::config::BusConfig;
    use crate::error::Error;
    use crate::kv::MemoryKv;

    async fn controller(export_dir: &std::path::Path) -> (Controller, Arc<BroadcastTransport>) {
        let dir = Arc::new(Directory::new(
            Arc::new(MemoryKv::new()),
            "channel",
            export_dir,
        ));
        let cx = OpContext::background();
        dir.save(&cx, &ChannelRecord::new("0", "Channel One", "http://example.test/1"))
            .await
            .unwrap();
        dir.save(&cx, &ChannelRecord::new("1", "Channel Two", "http://example.test/2"))
            .await
            .unwrap();
        let transport = Arc::new(BroadcastTransport::new());
        let config = BusConfig {
            settle_ms: 5,
            restart_wait_ms: 5,
            ..BusConfig::default()
        };
        let bus = Arc::new(CommandBus::new(dir, transport.clone(), &config));
        (Controller::new(bus), transport)
    }

    #[test]
    fn command_json_shape() {
        let cmd: RemoteCommand = serde_json::from_str(r#"{"command":"tv","channel":3}"#).unwrap();
        assert_eq!(cmd, RemoteCommand::Tv { channel: 3 });
        let cmd: RemoteCommand =
            serde_json::from_str(r#"{"command":"yt","url":"https://v.test/x"}"#).unwrap();
        assert_eq!(
            cmd,
            RemoteCommand::Yt {
                url: "https://v.test/x".into(),
                title: None
            }
        );
        assert!(serde_json::from_str::<RemoteCommand>(r#"{"command":"volume"}"#).is_err());
    }

    #[tokio::test]
    async fn tv_plays_and_registers_current() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (ctl, _t) = controller(tmp.path()).await;
        let cx = OpContext::background();
        let reply = ctl
            .handle(&cx, RemoteCommand::Tv { channel: 1 })
            .await
            .unwrap();
        assert_eq!(reply.content, "TV channel set to 1 - Channel Two");
        assert_eq!(ctl.directory().get_current(&cx).await.unwrap().id, "1");
    }

    #[tokio::test]
    async fn tv_unknown_channel_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (ctl, _t) = controller(tmp.path()).await;
        let err = ctl
            .handle(&OpContext::background(), RemoteCommand::Tv { channel: 42 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn random_registers_drawn_channel() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (ctl, _t) = controller(tmp.path()).await;
        let cx = OpContext::background();
        let reply = ctl.handle(&cx, RemoteCommand::Random).await.unwrap();
        let drawn = reply.channel.unwrap();
        assert!(reply.content.starts_with("Random channel set to "));
        assert_eq!(ctl.directory().get_current(&cx).await.unwrap(), drawn);
    }

    #[tokio::test]
    async fn stop_and_yt_replies() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (ctl, transport) = controller(tmp.path()).await;
        let mut rx = transport.subscribe();
        let cx = OpContext::background();

        let reply = ctl.handle(&cx, RemoteCommand::Stop).await.unwrap();
        assert_eq!(reply.content, "TV stopped");

        let reply = ctl
            .handle(
                &cx,
                RemoteCommand::Yt {
                    url: "https://v.test/x".into(),
                    title: Some("Launch".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(reply.content, "Playing video: Launch");

        let payloads: Vec<BusMessage> = vec![
            BusMessage::decode(&rx.recv().await.unwrap().payload).unwrap(),
            BusMessage::decode(&rx.recv().await.unwrap().payload).unwrap(),
        ];
        assert_eq!(payloads[0], BusMessage::Stop);
        assert_eq!(
            payloads[1],
            BusMessage::Play {
                title: "Launch".into(),
                url: "https://v.test/x".into()
            }
        );
    }

    #[tokio::test]
    async fn restart_reports_current_channel() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (ctl, _t) = controller(tmp.path()).await;
        let cx = OpContext::background();
        ctl.handle(&cx, RemoteCommand::Tv { channel: 0 })
            .await
            .unwrap();
        let reply = ctl.handle(&cx, RemoteCommand::Restart).await.unwrap();
        assert_eq!(reply.content, "Player restarted on 0 - Channel One");
    }

    #[tokio::test]
    async fn search_replies() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (ctl, _t) = controller(tmp.path()).await;
        let cx = OpContext::background();
        let reply = ctl
            .handle(&cx, RemoteCommand::Search { query: "two".into() })
            .await
            .unwrap();
        assert_eq!(reply.content, "Channels found:\n1 - Channel Two\n");
        let reply = ctl
            .handle(&cx, RemoteCommand::Search { query: "nothing".into() })
            .await
            .unwrap();
        assert_eq!(reply.content, "No channels found");
    }

    #[tokio::test]
    async fn catalog_reply_names_export_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (ctl, _t) = controller(tmp.path()).await;
        let reply = ctl
            .handle(&OpContext::background(), RemoteCommand::Catalog)
            .await
            .unwrap();
        let path = reply.path.unwrap();
        assert_eq!(path, tmp.path().join("channel-catalog.csv"));
        assert!(reply.content.starts_with("Catalog exported to "));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn channel_range_follows_count() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (ctl, _t) = controller(tmp.path()).await;
        let cx = OpContext::background();
        assert_eq!(ctl.channel_range(&cx).await.unwrap(), Some(0..=1));
        let listing = ctl.describe(&cx).await.unwrap();
        assert_eq!(listing[0].description, "Set the TV channel (0-1)");

        ctl.directory().delete_all(&cx).await.unwrap();
        assert_eq!(ctl.channel_range(&cx).await.unwrap(), None);
    }

    #[test]
    fn long_search_is_truncated_to_limit() {
        let channels: Vec<ChannelRecord> = (0..300)
            .map(|i| ChannelRecord::new(i.to_string(), format!("Channel número {}", i), "u"))
            .collect();
        let text = render_search(&channels);
        assert_eq!(text.chars().count(), MAX_REPLY_CHARS);
        assert!(text.ends_with(TRUNCATED_SUFFIX));
    }

    #[test]
    fn short_search_is_untouched() {
        let text = render_search(&[ChannelRecord::new("0", "A", "u")]);
        assert_eq!(text, "Channels found:\n0 - A\n");
    }
}
