//! In-process transport on a tokio broadcast channel.
//!
//! Used by tests and by deployments where the player runs in the same
//! process. A send with no live receiver is dropped silently, like a
//! publish to a pub/sub channel nobody is subscribed to.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use super::Transport;
use crate::error::Result;

const CAPACITY: usize = 256;

/// One delivered message: the bus channel name and the encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub channel: String,
    pub payload: String,
}

pub struct BroadcastTransport {
    tx: broadcast::Sender<Published>,
}

impl BroadcastTransport {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        Self { tx }
    }

    /// Receive every message published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for BroadcastTransport {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        let delivered = self
            .tx
            .send(Published {
                channel: channel.to_string(),
                payload: payload.to_string(),
            })
            .unwrap_or(0);
        debug!(channel, delivered, "broadcast publish");
        Ok(())
    }
}
