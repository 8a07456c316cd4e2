//! In-process adapter for one-shot CLI runs and tests: messages are
//! injected programmatically and replies come back on a local queue.

use crate::traits::ChannelAdapter;
use crate::types::{InboundMessage, OutboundMessage, SenderId};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};

pub const LOOPBACK_CHANNEL_ID: &str = "loopback";

pub struct LoopbackAdapter {
    sender_id: SenderId,
    inbound_tx: Mutex<Option<mpsc::Sender<InboundMessage>>>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    next_message_id: AtomicU64,
}

impl LoopbackAdapter {
    pub fn new(
        sender_id: impl Into<SenderId>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let adapter = Arc::new(Self {
            sender_id: sender_id.into(),
            inbound_tx: Mutex::new(None),
            outbound_tx,
            next_message_id: AtomicU64::new(1),
        });
        (adapter, outbound_rx)
    }

    /// Push operator text into the pipeline as if it arrived on a chat
    /// transport. Fails if the adapter was never started.
    pub async fn inject(&self, text: &str) -> Result<()> {
        let guard = self.inbound_tx.lock().await;
        let tx = guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("loopback adapter has not been started"))?;
        let id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        tx.send(InboundMessage {
            message_id: format!("loopback:{id}").into(),
            channel_id: LOOPBACK_CHANNEL_ID.into(),
            sender_id: self.sender_id.clone(),
            content: text.to_string(),
            received_at: Utc::now(),
        })
        .await
        .map_err(|e| anyhow::anyhow!("loopback inbound queue closed: {e}"))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChannelAdapter for LoopbackAdapter {
    fn channel_id(&self) -> &str {
        LOOPBACK_CHANNEL_ID
    }

    async fn start(&self, tx: mpsc::Sender<InboundMessage>) -> Result<()> {
        *self.inbound_tx.lock().await = Some(tx);
        Ok(())
    }

    async fn send(&self, _recipient_id: &str, message: OutboundMessage) -> Result<()> {
        self.outbound_tx
            .send(message)
            .map_err(|e| anyhow::anyhow!("loopback outbound queue closed: {e}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn injected_messages_round_trip() {
        let (adapter, mut outbound_rx) = LoopbackAdapter::new("operator");
        let (tx, mut rx) = mpsc::channel(4);
        adapter.start(tx).await.unwrap();

        adapter.inject("/help").await.unwrap();
        let inbound = rx.recv().await.unwrap();
        assert_eq!(inbound.content, "/help");
        assert_eq!(inbound.sender_id.as_str(), "operator");
        assert_eq!(inbound.channel_id.as_str(), LOOPBACK_CHANNEL_ID);

        adapter
            .send("operator", OutboundMessage::text("hi"))
            .await
            .unwrap();
        assert_eq!(outbound_rx.recv().await.unwrap().content, "hi");
    }

    #[tokio::test]
    async fn inject_before_start_is_an_error() {
        let (adapter, _outbound_rx) = LoopbackAdapter::new("operator");
        assert!(adapter.inject("hello").await.is_err());
    }
}
