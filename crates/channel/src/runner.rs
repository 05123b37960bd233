use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{InboundMessage, MessageContext, MessageHandler, OutboundMessage};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// A messaging channel. `next_message` returning `Ok(None)` means the stream
/// ended cleanly.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_message(&self) -> Result<Option<InboundMessage>, TransportError>;
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Pumps inbound messages from a transport into a handler and sends the
/// replies back. Transport failures trigger a reconnect with exponential
/// backoff; handler and send failures are logged and the loop keeps going.
pub struct ChannelRunner {
    transport: Arc<dyn MessageTransport>,
    handler: Arc<dyn MessageHandler>,
    reconnect_policy: ReconnectPolicy,
}

impl ChannelRunner {
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        handler: Arc<dyn MessageHandler>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, handler, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        event_name = "channel.transport_failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "channel transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "channel retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening channel transport connection");
        self.transport.connect().await?;
        info!(attempt, "channel transport connected");

        loop {
            let Some(message) = self.transport.next_message().await? else {
                info!(attempt, "channel transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            info!(
                event_name = "ingress.message_received",
                message_id = %message.message_id,
                conversation_id = %message.conversation_id,
                correlation_id = %message.message_id,
                "received inbound message"
            );

            let context = MessageContext { correlation_id: message.message_id.clone() };
            let replies = match self.handler.handle(&message, &context).await {
                Ok(replies) => replies,
                Err(error) => {
                    warn!(
                        message_id = %message.message_id,
                        conversation_id = %message.conversation_id,
                        correlation_id = %message.message_id,
                        error = %error,
                        "message handling failed; continuing channel loop"
                    );
                    continue;
                }
            };

            for reply in &replies {
                if let Err(error) = self.transport.send(reply).await {
                    warn!(
                        event_name = "egress.message_failed",
                        conversation_id = %reply.conversation_id,
                        correlation_id = %message.message_id,
                        error = %error,
                        "failed to send reply"
                    );
                } else {
                    debug!(
                        event_name = "egress.message_sent",
                        conversation_id = %reply.conversation_id,
                        correlation_id = %message.message_id,
                        "reply sent"
                    );
                }
            }
        }
    }
}
