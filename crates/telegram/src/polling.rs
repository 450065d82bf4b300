use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{
    DispatchError, EventContext, HandlerResult, OutboundMessage, UpdateDispatcher, UpdateEnvelope,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport poll failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
}

#[derive(Debug, Error)]
pub enum PollingError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
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

/// Long-poll transport over the bot API. Offset bookkeeping (which update
/// is acknowledged) is the transport's own concern.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_update(&self) -> Result<Option<UpdateEnvelope>, TransportError>;
    async fn send_message(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopUpdateTransport;

#[async_trait]
impl UpdateTransport for NoopUpdateTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<UpdateEnvelope>, TransportError> {
        Ok(None)
    }

    async fn send_message(&self, _message: &OutboundMessage) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct PollingRunner {
    transport: Arc<dyn UpdateTransport>,
    dispatcher: UpdateDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl Default for PollingRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopUpdateTransport),
            dispatcher: UpdateDispatcher::default(),
            reconnect_policy: ReconnectPolicy::default(),
        }
    }
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn UpdateTransport>,
        dispatcher: UpdateDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_poll(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "polling transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "polling retries exhausted; continuing process without crash"
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

    async fn connect_and_poll(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening bot api polling connection");
        self.transport.connect().await?;
        info!(attempt, "bot api polling connected");

        loop {
            let Some(envelope) = self.transport.next_update().await? else {
                info!(attempt, "bot api update stream closed");
                return Ok(());
            };

            debug!(
                event_name = "ingress.telegram.update_received",
                update_id = envelope.update_id,
                correlation_id = envelope.update_id,
                "received bot api update"
            );

            let context = EventContext { correlation_id: format!("upd-{}", envelope.update_id) };
            match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Responded(message)) => {
                    if let Err(error) = self.transport.send_message(&message).await {
                        warn!(
                            event_name = "ingress.telegram.send_failed",
                            update_id = envelope.update_id,
                            chat_id = message.chat_id,
                            error = %error,
                            "failed to deliver reply; continuing poll loop"
                        );
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(
                        update_id = envelope.update_id,
                        correlation_id = %context.correlation_id,
                        error = %error,
                        "update dispatch failed; continuing poll loop"
                    );
                }
            }
        }
    }
}
