use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use leadline_agent::ConversationEngine;

/// Shown instead of a raw error when the model path fails mid-turn. The
/// user's message has already been received and their session retained, so
/// the reply reassures rather than alarms.
pub const RECEIPT_FALLBACK: &str = "✅ Lead Logged! I've received your request and added it to our dashboard. Our team will contact you shortly.\n\n(Note: My AI is currently restarting, but your data is safe!)";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateEnvelope {
    pub update_id: i64,
    pub event: TelegramEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TelegramEvent {
    Message(MessageEvent),
    Unsupported { event_type: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub chat_id: i64,
    pub user_id: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(OutboundMessage),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("message handler failure: {0}")]
    Message(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait MessageService: Send + Sync {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutboundMessage>, EventHandlerError>;
}

/// Routes update envelopes to the registered message handler. Non-message
/// updates are ignored rather than rejected.
pub struct UpdateDispatcher {
    message_service: Arc<dyn MessageService>,
}

impl Default for UpdateDispatcher {
    fn default() -> Self {
        Self { message_service: Arc::new(NoopMessageService) }
    }
}

impl UpdateDispatcher {
    pub fn new(message_service: Arc<dyn MessageService>) -> Self {
        Self { message_service }
    }

    pub async fn dispatch(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let TelegramEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let reply = self.message_service.handle_message(event, ctx).await?;
        Ok(match reply {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

#[derive(Default)]
pub struct NoopMessageService;

#[async_trait]
impl MessageService for NoopMessageService {
    async fn handle_message(
        &self,
        _event: &MessageEvent,
        _ctx: &EventContext,
    ) -> Result<Option<OutboundMessage>, EventHandlerError> {
        Ok(None)
    }
}

/// Bridges incoming chat messages into the conversation engine. Engine
/// failures never surface to the user; they get the receipt fallback and
/// the error goes to the operator log.
pub struct EngineMessageService {
    engine: Arc<ConversationEngine>,
}

impl EngineMessageService {
    pub fn new(engine: Arc<ConversationEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl MessageService for EngineMessageService {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutboundMessage>, EventHandlerError> {
        let text = match self.engine.handle_message(&event.user_id, &event.text).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    event_name = "ingress.telegram.turn_failed",
                    user_id = %event.user_id,
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "conversation turn failed; sending receipt fallback"
                );
                RECEIPT_FALLBACK.to_owned()
            }
        };

        Ok(Some(OutboundMessage { chat_id: event.chat_id, text }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use leadline_agent::{ConversationEngine, StoreSink};
    use leadline_db::SqlLeadStore;
    use leadline_tracker::NoopTracker;

    use super::{
        EngineMessageService, EventContext, HandlerResult, MessageEvent, TelegramEvent,
        UpdateDispatcher, UpdateEnvelope, RECEIPT_FALLBACK,
    };

    fn message_envelope(text: &str) -> UpdateEnvelope {
        UpdateEnvelope {
            update_id: 1,
            event: TelegramEvent::Message(MessageEvent {
                chat_id: 42,
                user_id: "user-1".to_owned(),
                text: text.to_owned(),
            }),
        }
    }

    async fn engine_without_model() -> Arc<ConversationEngine> {
        let pool =
            leadline_db::connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        leadline_db::migrations::run_pending(&pool).await.expect("migrate");
        Arc::new(ConversationEngine::new(
            None,
            Arc::new(StoreSink::new(Arc::new(SqlLeadStore::new(pool)))),
            Arc::new(NoopTracker),
            Duration::from_secs(3600),
            false,
        ))
    }

    #[tokio::test]
    async fn dispatcher_ignores_non_message_updates() {
        let dispatcher = UpdateDispatcher::default();
        let envelope = UpdateEnvelope {
            update_id: 2,
            event: TelegramEvent::Unsupported { event_type: "edited_message".to_owned() },
        };

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn noop_service_processes_messages_without_replying() {
        let dispatcher = UpdateDispatcher::default();
        let result = dispatcher
            .dispatch(&message_envelope("Hi"), &EventContext::default())
            .await
            .expect("dispatch");
        assert_eq!(result, HandlerResult::Processed);
    }

    #[tokio::test]
    async fn engine_failure_becomes_receipt_fallback() {
        let dispatcher =
            UpdateDispatcher::new(Arc::new(EngineMessageService::new(engine_without_model().await)));

        let result = dispatcher
            .dispatch(&message_envelope("Hi"), &EventContext::default())
            .await
            .expect("dispatch");

        let HandlerResult::Responded(message) = result else {
            panic!("expected a reply");
        };
        assert_eq!(message.chat_id, 42);
        assert_eq!(message.text, RECEIPT_FALLBACK);
    }
}
