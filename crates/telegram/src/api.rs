//! HTTP transport over the Telegram Bot API.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use leadline_core::config::TelegramConfig;

use crate::events::{MessageEvent, OutboundMessage, TelegramEvent, UpdateEnvelope};
use crate::polling::{TransportError, UpdateTransport};

pub struct TelegramApiTransport {
    http: reqwest::Client,
    bot_token: SecretString,
    poll_timeout_secs: u64,
    offset: Mutex<Option<i64>>,
    pending: Mutex<VecDeque<UpdateEnvelope>>,
}

impl TelegramApiTransport {
    pub fn from_config(config: &TelegramConfig) -> Result<Self, reqwest::Error> {
        // The HTTP timeout must outlive the server-side long-poll window.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs.max(1) + 10))
            .build()?;

        Ok(Self {
            http,
            bot_token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
            offset: Mutex::new(None),
            pending: Mutex::new(VecDeque::new()),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token.expose_secret())
    }

    async fn poll_once(&self) -> Result<Vec<UpdateEnvelope>, TransportError> {
        let offset = *self.offset.lock().await;
        let mut query = vec![("timeout", self.poll_timeout_secs.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .http
            .get(self.method_url("getUpdates"))
            .query(&query)
            .send()
            .await
            .map_err(|error| TransportError::Receive(error.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Receive(format!(
                "getUpdates returned {}",
                response.status()
            )));
        }

        let body: ApiResponse<Vec<RawUpdate>> = response
            .json()
            .await
            .map_err(|error| TransportError::Receive(error.to_string()))?;
        if !body.ok {
            return Err(TransportError::Receive("getUpdates reported ok=false".to_string()));
        }

        let updates = body.result.unwrap_or_default();
        if let Some(max_id) = updates.iter().map(|update| update.update_id).max() {
            *self.offset.lock().await = Some(max_id + 1);
        }

        Ok(updates.into_iter().map(envelope_from_update).collect())
    }
}

#[async_trait]
impl UpdateTransport for TelegramApiTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let response = self
            .http
            .get(self.method_url("getMe"))
            .send()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Connect(format!("getMe returned {}", response.status())));
        }
        debug!(event_name = "ingress.telegram.connected");
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<UpdateEnvelope>, TransportError> {
        loop {
            if let Some(envelope) = self.pending.lock().await.pop_front() {
                return Ok(Some(envelope));
            }

            // An empty long-poll response is normal; poll again.
            let updates = self.poll_once().await?;
            self.pending.lock().await.extend(updates);
        }
    }

    async fn send_message(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&json!({"chat_id": message.chat_id, "text": message.text}))
            .send()
            .await
            .map_err(|error| TransportError::Send(error.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Send(format!(
                "sendMessage returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    chat: RawChat,
    #[serde(default)]
    from: Option<RawUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: i64,
}

fn envelope_from_update(update: RawUpdate) -> UpdateEnvelope {
    let event = match update.message {
        Some(message) => match message.text {
            Some(text) => TelegramEvent::Message(MessageEvent {
                chat_id: message.chat.id,
                user_id: message
                    .from
                    .map(|user| user.id.to_string())
                    .unwrap_or_else(|| message.chat.id.to_string()),
                text,
            }),
            None => TelegramEvent::Unsupported { event_type: "non_text_message".to_owned() },
        },
        None => TelegramEvent::Unsupported { event_type: "non_message_update".to_owned() },
    };

    UpdateEnvelope { update_id: update.update_id, event }
}
