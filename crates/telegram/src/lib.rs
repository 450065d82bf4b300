//! Telegram Integration - long-polling bot interface
//!
//! This crate provides the chat ingress for leadline:
//! - **Polling loop** (`polling`) - `getUpdates` long poll with reconnection logic
//! - **Events** (`events`) - Update envelopes routed to message handlers
//! - **Bot API** (`api`) - `getUpdates`/`sendMessage` HTTP transport
//!
//! # Getting Started
//!
//! 1. Create a bot with @BotFather and copy its token
//! 2. Set `LEADLINE_TELEGRAM_BOT_TOKEN`
//! 3. Run `leadline serve`
//!
//! # Key Types
//!
//! - `PollingRunner` - Update loop with reconnection logic
//! - `UpdateDispatcher` - Routes updates to the registered handler
//! - `EngineMessageService` - Bridges messages into the conversation engine

pub mod api;
pub mod events;
pub mod polling;

pub use api::TelegramApiTransport;
pub use events::{
    EngineMessageService, EventContext, MessageEvent, MessageService, OutboundMessage,
    TelegramEvent, UpdateDispatcher, UpdateEnvelope,
};
pub use polling::{PollingRunner, ReconnectPolicy, TransportError, UpdateTransport};
