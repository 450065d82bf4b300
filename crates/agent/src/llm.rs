use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use leadline_core::config::{LlmConfig, LlmProvider};
use leadline_core::lead::LeadDraft;

pub const CREATE_LEAD_TOOL: &str = "create_lead_task";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// What the model did with the conversation so far: either it keeps
/// talking, or it signals that all required lead fields are known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelOutput {
    Reply(String),
    CreateLead(LeadDraft),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Http(String),
    #[error("model response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<ModelOutput, ModelError>;
}

/// Chat-completions client for OpenAI-compatible providers. The lead tool
/// is always attached; the provider decides when to call it.
pub struct OpenAiChatModel {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    provider: LlmProvider,
}

impl OpenAiChatModel {
    /// `Ok(None)` when the provider is disabled or no API key is present;
    /// the engine then runs without a model and every turn fails closed.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>, reqwest::Error> {
        if config.provider == LlmProvider::Disabled {
            return Ok(None);
        }
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Some(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            provider: config.provider,
        }))
    }

    fn tool_schema() -> serde_json::Value {
        json!({
            "type": "function",
            "function": {
                "name": CREATE_LEAD_TOOL,
                "description": "Creates a lead once name, phone, and intent are all known.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "The user's name"},
                        "phone": {"type": "string", "description": "Contact phone number"},
                        "intent": {"type": "string", "description": "Buy, Rent, Sell, or a short requirement summary"},
                        "details": {"type": "string", "description": "The user's requirement in their own words"},
                    },
                    "required": ["name", "phone", "intent", "details"],
                },
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: ToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct ToolCallFunction {
    name: String,
    arguments: String,
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<ModelOutput, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": turns,
            "tools": [Self::tool_schema()],
        });

        let mut request = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body);
        if self.provider == LlmProvider::OpenRouter {
            request = request
                .header("HTTP-Referer", "http://localhost:8080")
                .header("X-Title", "Leadline");
        }

        let response = request.send().await.map_err(|error| ModelError::Http(error.to_string()))?;
        if !response.status().is_success() {
            return Err(ModelError::Http(format!("provider returned {}", response.status())));
        }

        let completion: CompletionResponse =
            response.json().await.map_err(|error| ModelError::Decode(error.to_string()))?;
        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ModelError::Decode("completion carried no choices".to_string()))?;

        if let Some(call) = message.tool_calls.into_iter().next() {
            if call.function.name != CREATE_LEAD_TOOL {
                return Err(ModelError::Decode(format!(
                    "unknown tool call `{}`",
                    call.function.name
                )));
            }
            let draft: LeadDraft = serde_json::from_str(&call.function.arguments)
                .map_err(|error| ModelError::Decode(format!("bad tool arguments: {error}")))?;
            return Ok(ModelOutput::CreateLead(draft));
        }

        Ok(ModelOutput::Reply(message.content.unwrap_or_default()))
    }
}
