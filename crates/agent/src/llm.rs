use async_trait::async_trait;
use brokerdesk_core::config::LlmConfig;
use brokerdesk_core::IntegrationError;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tools::ToolSpec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Block kinds this client does not interpret (thinking, etc.).
    #[serde(other)]
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: MessageContent::Text(text.into()) }
    }

    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self { role: MessageRole::User, content: MessageContent::Blocks(blocks) }
    }

    /// Echoes an assistant reply, dropping blocks that cannot be sent back.
    pub fn assistant_echo(blocks: &[ContentBlock]) -> Self {
        let blocks = blocks
            .iter()
            .filter(|block| !matches!(block, ContentBlock::Unsupported))
            .cloned()
            .collect();
        Self { role: MessageRole::Assistant, content: MessageContent::Blocks(blocks) }
    }
}

/// One outbound exchange, minus the model name and token budget which the
/// client fills in from its provider strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct Exchange {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub system: &'a str,
    pub messages: &'a [Message],
    #[serde(skip_serializing_if = "no_tools")]
    pub tools: &'a [ToolSpec],
}

fn no_tools(tools: &&[ToolSpec]) -> bool {
    tools.is_empty()
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ModelReply {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl ModelReply {
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => {
                Some((id.as_str(), name.as_str(), input))
            }
            _ => None,
        })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("API Error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider response could not be decoded: {0}")]
    Decode(String),
    #[error("no provider credentials are configured")]
    NotConfigured,
}

impl From<ProviderError> for IntegrationError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Status { status, body } => Self::Provider { status, body },
            ProviderError::Transport(message) => Self::Transport(message),
            ProviderError::Decode(message) => Self::Decode(message),
            ProviderError::NotConfigured => {
                Self::Configuration("no provider credentials are configured".to_string())
            }
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, exchange: &Exchange) -> Result<ModelReply, ProviderError>;
}

#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub api_key: SecretString,
    pub model: String,
}

/// Ordered credential/model pairs tried for a single round.
#[derive(Clone, Debug, Default)]
pub struct ProviderStrategy {
    attempts: Vec<ProviderAttempt>,
}

impl ProviderStrategy {
    pub fn new(attempts: Vec<ProviderAttempt>) -> Self {
        Self { attempts }
    }

    /// Primary key/model first, then the fallback pair when either half of it
    /// is configured (the missing half is taken from the primary).
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut attempts = Vec::new();
        if let Some(api_key) = &config.api_key {
            attempts.push(ProviderAttempt { api_key: api_key.clone(), model: config.model.clone() });
        }

        if config.fallback_api_key.is_some() || config.fallback_model.is_some() {
            let api_key = config.fallback_api_key.clone().or_else(|| config.api_key.clone());
            let model = config.fallback_model.clone().unwrap_or_else(|| config.model.clone());
            if let Some(api_key) = api_key {
                attempts.push(ProviderAttempt { api_key, model });
            }
        }

        Self { attempts }
    }

    pub fn attempts(&self) -> &[ProviderAttempt] {
        &self.attempts
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Only credential or model rejections move on to the next attempt;
    /// transient failures surface immediately.
    pub fn should_advance(status: u16) -> bool {
        matches!(status, 401 | 403 | 404)
    }
}
