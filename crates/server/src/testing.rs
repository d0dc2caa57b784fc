use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use brokerdesk_agent::llm::{ContentBlock, Exchange, LlmClient, ModelReply, ProviderError};
use brokerdesk_agent::{AgentRuntime, ToolExecutor, ToolInvocationResult};
use brokerdesk_core::config::AppConfig;
use serde_json::{Map, Value};

use crate::bootstrap::AppState;

#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<ModelReply, ProviderError>>>,
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _exchange: &Exchange) -> Result<ModelReply, ProviderError> {
        self.replies.lock().expect("lock").pop_front().unwrap_or(Ok(ModelReply::default()))
    }
}

/// Answers every tool call with the same result and records what it was asked.
pub struct StaticExecutor {
    result: ToolInvocationResult,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl StaticExecutor {
    pub fn ok(payload: Value) -> Arc<Self> {
        Self::returning(ToolInvocationResult::ok(payload))
    }

    pub fn returning(result: ToolInvocationResult) -> Arc<Self> {
        Arc::new(Self { result, calls: Mutex::default() })
    }

    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ToolExecutor for StaticExecutor {
    async fn invoke(&self, tool_name: &str, parameters: &Map<String, Value>) -> ToolInvocationResult {
        self.calls.lock().expect("lock").push((tool_name.to_string(), parameters.clone()));
        self.result.clone()
    }
}

pub fn state_with(
    replies: Vec<Result<ModelReply, ProviderError>>,
    executor: Arc<StaticExecutor>,
) -> AppState {
    let mut config = AppConfig::default();
    config.crm.location_id = "loc-test".to_string();
    config.llm.api_key = Some("sk-test".to_string().into());

    let llm = Arc::new(ScriptedLlm { replies: Mutex::new(replies.into()) });
    let runtime = AgentRuntime::new(llm, executor, config.crm.location_id.clone());
    AppState { config: Arc::new(config), runtime: Arc::new(runtime) }
}

pub fn text_reply(text: &str) -> ModelReply {
    ModelReply { content: vec![ContentBlock::Text { text: text.to_string() }], stop_reason: None }
}

pub fn tool_reply(tool_name: &str, input: Value) -> ModelReply {
    ModelReply {
        content: vec![ContentBlock::ToolUse {
            id: "toolu_1".to_string(),
            name: tool_name.to_string(),
            input,
        }],
        stop_reason: Some("tool_use".to_string()),
    }
}
