use std::sync::Arc;

use brokerdesk_agent::{AgentAnswer, AgentRuntime, AnthropicClient};
use brokerdesk_core::config::{AppConfig, LoadOptions};
use brokerdesk_core::{Principal, PrincipalId, Role};
use brokerdesk_crm::CrmGateway;
use serde_json::{json, Value};

use super::CommandResult;

#[derive(Debug, Clone)]
pub struct AskArgs {
    pub role: String,
    pub owner_id: Option<String>,
    pub name: String,
    pub query: String,
}

pub fn run(args: AskArgs) -> CommandResult {
    let role = match args.role.parse::<Role>() {
        Ok(role) => role,
        Err(error) => return CommandResult::failure("ask", "invalid_argument", error, 2),
    };
    let query = args.query.trim();
    if query.is_empty() {
        return CommandResult::failure("ask", "invalid_argument", "query must not be empty", 2);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("ask", "config_validation", error.to_string(), 2)
        }
    };

    let llm = match AnthropicClient::from_config(&config.llm) {
        Ok(llm) => llm,
        Err(error) => return CommandResult::failure("ask", "model_client", error.to_string(), 3),
    };
    let gateway = match CrmGateway::from_config(&config.crm) {
        Ok(gateway) => gateway,
        Err(error) => return CommandResult::failure("ask", "crm_gateway", error.to_string(), 3),
    };
    let runtime = AgentRuntime::new(Arc::new(llm), Arc::new(gateway), config.crm.location_id);

    let principal = Principal {
        id: PrincipalId("cli".to_string()),
        display_name: args.name,
        role,
        external_owner_id: args.owner_id,
    };

    let tokio_runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                4,
            )
        }
    };
    let answer = tokio_runtime.block_on(runtime.answer(query, &principal));

    let data = answer_payload(&answer);
    CommandResult::success_with_data("ask", answer.extraction().clean_text, Some(data))
}

fn answer_payload(answer: &AgentAnswer) -> Value {
    let extraction = answer.extraction();
    let tool_calls = answer
        .tool_invocations
        .iter()
        .map(|record| {
            json!({
                "name": record.request.tool_name,
                "input": record.request.parameters,
                "scope": record.decision,
                "success": record.result.success,
                "error": record.result.error_message,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "query_type": answer.classification,
        "structured_data": extraction.structured_data,
        "tool_calls": tool_calls,
        "correlation_id": answer.correlation_id,
        "degraded": answer.degraded.as_ref().map(ToString::to_string),
    })
}
