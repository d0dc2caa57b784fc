use std::sync::Arc;

use brokerdesk_core::{
    classify, resolve, Identity, IntegrationError, Principal, QueryClassification,
};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::extractor::{extract, Extraction};
use crate::guardrails::{RequestFilter, ScopeDecision};
use crate::llm::{ContentBlock, Exchange, LlmClient, Message, ModelReply, ProviderError};
use crate::prompt::system_prompt;
use crate::tools::{ToolCatalog, ToolExecutor, ToolInvocationRequest, ToolInvocationResult};

pub const EMPTY_REPLY_MESSAGE: &str = "No pude procesar tu consulta. Por favor, intenta de nuevo.";
pub const TOOL_ROUND_WITHOUT_TEXT_MESSAGE: &str = "No pude procesar la respuesta";
pub const NO_INFORMATION_MESSAGE: &str = "No tengo información disponible";
pub const NOT_CONFIGURED_MESSAGE: &str =
    "La API de IA no está configurada. Por favor, configura BROKERDESK_LLM_API_KEY.";

/// One executed tool call: the request as scoped, the filter's decision, and
/// the gateway's result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolInvocationRecord {
    pub request: ToolInvocationRequest,
    pub decision: ScopeDecision,
    pub result: ToolInvocationResult,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentAnswer {
    pub text: String,
    pub classification: QueryClassification,
    pub tool_invocations: Vec<ToolInvocationRecord>,
    pub correlation_id: String,
    /// Set when `text` is a fallback message rather than a model answer.
    pub degraded: Option<IntegrationError>,
}

impl AgentAnswer {
    /// Payload of the first successful tool call, if any.
    pub fn primary_payload(&self) -> Option<&Value> {
        self.tool_invocations
            .iter()
            .filter(|record| record.result.success)
            .find_map(|record| record.result.payload.as_ref())
    }

    pub fn extraction(&self) -> Extraction {
        extract(&self.text, self.classification, self.primary_payload())
    }
}

/// Two-round model orchestration: ask, run the requested tools under
/// ownership scoping, hand the results back, take the final text.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    tools: Arc<dyn ToolExecutor>,
    filter: RequestFilter,
    catalog: ToolCatalog,
    location_id: String,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<dyn ToolExecutor>,
        location_id: impl Into<String>,
    ) -> Self {
        let catalog = ToolCatalog;
        Self {
            llm,
            tools,
            filter: RequestFilter::new(catalog),
            catalog,
            location_id: location_id.into(),
        }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn filter(&self) -> &RequestFilter {
        &self.filter
    }

    pub fn tools(&self) -> &Arc<dyn ToolExecutor> {
        &self.tools
    }

    pub async fn answer(&self, query: &str, principal: &Principal) -> AgentAnswer {
        self.answer_with_correlation(query, principal, Uuid::new_v4().to_string()).await
    }

    pub async fn answer_with_correlation(
        &self,
        query: &str,
        principal: &Principal,
        correlation_id: String,
    ) -> AgentAnswer {
        let classification = classify(query);
        let identity = resolve(principal);

        info!(
            event_name = "agent.query.received",
            correlation_id = %correlation_id,
            role = %identity.role,
            classification = %classification,
            "query received"
        );

        let mut answer = AgentAnswer {
            text: String::new(),
            classification,
            tool_invocations: Vec::new(),
            correlation_id,
            degraded: None,
        };

        let mut exchange = Exchange {
            system: system_prompt(principal, &self.location_id, &self.catalog),
            messages: vec![Message::user_text(query)],
            tools: self.catalog.specs(),
        };

        let first = match self.llm.complete(&exchange).await {
            Ok(reply) => reply,
            Err(error) => return provider_failure(answer, error),
        };

        if first.content.is_empty() {
            return degrade(answer, EMPTY_REPLY_MESSAGE, IntegrationError::EmptyResponse);
        }

        let requests = first
            .tool_uses()
            .map(|(id, name, input)| ToolInvocationRequest::new(id, name, input.clone()))
            .collect::<Vec<_>>();

        if requests.is_empty() {
            return match reply_text(&first) {
                Some(text) => answered(answer, text),
                None => degrade(answer, NO_INFORMATION_MESSAGE, IntegrationError::EmptyResponse),
            };
        }

        answer.tool_invocations = self.execute(requests, &identity, &answer.correlation_id).await;

        let results = answer
            .tool_invocations
            .iter()
            .map(|record| ContentBlock::ToolResult {
                tool_use_id: record.request.id.clone(),
                content: record.result.model_content(),
                is_error: !record.result.success,
            })
            .collect();
        exchange.messages.push(Message::assistant_echo(&first.content));
        exchange.messages.push(Message::user_blocks(results));

        let second = match self.llm.complete(&exchange).await {
            Ok(reply) => reply,
            Err(error) => return provider_failure(answer, error),
        };

        match reply_text(&second) {
            Some(text) => answered(answer, text),
            None => {
                degrade(answer, TOOL_ROUND_WITHOUT_TEXT_MESSAGE, IntegrationError::EmptyResponse)
            }
        }
    }

    /// Scopes every request, then dispatches them together. Results come back
    /// in request order.
    async fn execute(
        &self,
        requests: Vec<ToolInvocationRequest>,
        identity: &Identity,
        correlation_id: &str,
    ) -> Vec<ToolInvocationRecord> {
        let calls = requests.into_iter().map(|request| {
            let (request, decision) = self.filter.scope(request, identity);
            async move {
                let result = self.tools.invoke(&request.tool_name, &request.parameters).await;
                info!(
                    event_name = "agent.tool.invoked",
                    correlation_id = %correlation_id,
                    tool_name = %request.tool_name,
                    scope = ?decision,
                    success = result.success,
                    "tool invocation finished"
                );
                ToolInvocationRecord { request, decision, result }
            }
        });

        join_all(calls).await
    }
}

fn reply_text(reply: &ModelReply) -> Option<String> {
    reply.first_text().filter(|text| !text.trim().is_empty()).map(str::to_string)
}

fn answered(mut answer: AgentAnswer, text: String) -> AgentAnswer {
    info!(
        event_name = "agent.query.completed",
        correlation_id = %answer.correlation_id,
        classification = %answer.classification,
        tool_calls = answer.tool_invocations.len(),
        "query answered"
    );
    answer.text = text;
    answer
}

fn degrade(mut answer: AgentAnswer, message: &str, cause: IntegrationError) -> AgentAnswer {
    warn!(
        event_name = "agent.query.degraded",
        correlation_id = %answer.correlation_id,
        classification = %answer.classification,
        error = %cause,
        "query answered with fallback message"
    );
    answer.text = message.to_string();
    answer.degraded = Some(cause);
    answer
}

fn provider_failure(answer: AgentAnswer, error: ProviderError) -> AgentAnswer {
    let message = match &error {
        ProviderError::NotConfigured => NOT_CONFIGURED_MESSAGE.to_string(),
        other => format!("Hubo un error al procesar tu consulta: {other}"),
    };
    degrade(answer, &message, error.into())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use brokerdesk_core::{IntegrationError, Principal, PrincipalId, QueryClassification, Role};
    use serde_json::{json, Map, Value};

    use super::{
        AgentRuntime, EMPTY_REPLY_MESSAGE, NOT_CONFIGURED_MESSAGE, NO_INFORMATION_MESSAGE,
        TOOL_ROUND_WITHOUT_TEXT_MESSAGE,
    };
    use crate::guardrails::ScopeDecision;
    use crate::llm::{
        ContentBlock, Exchange, LlmClient, MessageContent, ModelReply, ProviderError,
    };
    use crate::tools::{ToolExecutor, ToolInvocationResult};

    #[derive(Default)]
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<ModelReply, ProviderError>>>,
        exchanges: Mutex<Vec<Exchange>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<ModelReply, ProviderError>>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), exchanges: Mutex::default() })
        }

        fn exchanges(&self) -> Vec<Exchange> {
            self.exchanges.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, exchange: &Exchange) -> Result<ModelReply, ProviderError> {
            self.exchanges.lock().expect("lock").push(exchange.clone());
            self.replies.lock().expect("lock").pop_front().unwrap_or(Ok(ModelReply::default()))
        }
    }

    struct RecordingExecutor {
        calls: Mutex<Vec<(String, Map<String, Value>)>>,
        result: ToolInvocationResult,
    }

    impl RecordingExecutor {
        fn returning(result: ToolInvocationResult) -> Arc<Self> {
            Arc::new(Self { calls: Mutex::default(), result })
        }

        fn calls(&self) -> Vec<(String, Map<String, Value>)> {
            self.calls.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl ToolExecutor for RecordingExecutor {
        async fn invoke(
            &self,
            tool_name: &str,
            parameters: &Map<String, Value>,
        ) -> ToolInvocationResult {
            self.calls.lock().expect("lock").push((tool_name.to_string(), parameters.clone()));
            self.result.clone()
        }
    }

    fn principal(role: Role, owner: Option<&str>) -> Principal {
        Principal {
            id: PrincipalId("p-1".to_string()),
            display_name: "Mariana Molina".to_string(),
            role,
            external_owner_id: owner.map(str::to_string),
        }
    }

    fn text_reply(text: &str) -> ModelReply {
        ModelReply {
            content: vec![ContentBlock::Text { text: text.to_string() }],
            stop_reason: Some("end_turn".to_string()),
        }
    }

    fn tool_reply(calls: &[(&str, &str, Value)]) -> ModelReply {
        let mut content = vec![ContentBlock::Text { text: "Consultando el CRM.".to_string() }];
        content.extend(calls.iter().map(|(id, name, input)| ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input: input.clone(),
        }));
        ModelReply { content, stop_reason: Some("tool_use".to_string()) }
    }

    fn runtime(llm: Arc<ScriptedLlm>, executor: Arc<RecordingExecutor>) -> AgentRuntime {
        AgentRuntime::new(llm, executor, "loc-1")
    }

    fn contacts_payload() -> ToolInvocationResult {
        ToolInvocationResult::ok(json!({ "contacts": [{ "id": "c1" }, { "id": "c2" }] }))
    }

    #[tokio::test]
    async fn overloaded_provider_returns_fallback_without_crm_calls() {
        let llm = ScriptedLlm::new(vec![Err(ProviderError::Status {
            status: 529,
            body: "overloaded".to_string(),
        })]);
        let executor = RecordingExecutor::returning(contacts_payload());

        let answer = runtime(llm.clone(), executor.clone())
            .answer("muéstrame mis contactos", &principal(Role::Broker, Some("U1")))
            .await;

        assert_eq!(answer.text, "Hubo un error al procesar tu consulta: API Error: 529 - overloaded");
        assert_eq!(answer.classification, QueryClassification::Leads);
        assert_eq!(
            answer.degraded,
            Some(IntegrationError::Provider { status: 529, body: "overloaded".to_string() })
        );
        assert!(executor.calls().is_empty());
        assert_eq!(llm.exchanges().len(), 1);
    }

    #[tokio::test]
    async fn follow_up_carries_one_tool_result_per_invocation() {
        let llm = ScriptedLlm::new(vec![
            Ok(tool_reply(&[
                ("toolu_1", "contacts_get-contacts", json!({})),
                ("toolu_2", "opportunities_get-pipelines", json!({ "locationId": "loc-1" })),
            ])),
            Ok(text_reply("Tienes 2 contactos.")),
        ]);
        let executor = RecordingExecutor::returning(contacts_payload());

        let answer = runtime(llm.clone(), executor.clone())
            .answer("muéstrame mis contactos", &principal(Role::Admin, None))
            .await;

        assert_eq!(answer.text, "Tienes 2 contactos.");
        assert!(answer.degraded.is_none());
        assert_eq!(executor.calls().len(), 2);

        let exchanges = llm.exchanges();
        assert_eq!(exchanges.len(), 2, "exactly one follow-up exchange");
        let follow_up = &exchanges[1];
        assert_eq!(follow_up.messages.len(), 3);

        let MessageContent::Blocks(blocks) = &follow_up.messages[2].content else {
            panic!("tool results are sent as blocks");
        };
        let ids = blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["toolu_1", "toolu_2"]);
    }

    #[tokio::test]
    async fn broker_tool_calls_are_scoped_before_execution() {
        let llm = ScriptedLlm::new(vec![
            Ok(tool_reply(&[("toolu_1", "contacts_get-contacts", json!({}))])),
            Ok(text_reply("Tienes 2 contactos.")),
        ]);
        let executor = RecordingExecutor::returning(contacts_payload());

        let answer = runtime(llm, executor.clone())
            .answer("muéstrame mis contactos", &principal(Role::Broker, Some("U1")))
            .await;

        let calls = executor.calls();
        assert_eq!(calls[0].0, "contacts_get-contacts");
        assert_eq!(Value::Object(calls[0].1.clone()), json!({ "assignedTo": "U1" }));
        assert_eq!(
            answer.tool_invocations[0].decision,
            ScopeDecision::Inject { owner_id: "U1".to_string() }
        );

        let extraction = answer.extraction();
        assert_eq!(extraction.structured_data.map(|data| data.items.len()), Some(2));
    }

    #[tokio::test]
    async fn admin_tool_calls_are_executed_unchanged() {
        let llm = ScriptedLlm::new(vec![
            Ok(tool_reply(&[("toolu_1", "contacts_get-contacts", json!({}))])),
            Ok(text_reply("El equipo tiene 2 contactos.")),
        ]);
        let executor = RecordingExecutor::returning(contacts_payload());

        runtime(llm, executor.clone())
            .answer("muéstrame mis contactos", &principal(Role::Admin, None))
            .await;

        assert!(executor.calls()[0].1.is_empty());
    }

    #[tokio::test]
    async fn failed_tool_result_is_reported_to_the_model_as_error() {
        let llm = ScriptedLlm::new(vec![
            Ok(tool_reply(&[("toolu_1", "foo_bar", json!({}))])),
            Ok(text_reply("No encontré esa herramienta.")),
        ]);
        let executor = RecordingExecutor::returning(ToolInvocationResult::unknown_tool());

        let answer = runtime(llm.clone(), executor)
            .answer("hola", &principal(Role::Broker, Some("U1")))
            .await;

        assert_eq!(answer.text, "No encontré esa herramienta.");
        assert!(answer.primary_payload().is_none());

        let MessageContent::Blocks(blocks) = &llm.exchanges()[1].messages[2].content else {
            panic!("tool results are sent as blocks");
        };
        assert_eq!(
            blocks[0],
            ContentBlock::ToolResult {
                tool_use_id: "toolu_1".to_string(),
                content: json!({ "error": "unknown tool" }).to_string(),
                is_error: true,
            }
        );
    }

    #[tokio::test]
    async fn direct_answer_skips_tool_execution() {
        let llm = ScriptedLlm::new(vec![Ok(text_reply("¡Hola! ¿En qué te ayudo?"))]);
        let executor = RecordingExecutor::returning(contacts_payload());

        let answer = runtime(llm.clone(), executor.clone())
            .answer("hola", &principal(Role::Broker, Some("U1")))
            .await;

        assert_eq!(answer.text, "¡Hola! ¿En qué te ayudo?");
        assert_eq!(answer.classification, QueryClassification::General);
        assert!(executor.calls().is_empty());
        assert_eq!(llm.exchanges().len(), 1);
    }

    #[tokio::test]
    async fn empty_replies_map_to_fixed_messages() {
        let empty = runtime(
            ScriptedLlm::new(vec![Ok(ModelReply::default())]),
            RecordingExecutor::returning(contacts_payload()),
        )
        .answer("hola", &principal(Role::Admin, None))
        .await;
        assert_eq!(empty.text, EMPTY_REPLY_MESSAGE);
        assert_eq!(empty.degraded, Some(IntegrationError::EmptyResponse));

        let no_text = runtime(
            ScriptedLlm::new(vec![Ok(ModelReply {
                content: vec![ContentBlock::Unsupported],
                stop_reason: None,
            })]),
            RecordingExecutor::returning(contacts_payload()),
        )
        .answer("hola", &principal(Role::Admin, None))
        .await;
        assert_eq!(no_text.text, NO_INFORMATION_MESSAGE);

        let tool_round = runtime(
            ScriptedLlm::new(vec![
                Ok(tool_reply(&[("toolu_1", "contacts_get-contacts", json!({}))])),
                Ok(ModelReply::default()),
            ]),
            RecordingExecutor::returning(contacts_payload()),
        )
        .answer("mis leads", &principal(Role::Admin, None))
        .await;
        assert_eq!(tool_round.text, TOOL_ROUND_WITHOUT_TEXT_MESSAGE);
        assert_eq!(tool_round.tool_invocations.len(), 1);
    }

    #[tokio::test]
    async fn missing_credentials_produce_configuration_message() {
        let answer = runtime(
            ScriptedLlm::new(vec![Err(ProviderError::NotConfigured)]),
            RecordingExecutor::returning(contacts_payload()),
        )
        .answer("ventas del mes", &principal(Role::Admin, None))
        .await;

        assert_eq!(answer.text, NOT_CONFIGURED_MESSAGE);
        assert_eq!(answer.classification, QueryClassification::Ventas);
        assert!(matches!(answer.degraded, Some(IntegrationError::Configuration(_))));
    }
}
