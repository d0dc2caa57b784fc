use axum::{extract::State, routing::post, Json, Router};
use brokerdesk_agent::{AgentAnswer, StructuredData};
use brokerdesk_core::{InterfaceError, Principal, QueryClassification, UserProfile};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::bootstrap::AppState;
use crate::errors::{api_error, ApiError};

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub principal: UserProfile,
    pub query: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolCallSummary {
    pub id: String,
    pub name: String,
    pub input: Map<String, Value>,
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub query_type: QueryClassification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<StructuredData>,
    pub tool_calls: Vec<ToolCallSummary>,
    pub correlation_id: String,
    /// Category message for a degraded answer; `response` still holds the
    /// text shown in the chat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_notice: Option<&'static str>,
}

impl From<AgentAnswer> for ChatResponse {
    fn from(answer: AgentAnswer) -> Self {
        let extraction = answer.extraction();
        let error_notice = answer
            .degraded
            .clone()
            .map(|error| error.into_interface(answer.correlation_id.as_str()).user_message());
        let tool_calls = answer
            .tool_invocations
            .into_iter()
            .map(|record| ToolCallSummary {
                id: record.request.id,
                name: record.request.tool_name,
                input: record.request.parameters,
                success: record.result.success,
            })
            .collect();

        Self {
            response: extraction.clean_text,
            query_type: answer.classification,
            structured_data: extraction.structured_data,
            tool_calls,
            correlation_id: answer.correlation_id,
            error_notice,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/chat", post(chat))
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let query = request.query.trim();
    if query.is_empty() {
        let error = InterfaceError::bad_request("query must not be empty", correlation_id);
        return Err(api_error(&error));
    }

    let principal = Principal::from(request.principal);
    let answer = state.runtime.answer_with_correlation(query, &principal, correlation_id).await;
    Ok(Json(ChatResponse::from(answer)))
}
