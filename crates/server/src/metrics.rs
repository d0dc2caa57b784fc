use axum::{extract::State, routing::post, Json, Router};
use brokerdesk_agent::{AgentRuntime, ToolInvocationRequest, ToolInvocationResult};
use brokerdesk_core::{resolve, PipelineMetrics, Principal, UserProfile};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bootstrap::AppState;

#[derive(Clone, Debug, Deserialize)]
pub struct MetricsRequest {
    pub principal: UserProfile,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub metrics: PipelineMetrics,
    pub correlation_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/metrics", post(metrics))
}

pub async fn metrics(
    State(state): State<AppState>,
    Json(request): Json<MetricsRequest>,
) -> Json<MetricsResponse> {
    let correlation_id = Uuid::new_v4().to_string();
    let principal = Principal::from(request.principal);
    let metrics = collect(&state.runtime, &principal, &correlation_id).await;

    Json(MetricsResponse { metrics, correlation_id })
}

/// Dashboard cards for one principal. Both CRM reads pass the Request
/// Filter; a failed read counts as an empty list.
pub async fn collect(
    runtime: &AgentRuntime,
    principal: &Principal,
    correlation_id: &str,
) -> PipelineMetrics {
    let identity = resolve(principal);
    let (contacts, _) = runtime.filter().scope(
        ToolInvocationRequest::new("metrics-contacts", "contacts_get-contacts", json!({})),
        &identity,
    );
    let (opportunities, _) = runtime.filter().scope(
        ToolInvocationRequest::new(
            "metrics-opportunities",
            "opportunities_search-opportunity",
            json!({}),
        ),
        &identity,
    );

    let tools = runtime.tools();
    let (contacts_result, opportunities_result) = tokio::join!(
        tools.invoke(&contacts.tool_name, &contacts.parameters),
        tools.invoke(&opportunities.tool_name, &opportunities.parameters),
    );

    let metrics = PipelineMetrics::from_payloads(
        successful_payload(&contacts.tool_name, &contacts_result, correlation_id),
        successful_payload(&opportunities.tool_name, &opportunities_result, correlation_id),
    );

    info!(
        event_name = "metrics.collected",
        correlation_id = %correlation_id,
        role = %identity.role,
        leads = metrics.leads,
        opportunities = metrics.opportunities,
        conversion = metrics.conversion,
        "pipeline metrics collected"
    );
    metrics
}

fn successful_payload<'a>(
    tool_name: &str,
    result: &'a ToolInvocationResult,
    correlation_id: &str,
) -> Option<&'a serde_json::Value> {
    if !result.success {
        warn!(
            event_name = "metrics.source_failed",
            correlation_id = %correlation_id,
            tool_name = %tool_name,
            error = result.error_message.as_deref().unwrap_or("unknown"),
            "metrics source failed, counting it as empty"
        );
    }
    result.payload.as_ref().filter(|_| result.success)
}
