use axum::{extract::State, routing::get, Json, Router};
use brokerdesk_agent::tools::ToolSpec;

use crate::bootstrap::AppState;
use crate::{chat, health, metrics};

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(chat::router())
        .merge(metrics::router())
        .merge(health::router())
        .route("/api/tools", get(tools))
        .with_state(state)
}

/// Tool definitions exactly as the model sees them.
pub async fn tools(State(state): State<AppState>) -> Json<Vec<ToolSpec>> {
    Json(state.runtime.catalog().specs())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::testing::{state_with, StaticExecutor};

    #[tokio::test]
    async fn tools_endpoint_lists_the_catalog() {
        let app = super::router(state_with(Vec::new(), StaticExecutor::ok(json!({}))));

        let response = app
            .oneshot(Request::get("/api/tools").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let tools: Vec<Value> = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(tools.len(), 21);
        assert!(tools.iter().any(|tool| tool["name"] == "contacts_get-contacts"));
        assert!(tools.iter().all(|tool| tool["input_schema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn unknown_routes_return_not_found() {
        let app = super::router(state_with(Vec::new(), StaticExecutor::ok(json!({}))));

        let response = app
            .oneshot(Request::get("/api/leads/export").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
