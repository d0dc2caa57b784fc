use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use brokerdesk_agent::ProviderStrategy;
use brokerdesk_core::config::AppConfig;
use chrono::Utc;
use serde::Serialize;

use crate::bootstrap::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub llm: HealthCheck,
    pub crm: HealthCheck,
    pub checked_at: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let llm = llm_check(&state.config);
    let crm = crm_check(&state.config);
    let ready = llm.status == "ready" && crm.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("{} tools registered", state.runtime.catalog().len()),
        },
        llm,
        crm,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn llm_check(config: &AppConfig) -> HealthCheck {
    let strategy = ProviderStrategy::from_config(&config.llm);
    if strategy.is_empty() {
        return HealthCheck { status: "degraded", detail: "no model API key configured".to_string() };
    }

    let models =
        strategy.attempts().iter().map(|attempt| attempt.model.as_str()).collect::<Vec<_>>();
    HealthCheck { status: "ready", detail: format!("models {}", models.join(" -> ")) }
}

fn crm_check(config: &AppConfig) -> HealthCheck {
    if config.crm.access_token.is_none() || config.crm.location_id.trim().is_empty() {
        return HealthCheck {
            status: "degraded",
            detail: "CRM access token or location id missing".to_string(),
        };
    }

    HealthCheck {
        status: "ready",
        detail: format!("{} location {}", config.crm.base_url, config.crm.location_id),
    }
}
