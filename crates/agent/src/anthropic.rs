use std::time::Duration;

use async_trait::async_trait;
use brokerdesk_core::config::LlmConfig;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::llm::{
    Exchange, LlmClient, MessagesRequest, ModelReply, ProviderAttempt, ProviderError,
    ProviderStrategy,
};

/// Messages-API client that walks a [`ProviderStrategy`] for every round.
#[derive(Clone, Debug)]
pub struct AnthropicClient {
    http: reqwest::Client,
    endpoint: String,
    api_version: String,
    max_tokens: u32,
    strategy: ProviderStrategy,
}

impl AnthropicClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        Ok(Self::new(http, config, ProviderStrategy::from_config(config)))
    }

    pub fn new(http: reqwest::Client, config: &LlmConfig, strategy: ProviderStrategy) -> Self {
        Self {
            http,
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            api_version: config.api_version.clone(),
            max_tokens: config.max_tokens,
            strategy,
        }
    }

    pub fn strategy(&self) -> &ProviderStrategy {
        &self.strategy
    }

    async fn send(
        &self,
        attempt: &ProviderAttempt,
        exchange: &Exchange,
    ) -> Result<ModelReply, ProviderError> {
        let body = MessagesRequest {
            model: &attempt.model,
            max_tokens: self.max_tokens,
            system: &exchange.system,
            messages: &exchange.messages,
            tools: &exchange.tools,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", attempt.api_key.expose_secret())
            .header("anthropic-version", &self.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status: status.as_u16(), body });
        }

        response.json::<ModelReply>().await.map_err(|error| ProviderError::Decode(error.to_string()))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, exchange: &Exchange) -> Result<ModelReply, ProviderError> {
        let mut last_error = ProviderError::NotConfigured;

        for (index, attempt) in self.strategy.attempts().iter().enumerate() {
            match self.send(attempt, exchange).await {
                Ok(reply) => {
                    debug!(
                        event_name = "agent.provider.reply",
                        attempt = index,
                        model = %attempt.model,
                        blocks = reply.content.len(),
                        "provider reply received"
                    );
                    return Ok(reply);
                }
                Err(ProviderError::Status { status, body })
                    if ProviderStrategy::should_advance(status) =>
                {
                    warn!(
                        event_name = "agent.provider.rejected",
                        attempt = index,
                        model = %attempt.model,
                        status,
                        "provider rejected credential or model, trying next attempt"
                    );
                    last_error = ProviderError::Status { status, body };
                }
                Err(error) => return Err(error),
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use brokerdesk_core::config::AppConfig;
    use serde_json::{json, Value};

    use super::AnthropicClient;
    use crate::llm::{
        Exchange, LlmClient, Message, ProviderAttempt, ProviderError, ProviderStrategy,
    };

    #[derive(Clone, Default)]
    struct Recorded {
        calls: Arc<Mutex<Vec<(String, Value)>>>,
    }

    impl Recorded {
        fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{address}")
    }

    async fn messages(
        State(recorded): State<Recorded>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let key = headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if let Ok(mut calls) = recorded.calls.lock() {
            calls.push((key.clone(), body));
        }

        match key.as_str() {
            "sk-revoked" => (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid x-api-key" }))),
            "sk-busy" => (
                StatusCode::from_u16(529).expect("valid status"),
                Json(json!({ "error": "overloaded" })),
            ),
            _ => (
                StatusCode::OK,
                Json(json!({
                    "content": [{ "type": "text", "text": "Tienes 3 contactos." }],
                    "stop_reason": "end_turn"
                })),
            ),
        }
    }

    fn client(base_url: &str, attempts: &[(&str, &str)]) -> AnthropicClient {
        let mut config = AppConfig::default().llm;
        config.base_url = base_url.to_string();
        let strategy = ProviderStrategy::new(
            attempts
                .iter()
                .map(|(key, model)| ProviderAttempt {
                    api_key: key.to_string().into(),
                    model: model.to_string(),
                })
                .collect(),
        );
        AnthropicClient::new(reqwest::Client::new(), &config, strategy)
    }

    fn exchange() -> Exchange {
        Exchange {
            system: "Eres un asistente.".to_string(),
            messages: vec![Message::user_text("muéstrame mis contactos")],
            tools: Vec::new(),
        }
    }

    #[tokio::test]
    async fn rejected_credential_falls_through_to_next_attempt() {
        let recorded = Recorded::default();
        let base_url = spawn(
            Router::new().route("/v1/messages", post(messages)).with_state(recorded.clone()),
        )
        .await;

        let reply = client(&base_url, &[("sk-revoked", "model-a"), ("sk-good", "model-b")])
            .complete(&exchange())
            .await
            .expect("fallback attempt should succeed");

        assert_eq!(reply.first_text(), Some("Tienes 3 contactos."));
        let calls = recorded.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "sk-revoked");
        assert_eq!(calls[1].1["model"], "model-b");
        assert_eq!(calls[1].1["system"], "Eres un asistente.");
        assert!(calls[1].1.get("tools").is_none(), "empty tool list is omitted");
    }

    #[tokio::test]
    async fn overloaded_provider_is_not_retried() {
        let recorded = Recorded::default();
        let base_url = spawn(
            Router::new().route("/v1/messages", post(messages)).with_state(recorded.clone()),
        )
        .await;

        let error = client(&base_url, &[("sk-busy", "model-a"), ("sk-good", "model-b")])
            .complete(&exchange())
            .await
            .expect_err("529 must surface");

        assert!(matches!(error, ProviderError::Status { status: 529, .. }));
        assert_eq!(recorded.calls().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_strategy_reports_last_rejection() {
        let recorded = Recorded::default();
        let base_url = spawn(
            Router::new().route("/v1/messages", post(messages)).with_state(recorded.clone()),
        )
        .await;

        let error = client(&base_url, &[("sk-revoked", "model-a")])
            .complete(&exchange())
            .await
            .expect_err("single rejected attempt must fail");

        assert_eq!(error.to_string(), "API Error: 401 - {\"error\":\"invalid x-api-key\"}");
    }

    #[tokio::test]
    async fn empty_strategy_is_not_configured() {
        let error = client("http://127.0.0.1:9", &[])
            .complete(&exchange())
            .await
            .expect_err("no attempts configured");

        assert_eq!(error, ProviderError::NotConfigured);
    }
}
