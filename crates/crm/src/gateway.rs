use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use brokerdesk_agent::{ToolCatalog, ToolExecutor, ToolInvocationResult};
use brokerdesk_core::config::CrmConfig;
use brokerdesk_core::IntegrationError;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::routes::{route_for, HttpMethod, RestRoute, Route, RouteError};
use crate::transport::{decode, DecodeError};

const EVENT_STREAM_ACCEPT: &str = "application/json, text/event-stream";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("crm.access_token is required to build the CRM gateway")]
    MissingAccessToken,
    #[error("failed to build CRM HTTP client: {0}")]
    Client(String),
}

/// Failure of a single CRM call. Always converted into a failed
/// [`ToolInvocationResult`] before leaving the gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("CRM request failed: {0}")]
    Transport(String),
    #[error("CRM API error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// HTTP client for the CRM: direct REST routes for the mapped tools, the
/// `tools/call` RPC envelope for the rest of the catalog.
pub struct CrmGateway {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
    access_token: SecretString,
    location_id: String,
    rpc_endpoint: String,
    rpc_api_key: Option<SecretString>,
    catalog: ToolCatalog,
    next_rpc_id: AtomicU64,
}

impl CrmGateway {
    pub fn from_config(config: &CrmConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| GatewayError::Client(error.to_string()))?;

        Self::new(http, config)
    }

    pub fn new(http: reqwest::Client, config: &CrmConfig) -> Result<Self, GatewayError> {
        let access_token = config.access_token.clone().ok_or(GatewayError::MissingAccessToken)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            access_token,
            location_id: config.location_id.clone(),
            rpc_endpoint: config.rpc_endpoint.clone(),
            rpc_api_key: config.rpc_api_key.clone(),
            catalog: ToolCatalog,
            next_rpc_id: AtomicU64::new(1),
        })
    }

    pub fn location_id(&self) -> &str {
        &self.location_id
    }

    pub async fn call(
        &self,
        tool_name: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Value, CallError> {
        match route_for(tool_name) {
            Route::Rest(route) => self.call_rest(route, parameters).await,
            Route::Rpc => self.call_rpc(tool_name, parameters).await,
        }
    }

    async fn call_rest(
        &self,
        route: &RestRoute,
        parameters: &Map<String, Value>,
    ) -> Result<Value, CallError> {
        let url = format!("{}{}", self.base_url, route.render_path(parameters)?);
        let query = route.query_pairs(&self.location_id, parameters);

        let mut request = match route.method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url),
        };
        request = request
            .query(&query)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token.expose_secret()))
            .header("Version", &self.api_version)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        if let Some(body) = route.json_body(&self.location_id, parameters) {
            request = request.json(&body);
        }

        debug!(event_name = "crm.rest.request", tool_name = route.tool, url = %url, "calling CRM REST route");
        read_response(request.send().await).await
    }

    async fn call_rpc(
        &self,
        tool_name: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Value, CallError> {
        let mut arguments = parameters.clone();
        arguments
            .entry("locationId")
            .or_insert_with(|| Value::String(self.location_id.clone()));

        let id = self.next_rpc_id.fetch_add(1, Ordering::Relaxed);
        let envelope = json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": { "name": tool_name, "arguments": arguments },
            "id": id,
        });

        let mut request = self
            .http
            .post(&self.rpc_endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token.expose_secret()))
            .header("Version", &self.api_version)
            .header(ACCEPT, EVENT_STREAM_ACCEPT)
            .header("locationId", &self.location_id)
            .json(&envelope);
        if let Some(api_key) = &self.rpc_api_key {
            request = request.header("X-API-Key", api_key.expose_secret());
        }

        debug!(event_name = "crm.rpc.request", tool_name, rpc_id = id, "calling CRM RPC endpoint");
        read_response(request.send().await).await
    }
}

async fn read_response(
    sent: Result<reqwest::Response, reqwest::Error>,
) -> Result<Value, CallError> {
    let response = sent.map_err(|error| CallError::Transport(error.to_string()))?;
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.map_err(|error| CallError::Transport(error.to_string()))?;

    if !status.is_success() {
        return Err(CallError::Status { status: status.as_u16(), body });
    }

    debug!(event_name = "crm.response", status = status.as_u16(), bytes = body.len(), "CRM responded");
    Ok(decode(content_type.as_deref(), &body)?)
}

#[async_trait]
impl ToolExecutor for CrmGateway {
    async fn invoke(
        &self,
        tool_name: &str,
        parameters: &Map<String, Value>,
    ) -> ToolInvocationResult {
        if !self.catalog.contains(tool_name) {
            let error = IntegrationError::UnknownTool(tool_name.to_string());
            warn!(event_name = "crm.tool.unknown", tool_name, error = %error, "tool is not in the catalog");
            return ToolInvocationResult::failed(error.to_string());
        }

        match self.call(tool_name, parameters).await {
            Ok(payload) => {
                info!(event_name = "crm.tool.succeeded", tool_name, "CRM tool call succeeded");
                ToolInvocationResult::ok(payload)
            }
            Err(error) => {
                warn!(event_name = "crm.tool.failed", tool_name, error = %error, "CRM tool call failed");
                ToolInvocationResult::failed(error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::State,
        http::{header, HeaderMap, Method, StatusCode, Uri},
        Router,
    };
    use brokerdesk_agent::{
        RequestFilter, ToolExecutor, ToolInvocationRequest, ToolInvocationResult,
    };
    use brokerdesk_core::config::AppConfig;
    use brokerdesk_core::{Identity, Role};
    use serde_json::{json, Map, Value};

    use super::{CrmGateway, GatewayError};

    #[derive(Clone, Debug)]
    struct Captured {
        method: Method,
        path: String,
        query: Option<String>,
        headers: HeaderMap,
        body: String,
    }

    #[derive(Clone, Default)]
    struct Recorder {
        requests: Arc<Mutex<Vec<Captured>>>,
    }

    impl Recorder {
        fn requests(&self) -> Vec<Captured> {
            self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
        }
    }

    async fn crm(
        State(recorder): State<Recorder>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
        let path = uri.path().to_string();
        if let Ok(mut requests) = recorder.requests.lock() {
            requests.push(Captured {
                method,
                path: path.clone(),
                query: uri.query().map(str::to_string),
                headers,
                body,
            });
        }

        let plain = [(header::CONTENT_TYPE, "application/json")];
        match path.as_str() {
            "/contacts/" => {
                (StatusCode::OK, plain, json!({ "contacts": [{ "id": "c1" }] }).to_string())
            }
            "/opportunities/search" => {
                (StatusCode::OK, plain, json!({ "opportunities": [] }).to_string())
            }
            "/mcp/" => {
                let envelope = json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": { "content": [{ "type": "text", "text": "{\"location\":{\"id\":\"loc-1\"}}" }] }
                });
                (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    format!("event: message\ndata: {envelope}\n\n"),
                )
            }
            _ => (StatusCode::UNPROCESSABLE_ENTITY, plain, "bad request".to_string()),
        }
    }

    async fn spawn(recorder: Recorder) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        let router = Router::new().fallback(crm).with_state(recorder);
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{address}")
    }

    fn gateway(base_url: &str) -> CrmGateway {
        let mut config = AppConfig::default().crm;
        config.base_url = base_url.to_string();
        config.rpc_endpoint = format!("{base_url}/mcp/");
        config.access_token = Some("pit-test".to_string().into());
        config.location_id = "loc-1".to_string();
        CrmGateway::new(reqwest::Client::new(), &config).expect("gateway")
    }

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn header<'a>(captured: &'a Captured, name: &str) -> Option<&'a str> {
        captured.headers.get(name).and_then(|value| value.to_str().ok())
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_network_call() {
        let recorder = Recorder::default();
        let base_url = spawn(recorder.clone()).await;

        let result = gateway(&base_url).invoke("foo_bar", &Map::new()).await;

        assert_eq!(result, ToolInvocationResult::unknown_tool());
        assert!(recorder.requests().is_empty());
    }

    #[tokio::test]
    async fn contacts_listing_uses_rest_with_auth_headers() {
        let recorder = Recorder::default();
        let base_url = spawn(recorder.clone()).await;

        let result = gateway(&base_url)
            .invoke("contacts_get-contacts", &params(json!({ "assignedTo": "U1" })))
            .await;

        assert!(result.success);
        assert_eq!(result.payload, Some(json!({ "contacts": [{ "id": "c1" }] })));

        let requests = recorder.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].query.as_deref(), Some("locationId=loc-1&assignedTo=U1"));
        assert_eq!(header(&requests[0], "authorization"), Some("Bearer pit-test"));
        assert_eq!(header(&requests[0], "version"), Some("2021-07-28"));
    }

    #[tokio::test]
    async fn broker_scoping_reaches_the_crm_query_string() {
        let recorder = Recorder::default();
        let base_url = spawn(recorder.clone()).await;
        let gateway = gateway(&base_url);
        let broker = Identity { role: Role::Broker, external_owner_id: Some("U1".to_string()) };

        let scoped_contacts = "locationId=loc-1&assignedTo=U1";
        let cases = [
            ("contacts_get-contacts", json!({ "assignedTo": "" }), scoped_contacts),
            ("contacts_get-contacts", json!({ "assignedTo": null }), scoped_contacts),
            ("calendars_get-calendar-events", json!({}), "locationId=loc-1&userId=U1"),
        ];
        for (tool, input, _) in &cases {
            let (scoped, _) = RequestFilter::default()
                .scope(ToolInvocationRequest::new("toolu_1", *tool, input.clone()), &broker);
            gateway.invoke(&scoped.tool_name, &scoped.parameters).await;
        }

        let queries =
            recorder.requests().into_iter().map(|captured| captured.query).collect::<Vec<_>>();
        let expected =
            cases.iter().map(|(_, _, query)| Some(query.to_string())).collect::<Vec<_>>();
        assert_eq!(queries, expected);
    }

    #[tokio::test]
    async fn opportunity_search_posts_snake_case_body() {
        let recorder = Recorder::default();
        let base_url = spawn(recorder.clone()).await;

        let result = gateway(&base_url)
            .invoke(
                "opportunities_search-opportunity",
                &params(json!({ "assignedTo": "U1", "status": "open" })),
            )
            .await;

        assert!(result.success);
        let requests = recorder.requests();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].query.as_deref(), Some("locationId=loc-1"));
        let body: Value = serde_json::from_str(&requests[0].body).expect("json body");
        assert_eq!(body, json!({ "location_id": "loc-1", "assigned_to": "U1", "status": "open" }));
    }

    #[tokio::test]
    async fn rpc_tools_send_envelope_and_decode_event_stream() {
        let recorder = Recorder::default();
        let base_url = spawn(recorder.clone()).await;

        let result = gateway(&base_url).invoke("locations_get-location", &Map::new()).await;

        assert_eq!(result.payload, Some(json!({ "location": { "id": "loc-1" } })));

        let requests = recorder.requests();
        assert_eq!(requests[0].path, "/mcp/");
        assert_eq!(header(&requests[0], "accept"), Some("application/json, text/event-stream"));
        assert_eq!(header(&requests[0], "locationid"), Some("loc-1"));
        assert!(header(&requests[0], "x-api-key").is_none());

        let envelope: Value = serde_json::from_str(&requests[0].body).expect("json envelope");
        assert_eq!(envelope["jsonrpc"], "2.0");
        assert_eq!(envelope["method"], "tools/call");
        assert_eq!(envelope["params"]["name"], "locations_get-location");
        assert_eq!(envelope["params"]["arguments"], json!({ "locationId": "loc-1" }));
    }

    #[tokio::test]
    async fn missing_path_parameter_fails_without_network_call() {
        let recorder = Recorder::default();
        let base_url = spawn(recorder.clone()).await;

        let result = gateway(&base_url).invoke("contacts_get-contact", &Map::new()).await;

        assert_eq!(result, ToolInvocationResult::failed("missing required parameter: contactId"));
        assert!(recorder.requests().is_empty());
    }

    #[tokio::test]
    async fn non_success_status_becomes_failed_result() {
        let recorder = Recorder::default();
        let base_url = spawn(recorder.clone()).await;

        let result = gateway(&base_url)
            .invoke("contacts_get-all-tasks", &params(json!({ "contactId": "c1" })))
            .await;

        assert_eq!(result, ToolInvocationResult::failed("CRM API error: 422 - bad request"));
        assert_eq!(recorder.requests()[0].path, "/contacts/c1/tasks");
    }

    #[test]
    fn gateway_requires_access_token() {
        let config = AppConfig::default().crm;
        assert!(matches!(
            CrmGateway::new(reqwest::Client::new(), &config),
            Err(GatewayError::MissingAccessToken)
        ));
    }
}
