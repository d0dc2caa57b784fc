use brokerdesk_agent::tools::OWNERSHIP_KEY;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("missing required parameter: {0}")]
    MissingParameter(String),
    #[error("invalid value for parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Direct REST mapping of one tool.
///
/// `path` may contain `{param}` placeholders filled from the invocation
/// parameters. When `with_location` is set the configured location id is sent
/// as the `locationId` query parameter. `body` maps invocation parameters to
/// JSON body fields; a non-empty body also carries `location_id`.
/// `owner_query` names the query parameter that carries the `assignedTo`
/// owner id on endpoints that filter by user under another name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestRoute {
    pub tool: &'static str,
    pub method: HttpMethod,
    pub path: &'static str,
    pub with_location: bool,
    pub query: &'static [&'static str],
    pub body: &'static [(&'static str, &'static str)],
    pub owner_query: Option<&'static str>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Rest(&'static RestRoute),
    /// Generic `tools/call` envelope against the RPC endpoint.
    Rpc,
}

static REST_ROUTES: &[RestRoute] = &[
    RestRoute {
        tool: "contacts_get-contacts",
        method: HttpMethod::Get,
        path: "/contacts/",
        with_location: true,
        query: &["assignedTo", "query", "limit", "skip"],
        body: &[],
        owner_query: None,
    },
    RestRoute {
        tool: "contacts_get-contact",
        method: HttpMethod::Get,
        path: "/contacts/{contactId}",
        with_location: false,
        query: &[],
        body: &[],
        owner_query: None,
    },
    RestRoute {
        tool: "contacts_get-all-tasks",
        method: HttpMethod::Get,
        path: "/contacts/{contactId}/tasks",
        with_location: false,
        query: &[],
        body: &[],
        owner_query: None,
    },
    RestRoute {
        tool: "opportunities_search-opportunity",
        method: HttpMethod::Post,
        path: "/opportunities/search",
        with_location: true,
        query: &[],
        body: &[("assignedTo", "assigned_to"), ("status", "status"), ("pipelineId", "pipeline_id")],
        owner_query: None,
    },
    RestRoute {
        tool: "opportunities_get-pipelines",
        method: HttpMethod::Get,
        path: "/opportunities/pipelines",
        with_location: true,
        query: &[],
        body: &[],
        owner_query: None,
    },
    RestRoute {
        tool: "conversations_search-conversation",
        method: HttpMethod::Get,
        path: "/conversations/search",
        with_location: true,
        query: &["contactId", "assignedTo"],
        body: &[],
        owner_query: None,
    },
    RestRoute {
        tool: "calendars_get-calendar-events",
        method: HttpMethod::Get,
        path: "/calendars/events",
        with_location: true,
        query: &["userId", "calendarId"],
        body: &[],
        owner_query: Some("userId"),
    },
];

pub fn route_for(tool_name: &str) -> Route {
    REST_ROUTES
        .iter()
        .find(|route| route.tool == tool_name)
        .map(Route::Rest)
        .unwrap_or(Route::Rpc)
}

pub fn rest_routes() -> &'static [RestRoute] {
    REST_ROUTES
}

impl RestRoute {
    pub fn render_path(&self, parameters: &Map<String, Value>) -> Result<String, RouteError> {
        let mut rendered = String::with_capacity(self.path.len());
        let mut rest = self.path;

        while let Some(open) = rest.find('{') {
            let Some(width) = rest[open..].find('}') else {
                break;
            };
            let name = &rest[open + 1..open + width];
            let value = parameters
                .get(name)
                .and_then(scalar_text)
                .ok_or_else(|| RouteError::MissingParameter(name.to_string()))?;
            if value.contains(|c: char| matches!(c, '/' | '?' | '#')) {
                return Err(RouteError::InvalidParameter(name.to_string()));
            }

            rendered.push_str(&rest[..open]);
            rendered.push_str(&value);
            rest = &rest[open + width + 1..];
        }

        rendered.push_str(rest);
        Ok(rendered)
    }

    pub fn query_pairs(
        &self,
        location_id: &str,
        parameters: &Map<String, Value>,
    ) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if self.with_location {
            pairs.push(("locationId".to_string(), location_id.to_string()));
        }

        for name in self.query {
            if let Some(value) = parameters.get(*name).and_then(scalar_text) {
                pairs.push((name.to_string(), value));
            }
        }

        if let Some(field) = self.owner_query {
            let owner = parameters.get(OWNERSHIP_KEY).and_then(scalar_text);
            if let (Some(owner), false) = (owner, pairs.iter().any(|(name, _)| name == field)) {
                pairs.push((field.to_string(), owner));
            }
        }
        pairs
    }

    pub fn json_body(&self, location_id: &str, parameters: &Map<String, Value>) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }

        let mut body = Map::new();
        body.insert("location_id".to_string(), Value::String(location_id.to_string()));
        for (parameter, field) in self.body {
            if let Some(value) = parameters.get(*parameter).filter(|value| !value.is_null()) {
                body.insert(field.to_string(), value.clone());
            }
        }
        Some(Value::Object(body))
    }
}

/// Text form of a scalar parameter. Blank strings and null count as absent.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
