use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use brokerdesk_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

/// One displayed config key: dotted path, env override, rendered value.
struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let field = |key, env_key, value: String| Field { key, env_key, value };
    let llm = &config.llm;
    let crm = &config.crm;

    vec![
        field("llm.base_url", "BROKERDESK_LLM_BASE_URL", llm.base_url.clone()),
        field("llm.api_version", "BROKERDESK_LLM_API_VERSION", llm.api_version.clone()),
        field("llm.api_key", "BROKERDESK_LLM_API_KEY", redact_secret(llm.api_key.as_ref())),
        field("llm.model", "BROKERDESK_LLM_MODEL", llm.model.clone()),
        field("llm.max_tokens", "BROKERDESK_LLM_MAX_TOKENS", llm.max_tokens.to_string()),
        field("llm.timeout_secs", "BROKERDESK_LLM_TIMEOUT_SECS", llm.timeout_secs.to_string()),
        field(
            "llm.fallback_api_key",
            "BROKERDESK_LLM_FALLBACK_API_KEY",
            redact_secret(llm.fallback_api_key.as_ref()),
        ),
        field(
            "llm.fallback_model",
            "BROKERDESK_LLM_FALLBACK_MODEL",
            llm.fallback_model.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        field("crm.base_url", "BROKERDESK_CRM_BASE_URL", crm.base_url.clone()),
        field("crm.api_version", "BROKERDESK_CRM_API_VERSION", crm.api_version.clone()),
        field(
            "crm.access_token",
            "BROKERDESK_CRM_ACCESS_TOKEN",
            redact_secret(crm.access_token.as_ref()),
        ),
        field("crm.location_id", "BROKERDESK_CRM_LOCATION_ID", crm.location_id.clone()),
        field("crm.rpc_endpoint", "BROKERDESK_CRM_RPC_ENDPOINT", crm.rpc_endpoint.clone()),
        field(
            "crm.rpc_api_key",
            "BROKERDESK_CRM_RPC_API_KEY",
            redact_secret(crm.rpc_api_key.as_ref()),
        ),
        field("crm.timeout_secs", "BROKERDESK_CRM_TIMEOUT_SECS", crm.timeout_secs.to_string()),
        field(
            "server.bind_address",
            "BROKERDESK_SERVER_BIND_ADDRESS",
            config.server.bind_address.clone(),
        ),
        field("server.port", "BROKERDESK_SERVER_PORT", config.server.port.to_string()),
        field(
            "server.graceful_shutdown_secs",
            "BROKERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field("logging.level", "BROKERDESK_LOGGING_LEVEL", config.logging.level.clone()),
        field(
            "logging.format",
            "BROKERDESK_LOGGING_FORMAT",
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("brokerdesk.toml"), PathBuf::from("config/brokerdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the vendor prefix (`sk-`, `pit-`) and hides the rest.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };

    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
