use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub crm: CrmConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_version: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub fallback_api_key: Option<SecretString>,
    pub fallback_model: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub base_url: String,
    pub api_version: String,
    pub access_token: Option<SecretString>,
    pub location_id: String,
    pub rpc_endpoint: String,
    pub rpc_api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub crm_access_token: Option<String>,
    pub crm_location_id: Option<String>,
    pub crm_base_url: Option<String>,
    pub crm_rpc_endpoint: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                base_url: "https://api.anthropic.com".to_string(),
                api_version: "2023-06-01".to_string(),
                api_key: None,
                model: "claude-3-5-sonnet-20241022".to_string(),
                max_tokens: 2048,
                timeout_secs: 60,
                fallback_api_key: None,
                fallback_model: None,
            },
            crm: CrmConfig {
                base_url: "https://services.leadconnectorhq.com".to_string(),
                api_version: "2021-07-28".to_string(),
                access_token: None,
                location_id: String::new(),
                rpc_endpoint: "https://services.leadconnectorhq.com/mcp/".to_string(),
                rpc_api_key: None,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("brokerdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(api_version) = llm.api_version {
                self.llm.api_version = api_version;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(fallback_api_key) = llm.fallback_api_key {
                self.llm.fallback_api_key = Some(secret_value(fallback_api_key));
            }
            if let Some(fallback_model) = llm.fallback_model {
                self.llm.fallback_model = Some(fallback_model);
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(base_url) = crm.base_url {
                self.crm.base_url = base_url;
            }
            if let Some(api_version) = crm.api_version {
                self.crm.api_version = api_version;
            }
            if let Some(access_token) = crm.access_token {
                self.crm.access_token = Some(secret_value(access_token));
            }
            if let Some(location_id) = crm.location_id {
                self.crm.location_id = location_id;
            }
            if let Some(rpc_endpoint) = crm.rpc_endpoint {
                self.crm.rpc_endpoint = rpc_endpoint;
            }
            if let Some(rpc_api_key) = crm.rpc_api_key {
                self.crm.rpc_api_key = Some(secret_value(rpc_api_key));
            }
            if let Some(timeout_secs) = crm.timeout_secs {
                self.crm.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("BROKERDESK_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("BROKERDESK_LLM_API_VERSION") {
            self.llm.api_version = value;
        }
        if let Some(value) = read_env("BROKERDESK_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("BROKERDESK_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("BROKERDESK_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("BROKERDESK_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("BROKERDESK_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("BROKERDESK_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("BROKERDESK_LLM_FALLBACK_API_KEY") {
            self.llm.fallback_api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("BROKERDESK_LLM_FALLBACK_MODEL") {
            self.llm.fallback_model = Some(value);
        }

        if let Some(value) = read_env("BROKERDESK_CRM_BASE_URL") {
            self.crm.base_url = value;
        }
        if let Some(value) = read_env("BROKERDESK_CRM_API_VERSION") {
            self.crm.api_version = value;
        }
        if let Some(value) = read_env("BROKERDESK_CRM_ACCESS_TOKEN") {
            self.crm.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("BROKERDESK_CRM_LOCATION_ID") {
            self.crm.location_id = value;
        }
        if let Some(value) = read_env("BROKERDESK_CRM_RPC_ENDPOINT") {
            self.crm.rpc_endpoint = value;
        }
        if let Some(value) = read_env("BROKERDESK_CRM_RPC_API_KEY") {
            self.crm.rpc_api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("BROKERDESK_CRM_TIMEOUT_SECS") {
            self.crm.timeout_secs = parse_u64("BROKERDESK_CRM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("BROKERDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("BROKERDESK_SERVER_PORT") {
            self.server.port = parse_u16("BROKERDESK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("BROKERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("BROKERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("BROKERDESK_LOGGING_LEVEL").or_else(|| read_env("BROKERDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("BROKERDESK_LOGGING_FORMAT").or_else(|| read_env("BROKERDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(access_token) = overrides.crm_access_token {
            self.crm.access_token = Some(secret_value(access_token));
        }
        if let Some(location_id) = overrides.crm_location_id {
            self.crm.location_id = location_id;
        }
        if let Some(base_url) = overrides.crm_base_url {
            self.crm.base_url = base_url;
        }
        if let Some(rpc_endpoint) = overrides.crm_rpc_endpoint {
            self.crm.rpc_endpoint = rpc_endpoint;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_crm(&self.crm)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("brokerdesk.toml"), PathBuf::from("config/brokerdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    require_http_url("llm.base_url", &llm.base_url)?;

    let missing_key =
        llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation(
            "llm.api_key is required. Get it from https://console.anthropic.com > API Keys"
                .to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.fallback_model.as_ref().is_some_and(|model| model.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "llm.fallback_model must not be empty when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    require_http_url("crm.base_url", &crm.base_url)?;
    require_http_url("crm.rpc_endpoint", &crm.rpc_endpoint)?;

    let missing_token = crm
        .access_token
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing_token {
        return Err(ConfigError::Validation(
            "crm.access_token is required (private integration token, usually `pit-...`)"
                .to_string(),
        ));
    }

    if crm.location_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crm.location_id is required. Find it under Settings > Business Profile in the CRM"
                .to_string(),
        ));
    }

    if crm.timeout_secs == 0 || crm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "crm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn require_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(());
    }
    Err(ConfigError::Validation(format!("{field} must start with http:// or https://")))
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    crm: Option<CrmPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    api_version: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    fallback_api_key: Option<String>,
    fallback_model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    base_url: Option<String>,
    api_version: Option<String>,
    access_token: Option<String>,
    location_id: Option<String>,
    rpc_endpoint: Option<String>,
    rpc_api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
