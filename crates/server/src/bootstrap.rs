use std::sync::Arc;

use brokerdesk_agent::{AgentRuntime, AnthropicClient, ProviderError};
use brokerdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use brokerdesk_crm::{CrmGateway, GatewayError};
use thiserror::Error;
use tracing::info;

/// Shared state handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub runtime: Arc<AgentRuntime>,
}

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model client setup failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("CRM gateway setup failed: {0}")]
    Gateway(#[from] GatewayError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let llm = AnthropicClient::from_config(&config.llm)?;
    let gateway = CrmGateway::from_config(&config.crm)?;
    info!(
        event_name = "system.bootstrap.clients_ready",
        correlation_id = "bootstrap",
        provider_attempts = llm.strategy().attempts().len(),
        location_id = %gateway.location_id(),
        "model client and CRM gateway initialized"
    );

    let runtime =
        AgentRuntime::new(Arc::new(llm), Arc::new(gateway), config.crm.location_id.clone());
    let state = AppState { config: Arc::new(config.clone()), runtime: Arc::new(runtime) };

    Ok(Application { config, state })
}
