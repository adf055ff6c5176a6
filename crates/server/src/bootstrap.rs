use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use concierge_agent::domains;
use concierge_agent::llm::{CompletionError, CompletionService, OpenAiCompatibleClient};
use concierge_agent::runtime::{AgentRuntime, RuntimeConfig};
use concierge_core::audit::TracingAuditSink;
use concierge_core::config::{AppConfig, ConfigError, LoadOptions, SelectionPolicy, ServerRole};
use concierge_core::store::InMemorySessionStore;
use concierge_router::{
    selector_for, Dispatcher, DomainDirectory, HttpAgentTransport, TransportError,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent_api::{self, AgentState};
use crate::health::{self, HealthState};
use crate::router_api::{self, RouterState};
use crate::sweeper;

pub enum Role {
    Agent(AgentState),
    Router(RouterState),
}

pub struct Application {
    pub config: AppConfig,
    pub role: Role,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("agent.domain `{0}` has no tool set; known domains: {known}", known = domains::known_domains().join(", "))]
    UnknownDomain(String),
    #[error("completion client setup failed: {0}")]
    Completion(#[source] CompletionError),
    #[error("agent transport setup failed: {0}")]
    Transport(#[source] TransportError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let role = match config.server.role {
        ServerRole::Agent => {
            let completion = OpenAiCompatibleClient::from_config(&config.llm)
                .map_err(BootstrapError::Completion)?;
            Role::Agent(build_agent(&config, Arc::new(completion))?)
        }
        ServerRole::Router => {
            let completion: Option<Arc<dyn CompletionService>> =
                if config.router.selection == SelectionPolicy::Classifier {
                    let client = OpenAiCompatibleClient::from_config(&config.llm)
                        .map_err(BootstrapError::Completion)?;
                    Some(Arc::new(client))
                } else {
                    None
                };
            Role::Router(build_router(&config, completion).await?)
        }
    };

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        role = config.server.role.as_str(),
        "application bootstrap complete"
    );
    Ok(Application { config, role })
}

pub fn build_agent(
    config: &AppConfig,
    completion: Arc<dyn CompletionService>,
) -> Result<AgentState, BootstrapError> {
    let profile = domains::profile(&config.agent.domain)
        .ok_or_else(|| BootstrapError::UnknownDomain(config.agent.domain.clone()))?;

    let runtime = AgentRuntime::new(
        RuntimeConfig::from_agent_config(&config.agent, profile.system_instruction),
        Arc::new(profile.registry),
        Arc::new(InMemorySessionStore::default()),
        completion,
        Arc::new(TracingAuditSink),
    );
    info!(
        event_name = "system.bootstrap.agent_ready",
        correlation_id = "bootstrap",
        domain = %profile.card.domain_id,
        max_iterations = config.agent.max_iterations,
        "agent runtime initialized"
    );
    Ok(AgentState { runtime: Arc::new(runtime), card: Arc::new(profile.card) })
}

pub async fn build_router(
    config: &AppConfig,
    completion: Option<Arc<dyn CompletionService>>,
) -> Result<RouterState, BootstrapError> {
    let transport = HttpAgentTransport::new(Duration::from_secs(config.router.remote_timeout_secs))
        .map_err(BootstrapError::Transport)?;

    let mut directory = DomainDirectory::from_config(&config.router);
    if config.router.discover_agent_cards {
        directory = directory.discover(&transport).await;
    }
    info!(
        event_name = "system.bootstrap.router_ready",
        correlation_id = "bootstrap",
        domains = directory.len(),
        selection = config.router.selection.as_str(),
        "router initialized"
    );

    let dispatcher = Dispatcher::new(
        directory,
        selector_for(config.router.selection, completion),
        Arc::new(transport),
        Arc::new(InMemorySessionStore::default()),
        Arc::new(TracingAuditSink),
    )
    .with_retry_backoff(Duration::from_millis(config.router.retry_backoff_ms));
    Ok(RouterState { dispatcher: Arc::new(dispatcher) })
}

impl Application {
    pub fn http_router(&self) -> Router {
        let role = self.config.server.role;
        let routes = match &self.role {
            Role::Agent(state) => {
                let health = HealthState {
                    role,
                    detail: format!("agent for domain `{}` initialized", state.card.domain_id),
                    store: Arc::clone(state.runtime.store()),
                    domains: 1,
                };
                agent_api::router(state.clone()).merge(health::router(health))
            }
            Role::Router(state) => {
                let health = HealthState {
                    role,
                    detail: "router initialized".to_string(),
                    store: Arc::clone(state.dispatcher.store()),
                    domains: state.dispatcher.directory().len(),
                };
                router_api::router(state.clone()).merge(health::router(health))
            }
        };
        routes.layer(TraceLayer::new_for_http())
    }

    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let ttl = Duration::from_secs(self.config.server.session_ttl_secs);
        let interval = Duration::from_secs(self.config.server.sweep_interval_secs.max(1));
        match &self.role {
            Role::Agent(state) => sweeper::spawn(Arc::clone(&state.runtime), ttl, interval),
            Role::Router(state) => sweeper::spawn(Arc::clone(&state.dispatcher), ttl, interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use concierge_core::config::{ConfigOverrides, LoadOptions, ServerRole};

    use super::{bootstrap, BootstrapError, Role};

    #[tokio::test]
    async fn agent_role_fails_fast_for_unknown_domain() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                server_role: Some(ServerRole::Agent),
                agent_domain: Some("insurance".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let error = result.err().expect("unknown domain rejected");
        assert!(matches!(
            error,
            BootstrapError::UnknownDomain(ref domain) if domain == "insurance"
        ));
        assert!(error.to_string().contains("transactions"));
    }

    #[tokio::test]
    async fn router_role_builds_directory_from_config() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                server_role: Some(ServerRole::Router),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("router bootstrap");

        match app.role {
            Role::Router(state) => assert_eq!(state.dispatcher.directory().len(), 2),
            Role::Agent(_) => panic!("expected router role"),
        }
    }
}
