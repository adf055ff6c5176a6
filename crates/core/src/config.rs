use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub router: RouterConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// Settings for a process serving one domain's agent runtime.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub domain: String,
    pub max_iterations: u32,
    pub completion_timeout_secs: u64,
    pub system_instruction: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RouterConfig {
    pub selection: SelectionPolicy,
    pub default_domain: Option<String>,
    pub domains: Vec<DomainEntry>,
    pub remote_timeout_secs: u64,
    pub retry_backoff_ms: u64,
    pub discover_agent_cards: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEntry {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub intents: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub role: ServerRole,
    pub bind_address: String,
    pub port: u16,
    pub session_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    Fixed,
    Keyword,
    Classifier,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerRole {
    Agent,
    Router,
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
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub agent_domain: Option<String>,
    pub router_selection: Option<SelectionPolicy>,
    pub server_role: Option<ServerRole>,
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
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: "http://localhost:11434/v1".to_string(),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            agent: AgentConfig {
                domain: "recommend".to_string(),
                max_iterations: 5,
                completion_timeout_secs: 30,
                system_instruction: None,
            },
            router: RouterConfig {
                selection: SelectionPolicy::Keyword,
                default_domain: Some("recommend".to_string()),
                domains: vec![
                    DomainEntry {
                        id: "recommend".to_string(),
                        address: "http://127.0.0.1:10000".to_string(),
                        intents: ["recommend", "card", "shopping", "apply"]
                            .into_iter()
                            .map(str::to_string)
                            .collect(),
                        description: None,
                    },
                    DomainEntry {
                        id: "transactions".to_string(),
                        address: "http://127.0.0.1:10001".to_string(),
                        intents: ["transaction", "history", "statement"]
                            .into_iter()
                            .map(str::to_string)
                            .collect(),
                        description: None,
                    },
                ],
                remote_timeout_secs: 30,
                retry_backoff_ms: 250,
                discover_agent_cards: false,
            },
            server: ServerConfig {
                role: ServerRole::Router,
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                session_ttl_secs: 3600,
                sweep_interval_secs: 60,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

impl SelectionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Keyword => "keyword",
            Self::Classifier => "classifier",
        }
    }
}

impl ServerRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Router => "router",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for SelectionPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "keyword" => Ok(Self::Keyword),
            "classifier" => Ok(Self::Classifier),
            other => Err(ConfigError::Validation(format!(
                "unsupported selection policy `{other}` (expected fixed|keyword|classifier)"
            ))),
        }
    }
}

impl std::str::FromStr for ServerRole {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "agent" => Ok(Self::Agent),
            "router" => Ok(Self::Router),
            other => Err(ConfigError::Validation(format!(
                "unsupported server role `{other}` (expected agent|router)"
            ))),
        }
    }
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("concierge.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Path the loader would read, if any; used by operator tooling for source attribution.
    pub fn resolved_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
        resolve_config_path(explicit_path)
    }

    pub fn domain_entry(&self, id: &str) -> Option<&DomainEntry> {
        self.router.domains.iter().find(|entry| entry.id == id)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(domain) = agent.domain {
                self.agent.domain = domain;
            }
            if let Some(max_iterations) = agent.max_iterations {
                self.agent.max_iterations = max_iterations;
            }
            if let Some(completion_timeout_secs) = agent.completion_timeout_secs {
                self.agent.completion_timeout_secs = completion_timeout_secs;
            }
            if let Some(system_instruction) = agent.system_instruction {
                self.agent.system_instruction = Some(system_instruction);
            }
        }

        if let Some(router) = patch.router {
            if let Some(selection) = router.selection {
                self.router.selection = selection;
            }
            if let Some(default_domain) = router.default_domain {
                self.router.default_domain =
                    (!default_domain.trim().is_empty()).then_some(default_domain);
            }
            // A file-provided domain list replaces the built-in one wholesale.
            if let Some(domains) = router.domains {
                self.router.domains = domains;
            }
            if let Some(remote_timeout_secs) = router.remote_timeout_secs {
                self.router.remote_timeout_secs = remote_timeout_secs;
            }
            if let Some(retry_backoff_ms) = router.retry_backoff_ms {
                self.router.retry_backoff_ms = retry_backoff_ms;
            }
            if let Some(discover_agent_cards) = router.discover_agent_cards {
                self.router.discover_agent_cards = discover_agent_cards;
            }
        }

        if let Some(server) = patch.server {
            if let Some(role) = server.role {
                self.server.role = role;
            }
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(session_ttl_secs) = server.session_ttl_secs {
                self.server.session_ttl_secs = session_ttl_secs;
            }
            if let Some(sweep_interval_secs) = server.sweep_interval_secs {
                self.server.sweep_interval_secs = sweep_interval_secs;
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
        if let Some(value) = read_env("CONCIERGE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CONCIERGE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("CONCIERGE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("CONCIERGE_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_AGENT_DOMAIN") {
            self.agent.domain = value;
        }
        if let Some(value) = read_env("CONCIERGE_AGENT_MAX_ITERATIONS") {
            self.agent.max_iterations = parse_u32("CONCIERGE_AGENT_MAX_ITERATIONS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_AGENT_COMPLETION_TIMEOUT_SECS") {
            self.agent.completion_timeout_secs =
                parse_u64("CONCIERGE_AGENT_COMPLETION_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_AGENT_SYSTEM_INSTRUCTION") {
            self.agent.system_instruction = Some(value);
        }

        if let Some(value) = read_env("CONCIERGE_ROUTER_SELECTION") {
            self.router.selection = value.parse()?;
        }
        if let Some(value) = read_env("CONCIERGE_ROUTER_DEFAULT_DOMAIN") {
            self.router.default_domain = Some(value);
        }
        if let Some(value) = read_env("CONCIERGE_ROUTER_DOMAINS") {
            self.router.domains = parse_domain_list("CONCIERGE_ROUTER_DOMAINS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_ROUTER_REMOTE_TIMEOUT_SECS") {
            self.router.remote_timeout_secs =
                parse_u64("CONCIERGE_ROUTER_REMOTE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_ROUTER_RETRY_BACKOFF_MS") {
            self.router.retry_backoff_ms = parse_u64("CONCIERGE_ROUTER_RETRY_BACKOFF_MS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_ROUTER_DISCOVER_AGENT_CARDS") {
            self.router.discover_agent_cards =
                parse_bool("CONCIERGE_ROUTER_DISCOVER_AGENT_CARDS", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_SERVER_ROLE") {
            self.server.role = value.parse()?;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_PORT") {
            self.server.port = parse_u16("CONCIERGE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_SESSION_TTL_SECS") {
            self.server.session_ttl_secs = parse_u64("CONCIERGE_SERVER_SESSION_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_SWEEP_INTERVAL_SECS") {
            self.server.sweep_interval_secs =
                parse_u64("CONCIERGE_SERVER_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("CONCIERGE_LOGGING_LEVEL").or_else(|| read_env("CONCIERGE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CONCIERGE_LOGGING_FORMAT").or_else(|| read_env("CONCIERGE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(agent_domain) = overrides.agent_domain {
            self.agent.domain = agent_domain;
        }
        if let Some(router_selection) = overrides.router_selection {
            self.router.selection = router_selection;
        }
        if let Some(server_role) = overrides.server_role {
            self.server.role = server_role;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_agent(&self.agent)?;
        validate_router(&self.router)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("concierge.toml"), PathBuf::from("config/concierge.toml")]
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

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if !is_http_url(&llm.base_url) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.provider == LlmProvider::OpenAi {
        let missing = llm
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.api_key is required for the openai provider (set CONCIERGE_LLM_API_KEY)"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.domain.trim().is_empty() {
        return Err(ConfigError::Validation("agent.domain must not be empty".to_string()));
    }

    if agent.max_iterations == 0 || agent.max_iterations > 32 {
        return Err(ConfigError::Validation(
            "agent.max_iterations must be in range 1..=32".to_string(),
        ));
    }

    if agent.completion_timeout_secs == 0 || agent.completion_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "agent.completion_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_router(router: &RouterConfig) -> Result<(), ConfigError> {
    if router.domains.is_empty() {
        return Err(ConfigError::Validation(
            "router.domains must list at least one domain".to_string(),
        ));
    }

    let mut seen = BTreeSet::new();
    for entry in &router.domains {
        if entry.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "router.domains[].id must not be empty".to_string(),
            ));
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "router.domains contains duplicate id `{}`",
                entry.id
            )));
        }
        if !is_http_url(&entry.address) {
            return Err(ConfigError::Validation(format!(
                "router.domains `{}` address must start with http:// or https://",
                entry.id
            )));
        }
    }

    match &router.default_domain {
        Some(default_domain) if !seen.contains(default_domain.as_str()) => {
            return Err(ConfigError::Validation(format!(
                "router.default_domain `{default_domain}` is not one of the configured domains"
            )));
        }
        None if router.selection == SelectionPolicy::Fixed => {
            return Err(ConfigError::Validation(
                "router.default_domain is required when router.selection is `fixed`".to_string(),
            ));
        }
        _ => {}
    }

    if router.remote_timeout_secs == 0 || router.remote_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "router.remote_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if router.retry_backoff_ms > 10_000 {
        return Err(ConfigError::Validation(
            "router.retry_backoff_ms must be at most 10000".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.session_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "server.session_ttl_secs must be greater than zero".to_string(),
        ));
    }

    if server.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "server.sweep_interval_secs must be greater than zero".to_string(),
        ));
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_env(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_env(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_env(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_env(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_env(key, value))
}

/// Parses `id=url,id=url`. Intents are left empty; agent cards or the file fill them in.
fn parse_domain_list(key: &str, value: &str) -> Result<Vec<DomainEntry>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (id, address) = item.split_once('=').ok_or_else(|| invalid_env(key, value))?;
            let (id, address) = (id.trim(), address.trim());
            if id.is_empty() || address.is_empty() {
                return Err(invalid_env(key, value));
            }
            Ok(DomainEntry {
                id: id.to_string(),
                address: address.to_string(),
                intents: Vec::new(),
                description: None,
            })
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    agent: Option<AgentPatch>,
    router: Option<RouterPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    domain: Option<String>,
    max_iterations: Option<u32>,
    completion_timeout_secs: Option<u64>,
    system_instruction: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RouterPatch {
    selection: Option<SelectionPolicy>,
    default_domain: Option<String>,
    domains: Option<Vec<DomainEntry>>,
    remote_timeout_secs: Option<u64>,
    retry_backoff_ms: Option<u64>,
    discover_agent_cards: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    role: Option<ServerRole>,
    bind_address: Option<String>,
    port: Option<u16>,
    session_ttl_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
