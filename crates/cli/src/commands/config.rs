use std::env;
use std::fs;
use std::path::Path;

use concierge_core::config::{AppConfig, LoadOptions, LogFormat};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    render(&config, AppConfig::resolved_path(None).as_deref())
}

pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);
    let source = |key: &str, env_key: &str| {
        field_source(key, Some(env_key), config_file_doc.as_ref(), config_file_path)
    };

    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let domains = config
        .router
        .domains
        .iter()
        .map(|entry| format!("{}@{}", entry.id, entry.address))
        .collect::<Vec<_>>()
        .join(", ");

    let entries: Vec<(&str, String, &str)> = vec![
        ("llm.provider", config.llm.provider.as_str().to_string(), "CONCIERGE_LLM_PROVIDER"),
        ("llm.model", config.llm.model.clone(), "CONCIERGE_LLM_MODEL"),
        ("llm.base_url", config.llm.base_url.clone(), "CONCIERGE_LLM_BASE_URL"),
        ("llm.api_key", api_key, "CONCIERGE_LLM_API_KEY"),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), "CONCIERGE_LLM_TIMEOUT_SECS"),
        ("agent.domain", config.agent.domain.clone(), "CONCIERGE_AGENT_DOMAIN"),
        (
            "agent.max_iterations",
            config.agent.max_iterations.to_string(),
            "CONCIERGE_AGENT_MAX_ITERATIONS",
        ),
        (
            "agent.completion_timeout_secs",
            config.agent.completion_timeout_secs.to_string(),
            "CONCIERGE_AGENT_COMPLETION_TIMEOUT_SECS",
        ),
        (
            "router.selection",
            config.router.selection.as_str().to_string(),
            "CONCIERGE_ROUTER_SELECTION",
        ),
        (
            "router.default_domain",
            config.router.default_domain.clone().unwrap_or_else(|| "<unset>".to_string()),
            "CONCIERGE_ROUTER_DEFAULT_DOMAIN",
        ),
        ("router.domains", domains, "CONCIERGE_ROUTER_DOMAINS"),
        (
            "router.retry_backoff_ms",
            config.router.retry_backoff_ms.to_string(),
            "CONCIERGE_ROUTER_RETRY_BACKOFF_MS",
        ),
        ("server.role", config.server.role.as_str().to_string(), "CONCIERGE_SERVER_ROLE"),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            "CONCIERGE_SERVER_BIND_ADDRESS",
        ),
        ("server.port", config.server.port.to_string(), "CONCIERGE_SERVER_PORT"),
        (
            "server.session_ttl_secs",
            config.server.session_ttl_secs.to_string(),
            "CONCIERGE_SERVER_SESSION_TTL_SECS",
        ),
        ("logging.level", config.logging.level.clone(), "CONCIERGE_LOGGING_LEVEL"),
        (
            "logging.format",
            log_format_label(config.logging.format).to_string(),
            "CONCIERGE_LOGGING_FORMAT",
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in entries {
        lines.push(render_line(key, &value, source(key, env_key)));
    }
    lines.join("\n")
}

fn log_format_label(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
