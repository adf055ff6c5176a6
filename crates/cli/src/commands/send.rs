use std::time::Duration;

use concierge_core::config::{AppConfig, LoadOptions};
use concierge_core::domain::exchange::{ErrorBody, TurnResponse};
use serde_json::json;

use super::CommandResult;

const COMMAND: &str = "send";

pub fn run(text: &str, session_id: Option<&str>, router_url: Option<&str>) -> CommandResult {
    let (base_url, timeout) = match router_url {
        Some(url) => (url.trim_end_matches('/').to_string(), Duration::from_secs(60)),
        None => match AppConfig::load(LoadOptions::default()) {
            Ok(config) => (default_router_url(&config), request_timeout(&config)),
            Err(error) => {
                return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
            }
        },
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                5,
            );
        }
    };

    runtime.block_on(send(&base_url, text, session_id, timeout))
}

async fn send(
    base_url: &str,
    text: &str,
    session_id: Option<&str>,
    timeout: Duration,
) -> CommandResult {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(COMMAND, "http_client", error.to_string(), 5);
        }
    };

    let url = format!("{base_url}/v1/messages");
    let response = match client
        .post(&url)
        .json(&json!({ "session_id": session_id, "text": text }))
        .send()
        .await
    {
        Ok(response) => response,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "router_unreachable",
                format!("{url} unreachable: {error}"),
                3,
            );
        }
    };

    let status = response.status();
    if !status.is_success() {
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => format!("{} (correlation id {})", body.reply, body.correlation_id),
            Err(_) => format!("router answered {status}"),
        };
        return CommandResult::failure(COMMAND, "router_error", message, 4);
    }

    match response.json::<TurnResponse>().await {
        Ok(turn) => CommandResult::success(
            COMMAND,
            format!(
                "[{}] {} (session: {}, status: {})",
                turn.domain,
                turn.reply,
                turn.session_id,
                turn.status.as_str()
            ),
        ),
        Err(error) => CommandResult::failure(
            COMMAND,
            "router_error",
            format!("could not decode router reply: {error}"),
            4,
        ),
    }
}

fn default_router_url(config: &AppConfig) -> String {
    let host = match config.server.bind_address.as_str() {
        "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
        other => other,
    };
    format!("http://{host}:{}", config.server.port)
}

/// Enough for the router's two forwarding attempts plus backoff.
fn request_timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.router.remote_timeout_secs.saturating_mul(2).saturating_add(5))
}
