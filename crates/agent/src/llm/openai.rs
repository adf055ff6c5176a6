//! Chat-completions client for OpenAI and OpenAI-compatible servers (Ollama's `/v1`).

use std::time::Duration;

use async_trait::async_trait;
use concierge_core::config::LlmConfig;
use concierge_core::domain::session::{Transcript, TurnRole};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{
    CompletionError, CompletionErrorKind, CompletionRequest, CompletionResult, CompletionService,
};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

pub struct OpenAiCompatibleClient {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| CompletionError::network(format!("http client setup: {error}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn translate_request(&self, request: &CompletionRequest<'_>) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.transcript.len() + 1);
        if !request.system_instruction.is_empty() {
            messages.push(ChatMessage::text("system", request.system_instruction));
        }
        messages.extend(translate_transcript(request.transcript));

        let tools = request
            .tools
            .iter()
            .map(|spec| ChatTool {
                r#type: "function".to_string(),
                function: ChatFunction {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: spec.parameters.to_json_schema(),
                },
            })
            .collect::<Vec<_>>();

        ChatRequest {
            model: self.model.clone(),
            messages,
            tools: (!tools.is_empty()).then_some(tools),
            stream: false,
        }
    }

    async fn send_once(&self, body: &ChatRequest) -> Result<CompletionResult, CompletionError> {
        let mut builder = self.client.post(&self.endpoint).json(body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder.send().await.map_err(|error| {
            if error.is_timeout() {
                CompletionError::network(format!("request timeout: {error}"))
            } else if error.is_connect() {
                CompletionError::network(format!("connection failed: {error}"))
            } else {
                CompletionError::invalid_response(format!("request failed: {error}"))
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            CompletionError::network(format!("failed to read response: {error}"))
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ChatErrorResponse>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            let kind = match status.as_u16() {
                401 | 403 => CompletionErrorKind::Auth,
                429 => CompletionErrorKind::RateLimit,
                500..=599 => CompletionErrorKind::ServerError,
                _ => CompletionErrorKind::InvalidResponse,
            };
            return Err(CompletionError::new(kind, format!("HTTP {status}: {message}")));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|error| {
            CompletionError::invalid_response(format!("failed to parse response: {error}"))
        })?;
        normalize_response(parsed)
    }
}

#[async_trait]
impl CompletionService for OpenAiCompatibleClient {
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> Result<CompletionResult, CompletionError> {
        let body = self.translate_request(&request);
        let mut attempt = 0;

        loop {
            match self.send_once(&body).await {
                Ok(result) => return Ok(result),
                Err(error) if error.kind.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        event_name = "llm.completion_retry",
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "retrying completion request"
                    );
                    tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Tool annotations become an assistant `tool_calls` message followed by the matching
/// `tool` result message; ids are derived from the turn position so they stay stable.
fn translate_transcript(transcript: &Transcript) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(transcript.len());

    for (index, turn) in transcript.turns().iter().enumerate() {
        match (&turn.role, &turn.tool) {
            (TurnRole::User, _) => messages.push(ChatMessage::text("user", &turn.text)),
            (TurnRole::Agent, None) => messages.push(ChatMessage::text("assistant", &turn.text)),
            (TurnRole::Agent, Some(record)) => {
                let call_id = format!("call_{index}");
                messages.push(ChatMessage {
                    role: "assistant".to_string(),
                    content: None,
                    tool_calls: Some(vec![ChatToolCall {
                        id: call_id.clone(),
                        r#type: "function".to_string(),
                        function: ChatFunctionCall {
                            name: record.tool_name.clone(),
                            arguments: record.arguments.to_json().to_string(),
                        },
                    }]),
                    tool_call_id: None,
                });
                messages.push(ChatMessage {
                    role: "tool".to_string(),
                    content: Some(turn.text.clone()),
                    tool_calls: None,
                    tool_call_id: Some(call_id),
                });
            }
        }
    }

    messages
}

fn normalize_response(response: ChatResponse) -> Result<CompletionResult, CompletionError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::invalid_response("no choices in response"))?;

    // Only the first call is honoured; the loop asks again after each tool result.
    if let Some(call) = choice.message.tool_calls.and_then(|calls| calls.into_iter().next()) {
        if !call.function.name.is_empty() {
            let arguments = if call.function.arguments.trim().is_empty() {
                serde_json::Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(&call.function.arguments).map_err(|error| {
                    CompletionError::invalid_response(format!(
                        "tool call arguments are not JSON: {error}"
                    ))
                })?
            };
            return Ok(CompletionResult::ToolCall { tool_name: call.function.name, arguments });
        }
    }

    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(CompletionResult::Text(text)),
        _ => Err(CompletionError::invalid_response("response had neither text nor a tool call")),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool>>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatTool {
    r#type: String,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ChatFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatErrorResponse {
    error: ChatErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ChatErrorDetail {
    message: String,
}
