use async_trait::async_trait;
use concierge_core::domain::session::Transcript;
use concierge_core::domain::tool::ToolSpec;
use serde_json::Value;
use thiserror::Error;

pub mod openai;

pub use openai::OpenAiCompatibleClient;

/// Everything the completion service sees for one iteration of the turn loop.
#[derive(Clone, Copy, Debug)]
pub struct CompletionRequest<'a> {
    pub transcript: &'a Transcript,
    pub tools: &'a [ToolSpec],
    pub system_instruction: &'a str,
}

/// Either a final reply or a request to invoke one tool. Arguments are untrusted raw
/// JSON until the gate validates them against the tool's schema.
#[derive(Clone, Debug, PartialEq)]
pub enum CompletionResult {
    Text(String),
    ToolCall { tool_name: String, arguments: Value },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionErrorKind {
    /// Connection failures and timeouts.
    Network,
    /// 429
    RateLimit,
    /// 5xx
    ServerError,
    /// 401, 403
    Auth,
    /// 400, or a response the client could not interpret.
    InvalidResponse,
}

impl CompletionErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::RateLimit | Self::ServerError)
    }
}

#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct CompletionError {
    pub kind: CompletionErrorKind,
    pub message: String,
}

impl CompletionError {
    pub fn new(kind: CompletionErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::Network, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::InvalidResponse, message)
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> Result<CompletionResult, CompletionError>;
}
