use std::time::Duration;

use async_trait::async_trait;
use concierge_core::domain::descriptor::{AgentCard, DomainDescriptor};
use concierge_core::domain::exchange::{ErrorBody, TurnRequest, TurnResponse};
use reqwest::{Client, StatusCode};
use thiserror::Error;

pub const TURNS_PATH: &str = "/v1/turns";
pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("agent unreachable: {0}")]
    Unreachable(String),
    #[error("agent timed out: {0}")]
    Timeout(String),
    #[error("agent server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("agent no longer has this session")]
    SessionExpired,
    #[error("agent rejected the request {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("could not decode agent response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Failures where a second attempt may reach a healthy agent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_) | Self::Server { .. })
    }
}

#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn send_turn(
        &self,
        descriptor: &DomainDescriptor,
        request: &TurnRequest,
    ) -> Result<TurnResponse, TransportError>;

    async fn fetch_card(&self, descriptor: &DomainDescriptor) -> Result<AgentCard, TransportError>;
}

pub struct HttpAgentTransport {
    client: Client,
}

impl HttpAgentTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| TransportError::Unreachable(format!("http client setup: {error}")))?;
        Ok(Self { client })
    }

    async fn read_error(status: StatusCode, response: reqwest::Response) -> TransportError {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|parsed| format!("{}: {}", parsed.error_class, parsed.reply))
            .unwrap_or(body);

        match status {
            StatusCode::GONE => TransportError::SessionExpired,
            status if status.is_server_error() => {
                TransportError::Server { status: status.as_u16(), message }
            }
            status => TransportError::Rejected { status: status.as_u16(), message },
        }
    }
}

fn request_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() || error.is_request() {
        TransportError::Unreachable(error.to_string())
    } else {
        TransportError::Decode(error.to_string())
    }
}

#[async_trait]
impl AgentTransport for HttpAgentTransport {
    async fn send_turn(
        &self,
        descriptor: &DomainDescriptor,
        request: &TurnRequest,
    ) -> Result<TurnResponse, TransportError> {
        let url = format!("{}{TURNS_PATH}", descriptor.network_address);
        let response =
            self.client.post(&url).json(request).send().await.map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::read_error(status, response).await);
        }
        response
            .json::<TurnResponse>()
            .await
            .map_err(|error| TransportError::Decode(error.to_string()))
    }

    async fn fetch_card(&self, descriptor: &DomainDescriptor) -> Result<AgentCard, TransportError> {
        let url = format!("{}{AGENT_CARD_PATH}", descriptor.network_address);
        let response = self.client.get(&url).send().await.map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::read_error(status, response).await);
        }
        response
            .json::<AgentCard>()
            .await
            .map_err(|error| TransportError::Decode(error.to_string()))
    }
}
