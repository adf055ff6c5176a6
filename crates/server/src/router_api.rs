use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use concierge_core::domain::descriptor::DomainDescriptor;
use concierge_core::domain::exchange::TurnResponse;
use concierge_core::domain::session::SessionId;
use concierge_router::Dispatcher;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api_error::{bad_request, into_api_error, ApiError};

#[derive(Clone)]
pub struct RouterState {
    pub dispatcher: Arc<Dispatcher>,
}

/// Caller-facing message. A missing session id starts a new conversation.
#[derive(Clone, Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub session_id: Option<SessionId>,
    pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DomainsResponse {
    pub default_domain: Option<String>,
    pub domains: Vec<DomainDescriptor>,
}

pub fn router(state: RouterState) -> Router {
    Router::new()
        .route("/v1/messages", post(post_message))
        .route("/v1/domains", get(list_domains))
        .with_state(state)
}

pub async fn post_message(
    State(state): State<RouterState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    if request.text.trim().is_empty() {
        return Err(bad_request("text is required", &Uuid::new_v4().to_string()));
    }
    let session_id = request
        .session_id
        .filter(|session_id| !session_id.as_str().trim().is_empty())
        .unwrap_or_else(SessionId::generate);

    match state.dispatcher.route(&session_id, &request.text).await {
        Ok(response) => Ok(Json(response)),
        Err(error) => {
            let correlation_id = Uuid::new_v4().to_string();
            tracing::warn!(
                event_name = "router.message_failed",
                correlation_id = %correlation_id,
                session_id = %session_id,
                error_class = error.error_class(),
                error = %error,
                "message could not be routed"
            );
            Err(into_api_error(error, &correlation_id))
        }
    }
}

pub async fn list_domains(State(state): State<RouterState>) -> Json<DomainsResponse> {
    let directory = state.dispatcher.directory();
    Json(DomainsResponse {
        default_domain: directory.default_domain().map(ToString::to_string),
        domains: directory.descriptors().to_vec(),
    })
}
