use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use concierge_agent::runtime::AgentRuntime;
use concierge_core::domain::descriptor::AgentCard;
use concierge_core::domain::exchange::{TurnRequest, TurnResponse};
use uuid::Uuid;

use crate::api_error::{bad_request, into_api_error, ApiError};

#[derive(Clone)]
pub struct AgentState {
    pub runtime: Arc<AgentRuntime>,
    pub card: Arc<AgentCard>,
}

pub fn router(state: AgentState) -> Router {
    Router::new()
        .route("/v1/turns", post(handle_turn))
        .route("/.well-known/agent.json", get(agent_card))
        .with_state(state)
}

pub async fn handle_turn(
    State(state): State<AgentState>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    if request.session_id.as_str().trim().is_empty() {
        return Err(bad_request("session_id is required", &Uuid::new_v4().to_string()));
    }
    if request.text.trim().is_empty() {
        return Err(bad_request("text is required", &Uuid::new_v4().to_string()));
    }

    match state.runtime.handle_turn(&request.session_id, &request.text).await {
        Ok(reply) => Ok(Json(reply.into_response())),
        Err(error) => {
            let correlation_id = Uuid::new_v4().to_string();
            tracing::warn!(
                event_name = "agent.turn_rejected",
                correlation_id = %correlation_id,
                session_id = %request.session_id,
                error_class = error.error_class(),
                error = %error,
                "turn failed"
            );
            Err(into_api_error(error, &correlation_id))
        }
    }
}

pub async fn agent_card(State(state): State<AgentState>) -> Json<AgentCard> {
    Json(state.card.as_ref().clone())
}
