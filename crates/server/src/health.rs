use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use concierge_core::config::ServerRole;
use concierge_core::store::SessionStore;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pub role: ServerRole,
    pub detail: String,
    pub store: Arc<dyn SessionStore>,
    /// Domains this process can serve or forward to.
    pub domains: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub role: &'static str,
    pub service: HealthCheck,
    pub domains: HealthCheck,
    pub active_sessions: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let domains = if state.domains > 0 {
        HealthCheck { status: "ready", detail: format!("{} domain(s) configured", state.domains) }
    } else {
        HealthCheck { status: "degraded", detail: "no domains configured".to_string() }
    };
    let ready = domains.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        role: state.role.as_str(),
        service: HealthCheck { status: "ready", detail: state.detail.clone() },
        domains,
        active_sessions: state.store.len().await,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use concierge_core::config::ServerRole;
    use concierge_core::domain::session::SessionId;
    use concierge_core::store::{InMemorySessionStore, SessionStore};

    use crate::health::{health, HealthState};

    fn state(domains: usize) -> HealthState {
        HealthState {
            role: ServerRole::Router,
            detail: "router initialized".to_string(),
            store: Arc::new(InMemorySessionStore::default()),
            domains,
        }
    }

    #[tokio::test]
    async fn health_returns_ready_with_domains() {
        let state = state(2);
        state.store.get(&SessionId::from("S-1")).await;

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.role, "router");
        assert_eq!(payload.active_sessions, 1);
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_without_domains() {
        let (status, Json(payload)) = health(State(state(0))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.domains.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
