use std::sync::Arc;
use std::time::Duration;

use concierge_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use concierge_core::config::SelectionPolicy;
use concierge_core::domain::descriptor::{DomainDescriptor, DomainId};
use concierge_core::domain::exchange::{TurnRequest, TurnResponse};
use concierge_core::domain::session::{SessionId, Turn};
use concierge_core::errors::TurnError;
use concierge_core::store::{SessionLocks, SessionStore};
use rand::Rng;
use uuid::Uuid;

use crate::directory::DomainDirectory;
use crate::selection::DomainSelector;
use crate::transport::{AgentTransport, TransportError};

const ACTOR: &str = "router";

pub struct Dispatcher {
    directory: DomainDirectory,
    selector: Arc<dyn DomainSelector>,
    transport: Arc<dyn AgentTransport>,
    store: Arc<dyn SessionStore>,
    audit: Arc<dyn AuditSink>,
    locks: SessionLocks,
    retry_backoff: Duration,
}

impl Dispatcher {
    pub fn new(
        directory: DomainDirectory,
        selector: Arc<dyn DomainSelector>,
        transport: Arc<dyn AgentTransport>,
        store: Arc<dyn SessionStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            directory,
            selector,
            transport,
            store,
            audit,
            locks: SessionLocks::default(),
            retry_backoff: Duration::from_millis(250),
        }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn directory(&self) -> &DomainDirectory {
        &self.directory
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn locks(&self) -> &SessionLocks {
        &self.locks
    }

    /// Forwards one user message to the session's domain and returns the agent's reply.
    pub async fn route(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<TurnResponse, TurnError> {
        let _guard = self.locks.acquire(session_id).await;
        let context = AuditContext::new(session_id.clone(), Uuid::new_v4().to_string(), ACTOR);

        let session = self.store.get(session_id).await;
        let descriptor =
            self.resolve_domain(session.target_domain.as_ref(), text, &context).await?;
        if session.target_domain.as_ref() != Some(&descriptor.domain_id) {
            self.store.set_target_domain(session_id, Some(descriptor.domain_id.clone())).await?;
        }

        let request = TurnRequest { session_id: session_id.clone(), text: text.to_string() };
        let response = match self.forward(&descriptor, &request, &context).await {
            Ok(response) => response,
            Err(TransportError::SessionExpired) => {
                self.store.purge(session_id).await;
                self.audit.emit(
                    context
                        .event(
                            "router.session_expired",
                            AuditCategory::Routing,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("domain", descriptor.domain_id.as_str()),
                );
                return Err(TurnError::SessionNotFound(session_id.clone()));
            }
            Err(error) => {
                self.audit.emit(
                    context
                        .event(
                            "router.domain_unavailable",
                            AuditCategory::Routing,
                            AuditOutcome::Failed,
                        )
                        .with_metadata("domain", descriptor.domain_id.as_str())
                        .with_metadata("error", error.to_string()),
                );
                tracing::error!(
                    event_name = "router.domain_unavailable",
                    correlation_id = %context.correlation_id,
                    session_id = %session_id,
                    domain = %descriptor.domain_id,
                    error = %error,
                    "domain agent unavailable"
                );
                return Err(TurnError::DomainUnavailable {
                    domain: descriptor.domain_id.clone(),
                    reason: error.to_string(),
                });
            }
        };

        // Only exchanges the agent answered enter the router transcript.
        self.store.append_turn(session_id, Turn::user(text)).await?;
        self.store.append_turn(session_id, Turn::agent(response.reply.clone())).await?;
        tracing::info!(
            event_name = "router.turn_forwarded",
            correlation_id = %context.correlation_id,
            session_id = %session_id,
            domain = %descriptor.domain_id,
            status = response.status.as_str(),
            "turn forwarded"
        );
        Ok(response)
    }

    async fn resolve_domain(
        &self,
        current: Option<&DomainId>,
        text: &str,
        context: &AuditContext,
    ) -> Result<DomainDescriptor, TurnError> {
        let current = current.and_then(|domain| self.directory.get(domain));

        let chosen = match current {
            Some(descriptor)
                if self.selector.policy() == SelectionPolicy::Fixed
                    || !self.directory.should_reoffer(&descriptor.domain_id, text) =>
            {
                return Ok(descriptor.clone());
            }
            _ => self.selector.select(&self.directory, text).await,
        };

        let fallback =
            || self.directory.default_domain().and_then(|domain| self.directory.get(domain));
        let descriptor = chosen
            .as_ref()
            .and_then(|domain| self.directory.get(domain))
            .or_else(fallback)
            .ok_or_else(|| TurnError::DomainUnavailable {
                domain: DomainId::from("unassigned"),
                reason: "no domains are configured".to_string(),
            })?;

        let previous = current.map(|descriptor| descriptor.domain_id.as_str()).unwrap_or("none");
        if previous != descriptor.domain_id.as_str() {
            self.audit.emit(
                context
                    .event("router.domain_selected", AuditCategory::Routing, AuditOutcome::Success)
                    .with_metadata("domain", descriptor.domain_id.as_str())
                    .with_metadata("previous_domain", previous)
                    .with_metadata("policy", self.selector.policy().as_str()),
            );
            tracing::info!(
                event_name = "router.domain_selected",
                correlation_id = %context.correlation_id,
                session_id = %context.session_id,
                domain = %descriptor.domain_id,
                previous_domain = previous,
                "domain selected"
            );
        }
        Ok(descriptor.clone())
    }

    async fn forward(
        &self,
        descriptor: &DomainDescriptor,
        request: &TurnRequest,
        context: &AuditContext,
    ) -> Result<TurnResponse, TransportError> {
        match self.transport.send_turn(descriptor, request).await {
            Err(error) if error.is_retryable() => {
                let delay = self.backoff_with_jitter();
                tracing::warn!(
                    event_name = "router.forward_retry",
                    correlation_id = %context.correlation_id,
                    session_id = %context.session_id,
                    domain = %descriptor.domain_id,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "forward failed; retrying once"
                );
                tokio::time::sleep(delay).await;
                self.transport.send_turn(descriptor, request).await
            }
            result => result,
        }
    }

    fn backoff_with_jitter(&self) -> Duration {
        let base = self.retry_backoff.as_millis() as u64;
        let jitter = if base >= 2 { rand::thread_rng().gen_range(0..=base / 2) } else { 0 };
        Duration::from_millis(base + jitter)
    }
}
