use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::confirmation::{CommittedAction, PendingConfirmation};
use crate::domain::descriptor::DomainId;
use crate::domain::session::{Session, SessionId, ToolOutcome, ToolRecord, Turn};

use super::{SessionStore, StoreError};

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    async fn update<F>(&self, id: &SessionId, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Session) + Send,
    {
        let mut sessions = self.sessions.write().await;
        let session =
            sessions.get_mut(id).ok_or_else(|| StoreError::SessionNotFound(id.clone()))?;
        apply(session);
        session.last_active_at = Utc::now();
        Ok(())
    }
}

#[async_trait::async_trait]
impl super::SessionStore for InMemorySessionStore {
    async fn get(&self, id: &SessionId) -> Session {
        if let Some(session) = self.sessions.read().await.get(id) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions.entry(id.clone()).or_insert_with(|| Session::new(id.clone())).clone()
    }

    async fn find(&self, id: &SessionId) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn append_turn(&self, id: &SessionId, turn: Turn) -> Result<(), StoreError> {
        self.update(id, |session| session.transcript.append(turn)).await
    }

    async fn set_target_domain(
        &self,
        id: &SessionId,
        domain: Option<DomainId>,
    ) -> Result<(), StoreError> {
        self.update(id, |session| session.target_domain = domain).await
    }

    async fn set_pending_confirmation(
        &self,
        id: &SessionId,
        pending: Option<PendingConfirmation>,
    ) -> Result<(), StoreError> {
        self.update(id, |session| session.pending_confirmation = pending).await
    }

    async fn pending_confirmation(
        &self,
        id: &SessionId,
    ) -> Result<Option<PendingConfirmation>, StoreError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .map(|session| session.pending_confirmation.clone())
            .ok_or_else(|| StoreError::SessionNotFound(id.clone()))
    }

    async fn record_commit(
        &self,
        id: &SessionId,
        action: CommittedAction,
    ) -> Result<(), StoreError> {
        self.update(id, |session| {
            session.pending_confirmation = None;
            session.transcript.append(Turn::tool_annotation(ToolRecord {
                tool_name: action.tool_name.clone(),
                arguments: action.arguments.clone(),
                outcome: ToolOutcome::Committed { action },
            }));
        })
        .await
    }

    async fn purge(&self, id: &SessionId) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    async fn evict_idle(&self, max_idle: Duration) -> usize {
        let Ok(max_idle) = chrono::Duration::from_std(max_idle) else {
            return 0;
        };
        let cutoff = Utc::now() - max_idle;

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_active_at > cutoff);
        before - sessions.len()
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl InMemorySessionStore {
    /// Convenience for callers holding the concrete type.
    pub async fn session(&self, id: &SessionId) -> Option<Session> {
        SessionStore::find(self, id).await
    }
}
