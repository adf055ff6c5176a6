use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::confirmation::{CommittedAction, PendingConfirmation};
use crate::domain::descriptor::DomainId;
use crate::domain::session::{Session, SessionId, Turn};
use crate::errors::TurnError;

pub mod locks;
pub mod memory;

pub use locks::SessionLocks;
pub use memory::InMemorySessionStore;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("session `{0}` not found")]
    SessionNotFound(SessionId),
}

impl From<StoreError> for TurnError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::SessionNotFound(id) => TurnError::SessionNotFound(id),
        }
    }
}

/// Per-session conversational state. Every mutation is applied atomically; readers
/// always observe a transcript that is a prefix of every later snapshot.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the session, creating an empty one on first access.
    async fn get(&self, id: &SessionId) -> Session;

    /// Returns the session without creating it.
    async fn find(&self, id: &SessionId) -> Option<Session>;

    async fn append_turn(&self, id: &SessionId, turn: Turn) -> Result<(), StoreError>;

    async fn set_target_domain(
        &self,
        id: &SessionId,
        domain: Option<DomainId>,
    ) -> Result<(), StoreError>;

    async fn set_pending_confirmation(
        &self,
        id: &SessionId,
        pending: Option<PendingConfirmation>,
    ) -> Result<(), StoreError>;

    async fn pending_confirmation(
        &self,
        id: &SessionId,
    ) -> Result<Option<PendingConfirmation>, StoreError>;

    /// Clears the pending confirmation and appends the committed-action annotation in
    /// one step.
    async fn record_commit(
        &self,
        id: &SessionId,
        action: CommittedAction,
    ) -> Result<(), StoreError>;

    /// Removes a session. Returns whether it existed.
    async fn purge(&self, id: &SessionId) -> bool;

    /// Purges sessions with no activity for at least `max_idle`. Returns the count.
    async fn evict_idle(&self, max_idle: Duration) -> usize;

    async fn len(&self) -> usize;
}
