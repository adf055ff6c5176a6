use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::session::SessionId;

/// Serializes turns per session. A second turn for the same session waits until the
/// guard of the first is dropped; different sessions never contend.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
}

pub type TurnGuard = OwnedMutexGuard<()>;

impl SessionLocks {
    pub async fn acquire(&self, id: &SessionId) -> TurnGuard {
        let lock = {
            let mut locks = match self.locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks.entry(id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drops lock entries no task currently holds or waits on.
    pub fn prune(&self) -> usize {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    pub fn len(&self) -> usize {
        match self.locks.lock() {
            Ok(locks) => locks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex;

    use crate::domain::session::SessionId;

    use super::SessionLocks;

    #[tokio::test]
    async fn same_session_turns_do_not_interleave() {
        let locks = Arc::new(SessionLocks::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        let session = SessionId::from("S-1");

        let mut handles = Vec::new();
        for turn in 0..3 {
            let locks = Arc::clone(&locks);
            let log = Arc::clone(&log);
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&session).await;
                log.lock().await.push(format!("start-{turn}"));
                tokio::time::sleep(Duration::from_millis(10)).await;
                log.lock().await.push(format!("end-{turn}"));
            }));
        }
        for handle in handles {
            handle.await.expect("turn task should finish");
        }

        let log = log.lock().await;
        for pair in log.chunks(2) {
            let start = pair[0].trim_start_matches("start-");
            let end = pair[1].trim_start_matches("end-");
            assert_eq!(start, end, "turns for one session must not interleave: {log:?}");
        }
    }

    #[tokio::test]
    async fn different_sessions_proceed_independently() {
        let locks = SessionLocks::default();
        let _first = locks.acquire(&SessionId::from("S-1")).await;
        let second = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&SessionId::from("S-2")),
        )
        .await;

        assert!(second.is_ok(), "an unrelated session should not wait");
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let locks = SessionLocks::default();
        let held = locks.acquire(&SessionId::from("S-1")).await;
        drop(locks.acquire(&SessionId::from("S-2")).await);

        assert_eq!(locks.prune(), 1);
        assert_eq!(locks.len(), 1);
        drop(held);
        assert_eq!(locks.prune(), 1);
        assert!(locks.is_empty());
    }
}
