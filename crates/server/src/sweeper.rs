use std::sync::Arc;
use std::time::Duration;

use concierge_agent::runtime::AgentRuntime;
use concierge_core::store::{SessionLocks, SessionStore};
use concierge_router::Dispatcher;
use tokio::task::JoinHandle;

/// A component that owns a session store and the per-session turn locks guarding it.
pub trait SessionHost: Send + Sync {
    fn store(&self) -> &Arc<dyn SessionStore>;
    fn locks(&self) -> &SessionLocks;
}

impl SessionHost for AgentRuntime {
    fn store(&self) -> &Arc<dyn SessionStore> {
        AgentRuntime::store(self)
    }

    fn locks(&self) -> &SessionLocks {
        AgentRuntime::locks(self)
    }
}

impl SessionHost for Dispatcher {
    fn store(&self) -> &Arc<dyn SessionStore> {
        Dispatcher::store(self)
    }

    fn locks(&self) -> &SessionLocks {
        Dispatcher::locks(self)
    }
}

/// Evicts idle sessions on a fixed interval until the task is aborted.
pub fn spawn<H>(host: Arc<H>, ttl: Duration, interval: Duration) -> JoinHandle<()>
where
    H: SessionHost + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_once(host.as_ref(), ttl).await;
        }
    })
}

pub async fn sweep_once(host: &dyn SessionHost, ttl: Duration) -> usize {
    let evicted = host.store().evict_idle(ttl).await;
    let pruned = host.locks().prune();
    if evicted > 0 || pruned > 0 {
        tracing::info!(
            event_name = "system.sweeper.evicted",
            correlation_id = "sweeper",
            evicted,
            pruned_locks = pruned,
            ttl_secs = ttl.as_secs(),
            "idle sessions evicted"
        );
    }
    evicted
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use concierge_core::domain::session::SessionId;
    use concierge_core::store::{InMemorySessionStore, SessionLocks, SessionStore};

    use super::{sweep_once, SessionHost};

    struct Host {
        store: Arc<dyn SessionStore>,
        locks: SessionLocks,
    }

    impl SessionHost for Host {
        fn store(&self) -> &Arc<dyn SessionStore> {
            &self.store
        }

        fn locks(&self) -> &SessionLocks {
            &self.locks
        }
    }

    fn host() -> Host {
        Host { store: Arc::new(InMemorySessionStore::default()), locks: SessionLocks::default() }
    }

    #[tokio::test]
    async fn sweep_evicts_idle_sessions_and_prunes_locks() {
        let host = host();
        host.store.get(&SessionId::from("S-1")).await;
        drop(host.locks.acquire(&SessionId::from("S-1")).await);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let evicted = sweep_once(&host, Duration::from_millis(5)).await;

        assert_eq!(evicted, 1);
        assert_eq!(host.store.len().await, 0);
        assert!(host.locks.is_empty());
    }

    #[tokio::test]
    async fn recent_sessions_survive_a_sweep() {
        let host = host();
        host.store.get(&SessionId::from("S-2")).await;

        let evicted = sweep_once(&host, Duration::from_secs(3600)).await;

        assert_eq!(evicted, 0);
        assert_eq!(host.store.len().await, 1);
    }
}
