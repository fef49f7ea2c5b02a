use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::chat::ConversationState;

/// One conversation, locked for the whole of each event handled on it.
pub type SessionHandle = Arc<Mutex<ConversationState>>;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

struct SessionEntry {
    handle: SessionHandle,
    last_touched: Instant,
}

/// Live conversations keyed by session id. Only handles are shared here;
/// each conversation is reachable through its own lock.
///
/// Sessions untouched for longer than the idle timeout are dropped the next
/// time a session is created.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    idle_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    /// Starts a session holding the greeting turn.
    pub fn create(&self) -> (String, SessionHandle) {
        let now = Instant::now();
        self.evict_idle(now);

        let id = Uuid::new_v4().to_string();
        let handle = Arc::new(Mutex::new(ConversationState::new()));
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id.clone(),
                SessionEntry {
                    handle: handle.clone(),
                    last_touched: now,
                },
            );
        tracing::debug!("Session {} started", id);
        (id, handle)
    }

    /// Looks a session up and marks it as used.
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = sessions.get_mut(id)?;
        entry.last_touched = Instant::now();
        Some(entry.handle.clone())
    }

    /// Discards the session. Returns false if it did not exist.
    pub fn remove(&self, id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    /// Drops every session idle for longer than the timeout as of `now`.
    /// Handles already held by in-flight requests stay usable.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, entry| {
            now.saturating_duration_since(entry.last_touched) <= self.idle_timeout
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_are_created_fetched_and_removed() {
        let registry = SessionRegistry::new();
        let (id, handle) = registry.create();

        assert_eq!(registry.len(), 1);
        assert_eq!(handle.lock().await.len(), 1);
        assert!(registry.get(&id).is_some());

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn sessions_do_not_share_state() {
        let registry = SessionRegistry::new();
        let (a, _) = registry.create();
        let (b, _) = registry.create();
        assert_ne!(a, b);

        let handle_a = registry.get(&a).unwrap();
        handle_a
            .lock()
            .await
            .append_turn(crate::chat::Turn::user("only in a"));

        assert_eq!(registry.get(&a).unwrap().lock().await.len(), 2);
        assert_eq!(registry.get(&b).unwrap().lock().await.len(), 1);
    }

    #[test]
    fn idle_sessions_are_evicted() {
        let registry = SessionRegistry::with_idle_timeout(Duration::from_secs(60));
        let (a, _) = registry.create();
        let (b, _) = registry.create();
        let now = Instant::now();

        assert_eq!(registry.evict_idle(now + Duration::from_secs(30)), 0);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.evict_idle(now + Duration::from_secs(120)), 2);
        assert!(registry.get(&a).is_none());
        assert!(registry.get(&b).is_none());
    }

    #[test]
    fn creating_a_session_sweeps_stale_ones() {
        let registry = SessionRegistry::with_idle_timeout(Duration::ZERO);
        let (stale, _) = registry.create();
        std::thread::sleep(Duration::from_millis(5));

        let (fresh, _) = registry.create();
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&stale).is_none());
        assert!(registry.get(&fresh).is_some());
    }

    #[tokio::test]
    async fn evicted_handle_stays_usable_for_its_holder() {
        let registry = SessionRegistry::with_idle_timeout(Duration::from_secs(60));
        let (id, _) = registry.create();
        let held = registry.get(&id).unwrap();

        registry.evict_idle(Instant::now() + Duration::from_secs(120));
        held.lock()
            .await
            .append_turn(crate::chat::Turn::user("still here"));
        assert_eq!(held.lock().await.len(), 2);
        assert!(registry.is_empty());
    }
}
