use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use crate::llm::ChatTurn;

/// Explicit record of where a conversation stands. `Committed` remembers
/// the history index of the turn that triggered the commit so the decision
/// is auditable after the fact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversationPhase {
    Gathering,
    Committed { turn: usize },
}

pub struct Session {
    pub history: Vec<ChatTurn>,
    pub phase: ConversationPhase,
    last_active: Instant,
}

impl Session {
    fn new() -> Self {
        Self { history: Vec::new(), phase: ConversationPhase::Gathering, last_active: Instant::now() }
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    fn expired(&self, idle_limit: Duration) -> bool {
        self.last_active.elapsed() > idle_limit
    }
}

/// In-memory session map keyed by the channel's user identifier. Each
/// session has its own lock so one user's model call never serializes
/// another user's turn.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
    idle_limit: Duration,
}

impl SessionStore {
    pub fn new(idle_limit: Duration) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), idle_limit }
    }

    /// Finds or creates the session for `user_id`, dropping any session
    /// that has sat idle past the limit. Sessions currently locked by an
    /// in-flight turn are by definition not idle and are left alone.
    pub async fn acquire(&self, user_id: &str) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.lock().await;

        sessions.retain(|id, slot| match slot.try_lock() {
            Ok(session) => {
                let keep = !session.expired(self.idle_limit);
                if !keep {
                    debug!(event_name = "session.expired", user_id = %id);
                }
                keep
            }
            Err(_) => true,
        });

        sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new())))
            .clone()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ConversationPhase, SessionStore};
    use crate::llm::ChatTurn;

    #[tokio::test]
    async fn sessions_persist_across_turns() {
        let store = SessionStore::new(Duration::from_secs(3600));

        {
            let slot = store.acquire("user-1").await;
            let mut session = slot.lock().await;
            session.history.push(ChatTurn::user("Hi"));
            session.touch();
        }

        let slot = store.acquire("user-1").await;
        let session = slot.lock().await;
        assert_eq!(session.history.len(), 1);
        assert_eq!(session.phase, ConversationPhase::Gathering);
        assert_eq!(store.active_count().await, 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_user() {
        let store = SessionStore::new(Duration::from_secs(3600));

        {
            let slot = store.acquire("user-1").await;
            slot.lock().await.history.push(ChatTurn::user("Hi"));
        }

        let slot = store.acquire("user-2").await;
        assert!(slot.lock().await.history.is_empty());
        assert_eq!(store.active_count().await, 2);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_on_next_acquire() {
        let store = SessionStore::new(Duration::from_millis(5));

        {
            let slot = store.acquire("user-1").await;
            slot.lock().await.history.push(ChatTurn::user("Hi"));
        }

        tokio::time::sleep(Duration::from_millis(25)).await;

        let slot = store.acquire("user-1").await;
        assert!(slot.lock().await.history.is_empty(), "expired session should start fresh");
    }
}
