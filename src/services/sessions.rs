//! In-memory MCP session registry.

use crate::models::Implementation;
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};
use tracing::warn;
use uuid::Uuid;

/// State kept for one initialized client
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub protocol_version: String,
    pub client_info: Option<Implementation>,
    pub created_at: Instant,
    pub last_seen: Instant,
}

/// Sessions keyed by the id handed out in the `mcp-session-id` header
///
/// A session expires once it has been idle for longer than the TTL; expired
/// entries are dropped lazily on access. At most `capacity` sessions are
/// held, creating one more evicts the least recently seen.
pub struct SessionStore {
    ttl: Duration,
    capacity: usize,
    sessions: Mutex<HashMap<String, SessionInfo>>,
}

impl SessionStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    // A poisoned map is still structurally valid, keep serving it
    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SessionInfo>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new session and return its id
    pub fn create(&self, protocol_version: &str, client_info: Option<Implementation>) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let now = Instant::now();
        let mut sessions = self.sessions();
        self.purge_expired(&mut sessions, now);
        while sessions.len() >= self.capacity {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, session)| session.last_seen)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            warn!(
                session_id = %oldest,
                capacity = self.capacity,
                "Session store full, evicted least recently used session"
            );
        }
        sessions.insert(
            id.clone(),
            SessionInfo {
                protocol_version: protocol_version.to_string(),
                client_info,
                created_at: now,
                last_seen: now,
            },
        );
        id
    }

    /// Mark the session as used; `false` when unknown or expired
    pub fn touch(&self, id: &str) -> bool {
        let now = Instant::now();
        let mut sessions = self.sessions();
        self.purge_expired(&mut sessions, now);
        match sessions.get_mut(id) {
            Some(session) => {
                session.last_seen = now;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<SessionInfo> {
        self.sessions().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> bool {
        self.sessions().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        let mut sessions = self.sessions();
        self.purge_expired(&mut sessions, Instant::now());
        sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(&self, sessions: &mut HashMap<String, SessionInfo>, now: Instant) {
        sessions.retain(|_, session| now.duration_since(session.last_seen) <= self.ttl);
    }
}
