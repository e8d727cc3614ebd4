use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::http::{HttpConnection, HttpResponse};
use crate::utils::{Cookies, SetCookie};

#[derive(Debug, Clone)]
pub struct Session {
    pub data: HashMap<String, String>,
    pub created_at: u64,
    pub expires_at: u64,
}

impl Session {
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.expires_at
    }

    pub fn new(ttl: u64) -> Self {
        let now = current_timestamp();
        Session {
            data: HashMap::new(),
            created_at: now,
            expires_at: now + ttl,
        }
    }
}

/// Sessions are keyed by a random id rather than referenced by connection,
/// so a connection and its session can be dropped independently without
/// either side holding a pointer into the other.
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    ttl: u64,
    pub last_cleanup: Instant,
}

impl SessionStore {
    pub fn new(ttl: u64) -> Self {
        SessionStore {
            sessions: HashMap::new(),
            ttl,
            last_cleanup: Instant::now(),
        }
    }

    pub fn cleanup(&mut self) {
        let now = current_timestamp();
        self.sessions.retain(|_, s| !s.is_expired(now));
        self.last_cleanup = Instant::now();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn generate_id() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    }

    fn setup_new_session(&mut self, res: &mut HttpResponse) -> String {
        let id = Self::generate_id();
        self.sessions.insert(id.clone(), Session::new(self.ttl));

        let set_cookie = SetCookie::new("session", &id).max_age(self.ttl).to_header();
        res.headers.insert("set-cookie".to_string(), set_cookie);
        id
    }

    /// Ensures the connection carries a live session, issuing a fresh
    /// `Set-Cookie` when the client has none or its session expired.
    pub fn manage_session_store(&mut self, conn: &mut HttpConnection) {
        let cookies_header = conn.request.headers.get("cookie");
        let cookies = match cookies_header {
            Some(data) => Cookies::parse(data),
            None => Cookies::new(),
        };

        let valid_existing = cookies.get("session").and_then(|id| {
            self.sessions
                .get(id)
                .filter(|s| !s.is_expired(current_timestamp()))
                .map(|_| id.clone())
        });

        let session_id = match valid_existing {
            Some(id) => id,
            None => self.setup_new_session(&mut conn.response),
        };
        conn.session_id = Some(session_id);
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_not_expired_immediately() {
        let session = Session::new(60);
        assert!(!session.is_expired(session.created_at));
    }

    #[test]
    fn cleanup_evicts_expired_sessions() {
        let mut store = SessionStore::new(0);
        let id = SessionStore::generate_id();
        store.sessions.insert(id, Session::new(0));
        std::thread::sleep(std::time::Duration::from_secs(1));
        store.cleanup();
        assert!(store.is_empty());
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = SessionStore::generate_id();
        let b = SessionStore::generate_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }
}
