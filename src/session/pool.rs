use crate::session::Cookie;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A session shared between the pool and whoever fetched it
pub type SharedSession = Arc<Mutex<Session>>;

/// Cookie and identity state for one destination
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub destination: String,
    pub created_at: DateTime<Utc>,
    cookies: BTreeMap<String, Cookie>,
    usage_count: u64,
}

impl Session {
    fn new(destination: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            destination: destination.to_string(),
            created_at: Utc::now(),
            cookies: BTreeMap::new(),
            usage_count: 0,
        }
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.get(name)
    }

    pub fn cookies(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.values()
    }

    /// Merges cookies by name; the last write for a name wins
    pub fn update_cookies(&mut self, cookies: impl IntoIterator<Item = Cookie>) {
        for cookie in cookies {
            self.cookies.insert(cookie.name.clone(), cookie);
        }
    }

    /// `name=value` pairs of live cookies joined with `"; "`
    pub fn cookie_header(&self) -> String {
        self.cookies
            .values()
            .filter(|cookie| !cookie.is_expired())
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Snapshot of pool contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionPoolStats {
    pub size: usize,
    pub destinations: Vec<String>,
    pub usage: BTreeMap<String, u64>,
}

/// Per-destination session registry
///
/// Sessions are created lazily on first access and live until cleared.
/// The pool lock is always taken before a session lock, never the other way.
#[derive(Debug, Default)]
pub struct SessionPool {
    sessions: Mutex<HashMap<String, SharedSession>>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `destination`, creating it on first access
    ///
    /// Every call counts as one use of the session.
    pub fn get(&self, destination: &str) -> SharedSession {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let session = sessions
            .entry(destination.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(destination))))
            .clone();

        session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .usage_count += 1;

        session
    }

    pub fn update_cookies(&self, destination: &str, cookies: Vec<Cookie>) {
        if cookies.is_empty() {
            return;
        }

        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let session = sessions
            .entry(destination.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(destination))));

        session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .update_cookies(cookies);
    }

    /// Cookie header value for `destination`; empty when there is no session
    pub fn cookie_header(&self, destination: &str) -> String {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(destination)
            .map(|session| {
                session
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .cookie_header()
            })
            .unwrap_or_default()
    }

    /// Removes one destination's session, or all sessions when `None`
    pub fn clear(&self, destination: Option<&str>) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match destination {
            Some(destination) => {
                sessions.remove(destination);
            }
            None => sessions.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> SessionPoolStats {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());

        let mut destinations: Vec<String> = sessions.keys().cloned().collect();
        destinations.sort();

        let usage = sessions
            .iter()
            .map(|(destination, session)| {
                let count = session
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .usage_count;
                (destination.clone(), count)
            })
            .collect();

        SessionPoolStats {
            size: sessions.len(),
            destinations,
            usage,
        }
    }
}
