use crate::error::Notice;
use crate::selection::{Selection, SelectionEvent};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

pub const SESSION_COOKIE: &str = "atlas_session";

/// Idle time after which a stored selection is forgotten.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct Entry {
    selection: Selection,
    touched: Instant,
}

/// Per-visitor selections. Never shared between sessions.
///
/// Only sessions with a country selected are stored; an absent entry reads as
/// `Unselected`, so cookie-less traffic leaves nothing behind.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(SESSION_TTL)
    }
}

impl SessionStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn new_session_id() -> String {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn selection(&self, session: &str) -> Selection {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(session)
            .filter(|entry| entry.touched.elapsed() < self.ttl)
            .map(|entry| entry.selection.clone())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Applies `event` to the session's selection and returns the result.
    pub fn apply(
        &self,
        session: &str,
        event: SelectionEvent,
        is_known: impl Fn(&str) -> bool,
    ) -> (Selection, Option<Notice>) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let current = sessions
            .get(session)
            .filter(|entry| entry.touched.elapsed() < self.ttl)
            .map(|entry| entry.selection.clone())
            .unwrap_or_default();
        let (next, notice) = current.apply(event, is_known);
        if current != next {
            debug!("Session {} selection {:?} -> {:?}", session, current, next);
        }

        match &next {
            Selection::Unselected => {
                sessions.remove(session);
            }
            Selection::Selected(_) => {
                if !sessions.contains_key(session) {
                    let ttl = self.ttl;
                    sessions.retain(|_, entry| entry.touched.elapsed() < ttl);
                }
                sessions.insert(
                    session.to_string(),
                    Entry { selection: next.clone(), touched: Instant::now() },
                );
            }
        }
        (next, notice)
    }
}

/// Session id from a `Cookie` header value, if present and well formed.
pub fn session_from_cookie(header: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| value.len() == 32 && value.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(id: &str) -> bool {
        id == "USA" || id == "FRA"
    }

    #[test]
    fn sessions_do_not_share_selection() {
        let store = SessionStore::default();
        let alice = SessionStore::new_session_id();
        let bob = SessionStore::new_session_id();
        assert_ne!(alice, bob);

        store.apply(&alice, SelectionEvent::Click(Some("USA".into())), known);
        assert_eq!(store.selection(&alice), Selection::Selected("USA".into()));
        assert_eq!(store.selection(&bob), Selection::Unselected);

        store.apply(&bob, SelectionEvent::Pick("FRA".into()), known);
        assert_eq!(store.selection(&alice), Selection::Selected("USA".into()));
        assert_eq!(store.selection(&bob), Selection::Selected("FRA".into()));
    }

    #[test]
    fn selection_survives_requests_without_events() {
        let store = SessionStore::default();
        let id = SessionStore::new_session_id();
        store.apply(&id, SelectionEvent::Click(Some("FRA".into())), known);
        for _ in 0..3 {
            let (state, _) = store.apply(&id, SelectionEvent::None, known);
            assert_eq!(state, Selection::Selected("FRA".into()));
        }
    }

    #[test]
    fn cookieless_requests_store_nothing() {
        let store = SessionStore::default();
        for _ in 0..1000 {
            let id = SessionStore::new_session_id();
            store.apply(&id, SelectionEvent::None, known);
            store.apply(&id, SelectionEvent::Click(Some("XYZ".into())), known);
        }
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn dismiss_forgets_the_session() {
        let store = SessionStore::default();
        let id = SessionStore::new_session_id();
        store.apply(&id, SelectionEvent::Pick("USA".into()), known);
        assert_eq!(store.len(), 1);

        store.apply(&id, SelectionEvent::Dismiss, known);
        assert_eq!(store.len(), 0);
        assert_eq!(store.selection(&id), Selection::Unselected);
    }

    #[test]
    fn idle_sessions_expire() {
        let store = SessionStore::with_ttl(Duration::ZERO);
        let first = SessionStore::new_session_id();
        store.apply(&first, SelectionEvent::Pick("USA".into()), known);
        assert_eq!(store.selection(&first), Selection::Unselected);

        // Storing a new session sweeps expired ones.
        store.apply(&SessionStore::new_session_id(), SelectionEvent::Pick("FRA".into()), known);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn parses_session_cookie() {
        let id = SessionStore::new_session_id();
        let header = format!("theme=dark; {}={}; other=1", SESSION_COOKIE, id);
        assert_eq!(session_from_cookie(&header), Some(id));
        assert_eq!(session_from_cookie("atlas_session=short"), None);
        assert_eq!(session_from_cookie("theme=dark"), None);
    }
}
