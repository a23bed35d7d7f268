use crate::config::SessionConfig;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use bytes::Bytes;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "papaya_session";

/// What the result panel under the preview shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPanel {
    Success { label: String, confidence: f32 },
    Error(String),
    Info(String),
}

#[derive(Debug, Clone)]
struct Session {
    current_image: Option<Bytes>,
    image_version: u64,
    prediction_result: Option<ResultPanel>,
    last_seen: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            current_image: None,
            image_version: 0,
            prediction_result: None,
            last_seen: Instant::now(),
        }
    }
}

/// Snapshot of a session, enough to render the page.
#[derive(Debug, Clone, Default)]
pub struct PageView {
    pub has_image: bool,
    pub image_version: u64,
    pub result: Option<ResultPanel>,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            max_sessions: config.max_sessions.max(1),
        }
    }

    /// Returns the session named by the cookie, creating one (and the cookie) if needed.
    pub fn resolve(&self, jar: CookieJar) -> (CookieJar, Uuid) {
        let known = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());

        let mut sessions = self.sessions.lock();
        if let Some(id) = known {
            if let Some(session) = sessions.get_mut(&id) {
                session.last_seen = Instant::now();
                return (jar, id);
            }
        }

        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, session)| session.last_seen)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                tracing::debug!("Evicting session {} to make room", oldest);
                sessions.remove(&oldest);
            }
        }

        let id = Uuid::new_v4();
        sessions.insert(id, Session::new());
        drop(sessions);

        let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);

        (jar.add(cookie), id)
    }

    pub fn set_image(&self, id: Uuid, image: Bytes) {
        if let Some(session) = self.sessions.lock().get_mut(&id) {
            session.current_image = Some(image);
            session.image_version += 1;
        }
    }

    pub fn current_image(&self, id: Uuid) -> Option<Bytes> {
        self.sessions
            .lock()
            .get(&id)
            .and_then(|session| session.current_image.clone())
    }

    pub fn set_result(&self, id: Uuid, result: ResultPanel) {
        if let Some(session) = self.sessions.lock().get_mut(&id) {
            session.prediction_result = Some(result);
        }
    }

    pub fn view(&self, id: Uuid) -> PageView {
        self.sessions
            .lock()
            .get(&id)
            .map(|session| PageView {
                has_image: session.current_image.is_some(),
                image_version: session.image_version,
                result: session.prediction_result.clone(),
            })
            .unwrap_or_default()
    }

    /// Ends sessions idle for longer than the timeout. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        let idle_timeout = self.idle_timeout;
        sessions.retain(|_, session| session.last_seen.elapsed() <= idle_timeout);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max_sessions: usize, idle_timeout_secs: u64) -> SessionStore {
        SessionStore::new(&SessionConfig {
            idle_timeout_secs,
            max_sessions,
            sweep_interval_secs: 60,
        })
    }

    #[test]
    fn test_new_session_sets_cookie() {
        let store = store(4, 60);

        let (jar, id) = store.resolve(CookieJar::new());

        let cookie = jar.get(SESSION_COOKIE).unwrap();
        assert_eq!(cookie.value(), id.to_string());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cookie_reuses_session() {
        let store = store(4, 60);
        let (jar, id) = store.resolve(CookieJar::new());

        let (_, again) = store.resolve(jar);

        assert_eq!(id, again);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_cookie_gets_fresh_session() {
        let store = store(4, 60);
        let stale = Uuid::new_v4();
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, stale.to_string()));

        let (_, id) = store.resolve(jar);

        assert_ne!(id, stale);
    }

    #[test]
    fn test_image_and_result_survive_until_overwritten() {
        let store = store(4, 60);
        let (_, id) = store.resolve(CookieJar::new());
        assert!(!store.view(id).has_image);

        store.set_image(id, Bytes::from_static(b"first"));
        store.set_result(id, ResultPanel::Info("pick a photo".into()));
        store.set_image(id, Bytes::from_static(b"second"));

        let view = store.view(id);
        assert!(view.has_image);
        assert_eq!(view.image_version, 2);
        assert_eq!(view.result, Some(ResultPanel::Info("pick a photo".into())));
        assert_eq!(store.current_image(id).unwrap(), Bytes::from_static(b"second"));
    }

    #[test]
    fn test_least_recently_seen_session_is_evicted() {
        let store = store(2, 60);
        let (_, first) = store.resolve(CookieJar::new());
        std::thread::sleep(Duration::from_millis(5));
        let (_, second) = store.resolve(CookieJar::new());
        std::thread::sleep(Duration::from_millis(5));

        let (_, third) = store.resolve(CookieJar::new());

        assert_eq!(store.len(), 2);
        assert!(!store.view(second).has_image);
        store.set_image(first, Bytes::from_static(b"gone"));
        assert!(store.current_image(first).is_none());
        store.set_image(third, Bytes::from_static(b"kept"));
        assert!(store.current_image(third).is_some());
    }

    #[test]
    fn test_idle_sessions_expire() {
        let store = store(4, 0);
        let _ = store.resolve(CookieJar::new());
        let _ = store.resolve(CookieJar::new());
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(store.purge_expired(), 2);
        assert!(store.is_empty());
    }
}
