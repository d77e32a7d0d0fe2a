//! Per-session request serialization.
//!
//! The session layer loads a record, lets the handler mutate its copy, and writes it
//! back. Two concurrent requests on the same session would otherwise both read
//! `views = 3` and both write `views = 4`. `serialize_session` sits outside the
//! session layer and holds a lock keyed by the session cookie until the record has
//! been persisted.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tokio::sync::OwnedMutexGuard;
use tower_sessions::cookie::Cookie;

use crate::config::AppConfig;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// SessionLocks
///
/// One async mutex per live session key. Entries are dropped as soon as no request
/// holds or waits on them.
#[derive(Clone, Default)]
pub struct SessionLocks {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

/// Releases the session's lock when dropped.
pub struct SessionGuard {
    locks: SessionLocks,
    key: String,
    slot: Slot,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SessionLocks {
    pub async fn acquire(&self, key: &str) -> SessionGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(key.to_string()).or_default().clone()
        };
        let guard = slot.clone().lock_owned().await;

        SessionGuard {
            locks: self.clone(),
            key: key.to_string(),
            slot,
            guard: Some(guard),
        }
    }

    /// Number of sessions currently holding or waiting on a lock.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.guard.take();

        let mut slots = self
            .locks
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the map and this guard still reference the slot: nobody is waiting.
        let idle = slots
            .get(&self.key)
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot) && Arc::strong_count(slot) == 2);
        if idle {
            slots.remove(&self.key);
        }
    }
}

/// serialize_session
///
/// Middleware holding the per-session lock for the whole request when the request
/// carries a session cookie. Requests without one start a brand new session and
/// cannot race.
pub async fn serialize_session(
    State(locks): State<SessionLocks>,
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Response {
    let key = session_cookie(&request, &config.cookie_name);

    match key {
        Some(key) => {
            let _guard = locks.acquire(&key).await;
            next.run(request).await
        }
        None => next.run(request).await,
    }
}

fn session_cookie(request: &Request, cookie_name: &str) -> Option<String> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == cookie_name)
        .map(|cookie| cookie.value().to_string())
}
