//! Typed access to the per-client session record.
//!
//! The record keeps the key names `isLoggedIn`, `username` and `views`, so a stored
//! session looks like `{"isLoggedIn": true, "username": "alice", "views": 3}`.
//! Reads are strict about JSON types: a flag stored as the string `"true"` is not
//! a logged-in flag.

use serde_json::Value;
use tower_sessions::Session;

use crate::error::AppResult;

pub const IS_LOGGED_IN_KEY: &str = "isLoggedIn";
pub const USERNAME_KEY: &str = "username";
pub const VIEWS_KEY: &str = "views";

/// True only when `isLoggedIn` holds the boolean `true`.
pub async fn is_logged_in(session: &Session) -> AppResult<bool> {
    let flag = session.get_value(IS_LOGGED_IN_KEY).await?;
    Ok(matches!(flag, Some(Value::Bool(true))))
}

/// The identity stored at login, if it is a string.
pub async fn username(session: &Session) -> AppResult<Option<String>> {
    match session.get_value(USERNAME_KEY).await? {
        Some(Value::String(name)) => Ok(Some(name)),
        _ => Ok(None),
    }
}

/// Marks the session logged in as `name`. Identity and flag are always written together.
pub async fn log_in(session: &Session, name: &str) -> AppResult<()> {
    session.insert(USERNAME_KEY, name).await?;
    session.insert(IS_LOGGED_IN_KEY, true).await?;
    Ok(())
}

/// Clears the logged-in flag. The stored identity is kept.
pub async fn log_out(session: &Session) -> AppResult<()> {
    session.insert(IS_LOGGED_IN_KEY, false).await?;
    Ok(())
}

/// Bumps the view counter and returns the new value, starting at 1 when the
/// counter is absent, zero, or not an integer.
pub async fn record_view(session: &Session) -> AppResult<u64> {
    let views = match session.get_value(VIEWS_KEY).await? {
        Some(value) => value.as_u64().filter(|n| *n > 0).map_or(1, |n| n.saturating_add(1)),
        None => 1,
    };
    session.insert(VIEWS_KEY, views).await?;
    Ok(views)
}
