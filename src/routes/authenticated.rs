use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes only reachable once the session's `isLoggedIn` flag is `true`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Increments and shows the per-session view counter.
        .route("/", get(handlers::view_counter))
        // GET /logout
        // Clears the logged-in flag. Idempotent.
        .route("/logout", get(handlers::logout))
        // GET /error
        // Landing page for failed seller checks.
        .route(crate::auth::ERROR_PATH, get(handlers::error_page))
}
