use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// `/login` is the only path the authentication stage lets through without a
/// logged-in session.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /login renders the form, POST /login trusts the submitted username.
        .route(
            crate::auth::LOGIN_PATH,
            get(handlers::login_page).post(handlers::login),
        )
}
