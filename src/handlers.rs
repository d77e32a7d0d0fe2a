use axum::{
    Form,
    extract::Path,
    response::{Html, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{auth::found, error::AppResult, session};

/// The static login view: a single `username` field posted back to `/login`.
pub const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Login</title>
  </head>
  <body>
    <h1>Login</h1>
    <form method="post" action="/login">
      <label for="username">Username</label>
      <input type="text" id="username" name="username" autofocus>
      <button type="submit">Log in</button>
    </form>
  </body>
</html>
"#;

pub const FAILURE_MESSAGE: &str = "Fail! Fail! Fail!";

/// LoginForm
///
/// Urlencoded body of `POST /login`.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
}

/// view_counter
///
/// `GET /`. Counts how many times this session has loaded the home page.
pub async fn view_counter(session: Session) -> AppResult<Html<String>> {
    let views = session::record_view(&session).await?;
    Ok(Html(format!("Viewed <strong>{views}</strong> times.")))
}

/// seller_something
///
/// `GET /{seller_id}/something`. Only reached once `SellerHasAccess` matched the
/// parameter against the session identity.
pub async fn seller_something(Path(seller_id): Path<String>) -> String {
    format!("It's getting cold {seller_id}.")
}

/// login
///
/// `POST /login`. Trusts whatever identity is submitted: there is no credential
/// store behind this login.
pub async fn login(session: Session, Form(form): Form<LoginForm>) -> AppResult<Response> {
    tracing::warn!(username = %form.username, "logging in without credential verification");
    // New id on every login; the record's data moves with it.
    session.cycle_id().await?;
    session::log_in(&session, &form.username).await?;
    Ok(found("/"))
}

/// login_page
///
/// `GET /login`.
pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

/// logout
///
/// `GET /logout`. Clears the logged-in flag and keeps the stored username.
pub async fn logout(session: Session) -> AppResult<Response> {
    session::log_out(&session).await?;
    Ok(found("/"))
}

/// error_page
///
/// `GET /error`. Where failed seller checks end up. Always 200.
pub async fn error_page() -> &'static str {
    FAILURE_MESSAGE
}
