use async_trait::async_trait;
use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    pipeline::{Flow, RequestContext, Stage},
    session,
};

pub const LOGIN_PATH: &str = "/login";
pub const ERROR_PATH: &str = "/error";

/// Name of the route parameter holding the claimed seller identity.
pub const SELLER_ID_PARAM: &str = "seller_id";

/// `302 Found` to `location`, the status browsers and express-style clients expect
/// from a navigational redirect.
pub fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// AuthenticateUser
///
/// Gate applied to every route. The request goes through when it targets the login
/// page itself or when the session is flagged logged in. Everything else is sent to
/// `/login`. A missing session or flag is simply "not logged in".
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticateUser;

#[async_trait]
impl Stage for AuthenticateUser {
    async fn check(&self, ctx: &RequestContext) -> Result<Flow, AppError> {
        if ctx.path == LOGIN_PATH || session::is_logged_in(&ctx.session).await? {
            return Ok(Flow::Continue);
        }

        tracing::debug!(path = %ctx.path, "unauthenticated request, redirecting to login");
        Ok(Flow::Respond(found(LOGIN_PATH)))
    }
}

/// SellerHasAccess
///
/// Route gate for `/{seller_id}/...`. The `seller_id` parameter must equal the session's
/// `username` exactly. Anything else, including a session without a username, is
/// sent to `/error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SellerHasAccess;

#[async_trait]
impl Stage for SellerHasAccess {
    async fn check(&self, ctx: &RequestContext) -> Result<Flow, AppError> {
        let claimed = ctx.param(SELLER_ID_PARAM);
        let username = session::username(&ctx.session).await?;

        match (claimed, username.as_deref()) {
            (Some(claimed), Some(username)) if claimed == username => Ok(Flow::Continue),
            _ => {
                tracing::info!(
                    seller_id = ?claimed,
                    username = ?username,
                    "seller access denied"
                );
                Ok(Flow::Respond(found(ERROR_PATH)))
            }
        }
    }
}
