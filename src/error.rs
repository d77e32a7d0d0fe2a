use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// AppError
///
/// Everything a gate or handler can fail with. Unauthenticated and unauthorized access
/// are not errors here: they are redirects produced by the gates.
#[derive(Debug, Error)]
pub enum AppError {
    /// Reading or writing the request's session failed, usually because the
    /// backing store could not be reached.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Details go to the log, the client only sees a generic message.
        match &self {
            AppError::Session(e) => tracing::error!("Session error: {:?}", e),
            AppError::Internal(e) => tracing::error!("Internal error: {}", e),
        }

        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
