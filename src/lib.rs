use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, StatusCode},
    middleware,
};
use time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tower_sessions::{
    Expiry, SessionManagerLayer, SessionStore,
    cookie::{Key, SameSite},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod locks;
pub mod pipeline;
pub mod session;
pub mod store;

// Routes split by what the authentication stage lets through.
pub mod routes;
use routes::{authenticated, public, seller};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use locks::SessionLocks;
pub use store::MemcachedStore;

/// AppState
///
/// The single, cloneable container shared across requests: the configuration loaded
/// at startup and the per-session lock table.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub locks: SessionLocks,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            locks: SessionLocks::default(),
        }
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for SessionLocks {
    fn from_ref(app_state: &AppState) -> SessionLocks {
        app_state.locks.clone()
    }
}

/// session_key
///
/// Derives the cookie signing key from the configured secret.
pub fn session_key(config: &AppConfig) -> Result<Key, AppError> {
    Key::try_from(config.session_secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("invalid session secret: {e}")))
}

/// create_router
///
/// Assembles the routes and wraps them, innermost first, in: the authentication
/// pipeline, the session manager, the per-session lock, and the observability stack.
pub fn create_router<S>(state: AppState, store: S) -> Result<Router, AppError>
where
    S: SessionStore + Clone,
{
    // Signed cookie named after the config, expiring after `session_ttl_secs` of inactivity.
    let sessions = SessionManagerLayer::new(store)
        .with_name(state.config.cookie_name.clone())
        .with_secure(state.config.secure_cookies())
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            state.config.session_ttl_secs,
        )))
        .with_signed(session_key(&state.config)?);
    let authentication = pipeline::Pipeline::new().with(auth::AuthenticateUser);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(seller::seller_routes())
        .fallback(|| async { StatusCode::NOT_FOUND })
        // Applied to every route and to the fallback, so unknown paths are gated too.
        .layer(middleware::from_fn_with_state(
            authentication,
            pipeline::dispatch,
        ))
        .layer(sessions)
        // Outside the session layer: the lock is held until the record is persisted.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            locks::serialize_session,
        ))
        .with_state(state);

    Ok(base_router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(
                x_request_id.clone(),
                MakeRequestUuid,
            ))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    ))
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying the `x-request-id`, so every log line of one request
/// can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
