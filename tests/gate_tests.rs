use std::{collections::HashMap, sync::Arc};

use axum::http::{StatusCode, header};
use serde_json::json;
use session_gate::{
    auth::{AuthenticateUser, SellerHasAccess},
    pipeline::{Flow, Pipeline, RequestContext, Stage},
    session,
};
use tower_sessions::{MemoryStore, Session};

// --- Helper Functions ---

fn new_session() -> Session {
    Session::new(None, Arc::new(MemoryStore::default()), None)
}

fn context(path: &str, session: &Session) -> RequestContext {
    RequestContext {
        path: path.to_string(),
        params: HashMap::new(),
        session: session.clone(),
    }
}

fn seller_context(seller_id: &str, session: &Session) -> RequestContext {
    let mut ctx = context(&format!("/{seller_id}/something"), session);
    ctx.params
        .insert("seller_id".to_string(), seller_id.to_string());
    ctx
}

/// Asserts the stage short-circuited with a redirect to `location`.
fn assert_redirects_to(flow: Flow, location: &str) {
    match flow {
        Flow::Respond(response) => {
            assert_eq!(response.status(), StatusCode::FOUND);
            assert_eq!(response.headers()[header::LOCATION], location);
        }
        Flow::Continue => panic!("expected a redirect to {location}, got Continue"),
    }
}

// --- AuthenticateUser ---

#[tokio::test]
async fn test_login_page_always_passes() {
    let session = new_session();
    let flow = AuthenticateUser
        .check(&context("/login", &session))
        .await
        .unwrap();
    assert!(matches!(flow, Flow::Continue));
}

#[tokio::test]
async fn test_anonymous_session_is_sent_to_login() {
    let session = new_session();
    for path in ["/", "/logout", "/error", "/alice/something", "/login/extra"] {
        let flow = AuthenticateUser.check(&context(path, &session)).await.unwrap();
        assert_redirects_to(flow, "/login");
    }
}

#[tokio::test]
async fn test_logged_in_session_passes() {
    let session = new_session();
    session::log_in(&session, "alice").await.unwrap();

    let flow = AuthenticateUser.check(&context("/", &session)).await.unwrap();
    assert!(matches!(flow, Flow::Continue));
}

#[tokio::test]
async fn test_logged_out_session_is_sent_to_login() {
    let session = new_session();
    session::log_in(&session, "alice").await.unwrap();
    session::log_out(&session).await.unwrap();

    let flow = AuthenticateUser.check(&context("/", &session)).await.unwrap();
    assert_redirects_to(flow, "/login");
}

#[tokio::test]
async fn test_flag_must_be_boolean_true() {
    let session = new_session();
    session.insert("isLoggedIn", "true").await.unwrap();

    let flow = AuthenticateUser.check(&context("/", &session)).await.unwrap();
    assert_redirects_to(flow, "/login");
}

// --- SellerHasAccess ---

#[tokio::test]
async fn test_matching_seller_passes() {
    let session = new_session();
    session::log_in(&session, "alice").await.unwrap();

    let flow = SellerHasAccess
        .check(&seller_context("alice", &session))
        .await
        .unwrap();
    assert!(matches!(flow, Flow::Continue));
}

#[tokio::test]
async fn test_other_seller_is_sent_to_error() {
    let session = new_session();
    session::log_in(&session, "alice").await.unwrap();

    let flow = SellerHasAccess
        .check(&seller_context("bob", &session))
        .await
        .unwrap();
    assert_redirects_to(flow, "/error");
}

#[tokio::test]
async fn test_comparison_is_exact() {
    let session = new_session();
    session::log_in(&session, "alice").await.unwrap();

    for claimed in ["Alice", "alice ", "alic"] {
        let flow = SellerHasAccess
            .check(&seller_context(claimed, &session))
            .await
            .unwrap();
        assert_redirects_to(flow, "/error");
    }
}

#[tokio::test]
async fn test_session_without_username_is_sent_to_error() {
    let session = new_session();
    let flow = SellerHasAccess
        .check(&seller_context("alice", &session))
        .await
        .unwrap();
    assert_redirects_to(flow, "/error");
}

#[tokio::test]
async fn test_username_survives_logout() {
    let session = new_session();
    session::log_in(&session, "alice").await.unwrap();
    session::log_out(&session).await.unwrap();

    // The identity is kept, so only the authentication stage keeps this client out.
    let flow = SellerHasAccess
        .check(&seller_context("alice", &session))
        .await
        .unwrap();
    assert!(matches!(flow, Flow::Continue));
}

// --- Pipeline ---

#[tokio::test]
async fn test_pipeline_stops_at_first_response() {
    let session = new_session();
    let pipeline = Pipeline::new().with(AuthenticateUser).with(SellerHasAccess);

    // Not logged in: the first stage answers, so the redirect is to /login, not /error.
    let response = pipeline
        .run(&seller_context("bob", &session))
        .await
        .unwrap()
        .expect("pipeline should short-circuit");
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn test_pipeline_passes_when_every_stage_continues() {
    let session = new_session();
    session::log_in(&session, "alice").await.unwrap();
    let pipeline = Pipeline::new().with(AuthenticateUser).with(SellerHasAccess);

    let outcome = pipeline.run(&seller_context("alice", &session)).await.unwrap();
    assert!(outcome.is_none());
}

// --- Session accessors ---

#[tokio::test]
async fn test_login_sets_identity_and_flag_together() {
    let session = new_session();
    session::log_in(&session, "alice").await.unwrap();

    assert_eq!(session.get_value("isLoggedIn").await.unwrap(), Some(json!(true)));
    assert_eq!(session.get_value("username").await.unwrap(), Some(json!("alice")));
}

#[tokio::test]
async fn test_view_counter_starts_at_one_and_increments() {
    let session = new_session();
    for expected in 1..=5u64 {
        assert_eq!(session::record_view(&session).await.unwrap(), expected);
    }
    assert_eq!(session.get_value("views").await.unwrap(), Some(json!(5)));
}

#[tokio::test]
async fn test_view_counter_resets_non_numeric_value() {
    let session = new_session();
    session.insert("views", "many").await.unwrap();
    assert_eq!(session::record_view(&session).await.unwrap(), 1);
}
