use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Request, State},
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;

use crate::error::AppError;

/// RequestContext
///
/// What a stage gets to look at: the request path, any matched path parameters and
/// the request's session handle. Built fresh for every request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub path: String,
    pub params: HashMap<String, String>,
    pub session: Session,
}

impl RequestContext {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Outcome of a single stage.
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next stage, or to the handler after the last one.
    Continue,
    /// Stop here and answer with this response.
    Respond(Response),
}

/// Stage
///
/// One step of request processing. Stages must not mutate the session. They only
/// decide whether the request goes further.
#[async_trait]
pub trait Stage: Send + Sync {
    async fn check(&self, ctx: &RequestContext) -> Result<Flow, AppError>;
}

/// Pipeline
///
/// An ordered list of stages run by `dispatch`. The first stage that responds
/// short-circuits the rest and the handler.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Runs every stage in order. Returns the short-circuit response, if any.
    pub async fn run(&self, ctx: &RequestContext) -> Result<Option<Response>, AppError> {
        for stage in &self.stages {
            if let Flow::Respond(response) = stage.check(ctx).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}

/// dispatch
///
/// Middleware entry point, wired with `middleware::from_fn_with_state(pipeline, dispatch)`.
/// Path parameters are only available once the router has matched a route, so
/// pipelines that read them must be attached with `route_layer`.
pub async fn dispatch(
    State(pipeline): State<Pipeline>,
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    let params = Path::<HashMap<String, String>>::from_request_parts(&mut parts, &())
        .await
        .map(|Path(params)| params)
        .unwrap_or_default();

    let ctx = RequestContext {
        path: parts.uri.path().to_string(),
        params,
        session,
    };

    if let Some(response) = pipeline.run(&ctx).await? {
        return Ok(response);
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}
