use crate::{
    AppState,
    auth::SellerHasAccess,
    handlers,
    pipeline::{self, Pipeline},
};
use axum::{Router, middleware, routing::get};

/// Seller Router Module
///
/// Resources owned by a seller. On top of authentication, the `seller_id` path
/// parameter must match the identity stored in the session.
pub fn seller_routes() -> Router<AppState> {
    let seller_access = Pipeline::new().with(SellerHasAccess);

    Router::new()
        // GET /{seller_id}/something
        .route(
            "/{seller_id}/something",
            get(handlers::seller_something).route_layer(middleware::from_fn_with_state(
                seller_access,
                pipeline::dispatch,
            )),
        )
}
