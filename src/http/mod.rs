//! HTTP surface: routing, authentication, and request handlers.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::AppState;

/// Build the full application router.
///
/// Everything except `/health` sits behind the token-presence check.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/team/add", post(handlers::create_team))
        .route("/team/get", get(handlers::get_team))
        .route("/team/bulkDeactivate", post(handlers::bulk_deactivate))
        .route("/users/setIsActive", post(handlers::set_user_active))
        .route("/users/getReview", get(handlers::get_review))
        .route("/pullRequest/create", post(handlers::create_pull_request))
        .route("/pullRequest/merge", post(handlers::merge_pull_request))
        .route("/pullRequest/reassign", post(handlers::reassign_reviewer))
        .route("/statistics", get(handlers::statistics))
        .route_layer(middleware::from_fn(auth::require_token));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .with_state(state)
}
