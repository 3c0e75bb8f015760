use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{AppState, routes};

pub(crate) mod auth;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(routes::projects::router(&state))
        .merge(routes::users::router())
        .merge(routes::dashboard::router())
        .merge(routes::auth::router())
        .layer(from_fn_with_state(state.clone(), auth::require_session))
        .merge(routes::auth::public_router());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
