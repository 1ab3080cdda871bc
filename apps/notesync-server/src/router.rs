use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{access_log, api, security, AppState};

pub(crate) mod paths {
    pub const HEALTHZ: &str = "/healthz";
    pub const NOTES: &str = "/notes";
}

pub(crate) fn build(state: AppState) -> Router {
    let body_limit = state.config().body_limit_bytes();
    Router::new()
        .route(paths::HEALTHZ, get(api::meta::healthz))
        .route(
            paths::NOTES,
            get(api::notes::notes_pull).post(api::notes::notes_push),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(access_log::access_log_mw))
        .layer(middleware::from_fn(security::headers_mw))
        .with_state(state)
}
