//! HTTP surface for the quiz front end.

mod handlers;
mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::{
    application::{jobs::StatusStore, results::ResultService},
    config::HttpSettings,
    infra::error::InfraError,
};

pub use middleware::{CorsOrigin, RequestContext};

#[derive(Clone)]
pub struct HttpState {
    pub results: ResultService,
    pub tasks: StatusStore,
}

pub fn build_router(state: HttpState, settings: &HttpSettings) -> Result<Router, InfraError> {
    let origin = HeaderValue::from_str(settings.cors_origin.trim()).map_err(|err| {
        InfraError::configuration(format!(
            "http.cors_origin `{}` is not a valid header value: {err}",
            settings.cors_origin
        ))
    })?;
    let cors_origin = CorsOrigin(Arc::new(origin));

    Ok(Router::new()
        .route("/api/tests", get(handlers::list_tests))
        .route("/api/tests/{id}", get(handlers::get_test))
        .route("/api/results", post(handlers::submit_result))
        .route(
            "/api/results/{user_id}/{test_id}",
            get(handlers::latest_result),
        )
        .route(
            "/api/documents/{user_id}/{test_id}",
            get(handlers::download_document),
        )
        .route("/api/tasks/{task_id}", get(handlers::task_status))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn_with_state(
            cors_origin,
            middleware::cors,
        ))
        .layer(axum_middleware::from_fn(middleware::set_request_context)))
}
