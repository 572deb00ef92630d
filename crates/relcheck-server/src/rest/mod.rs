mod handlers;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::Method;
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use relcheck_storage::{ModelStore, TupleStore};

const MAX_REQUEST_BODY_SIZE: usize = 4 * 1024 * 1024; // 4 MB

use crate::metrics::{self, Metrics};
use crate::middleware::auth::{AuthState, rest_auth_middleware};
use crate::service::AuthzService;

pub struct AppState<S: TupleStore + ModelStore> {
    pub service: Arc<AuthzService<S>>,
    pub metrics: Arc<Metrics>,
}

impl<S: TupleStore + ModelStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

fn method_name(method: &Method, path: &str) -> Option<&'static str> {
    match (method, path) {
        (_, "/v1/check") => Some("check"),
        (_, "/v1/write") => Some("write"),
        (_, "/v1/delete") => Some("delete"),
        (_, "/v1/read") => Some("read"),
        (_, "/v1/list-objects") => Some("list_objects"),
        (_, "/v1/list-relations") => Some("list_relations"),
        (_, "/v1/list-users") => Some("list_users"),
        (&Method::POST, "/v1/models") => Some("write_model"),
        (&Method::GET, p) if p.starts_with("/v1/models/") => Some("read_model"),
        _ => None,
    }
}

async fn metrics_middleware<S: TupleStore + ModelStore>(
    State(state): State<AppState<S>>,
    request: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> Response {
    state.metrics.record_request();

    let name = method_name(request.method(), request.uri().path());
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    if response.status().is_success() {
        state.metrics.record_success();
    } else {
        state.metrics.record_error();
    }
    if let Some(name) = name {
        state.metrics.record_method_request(name, start.elapsed());
    }

    response
}

pub fn create_router<S>(state: AppState<S>, auth: AuthState) -> Router
where
    S: TupleStore + ModelStore + 'static,
{
    Router::new()
        .route("/v1/check", post(handlers::check))
        .route("/v1/write", post(handlers::write))
        .route("/v1/delete", post(handlers::delete))
        .route("/v1/read", post(handlers::read))
        .route("/v1/list-objects", get(handlers::list_objects))
        .route("/v1/list-relations", get(handlers::list_relations))
        .route("/v1/list-users", get(handlers::list_users))
        .route("/v1/models", post(handlers::write_model))
        .route("/v1/models/latest", get(handlers::latest_model))
        .route("/v1/models/{id}", get(handlers::read_model))
        .route("/healthz", get(handlers::healthz))
        .route(
            "/metrics",
            get(metrics::metrics_handler).with_state(Arc::clone(&state.metrics)),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
        .layer(middleware::from_fn_with_state(auth, rest_auth_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .with_state(state)
}
