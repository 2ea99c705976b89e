pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod http;
pub mod repo;
pub mod state;
pub mod sweeper;
pub mod waiters;

pub use state::AppState;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use http::PostQuery;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route(
            "/*path",
            get(route_get)
                .put(route_put)
                .post(route_post)
                .delete(route_delete),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The stream path can itself contain slashes, so every non-admin
/// operation shares one wildcard route and dispatches on method here
/// instead of axum's per-segment routing (§6).
async fn route_get(
    state: State<AppState>,
    path: Path<String>,
    headers: axum::http::HeaderMap,
    query: Query<http::reads::ReadQuery>,
) -> Response {
    http::reads::read(state, path, headers, query)
        .await
        .into_response()
}

async fn route_put(
    state: State<AppState>,
    path: Path<String>,
    headers: axum::http::HeaderMap,
    query: Query<http::streams::CreateQuery>,
) -> Response {
    http::streams::create_stream(state, path, headers, query)
        .await
        .into_response()
}

async fn route_delete(
    state: State<AppState>,
    path: Path<String>,
    headers: axum::http::HeaderMap,
) -> Response {
    http::streams::delete_stream(state, path, headers)
        .await
        .into_response()
}

/// `POST /{path}` handles both append and the `:truncate` admin suffix,
/// since axum cannot express a literal suffix alongside a wildcard route.
async fn route_post(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: axum::http::HeaderMap,
    Query(query): Query<PostQuery>,
    body: axum::body::Bytes,
) -> Response {
    if let Some(stream_path) = http::strip_truncate_suffix(&path) {
        let Some(through) = query.through else {
            return StatusCode::BAD_REQUEST.into_response();
        };
        return match http::streams::truncate_stream(&state, stream_path, &headers, &through).await
        {
            Ok(response) => response,
            Err(kind) => kind.into_response(),
        };
    }

    http::append::append(State(state), Path(path), headers, body)
        .await
        .into_response()
}

mod health {
    use axum::extract::State;
    use axum::response::IntoResponse;

    use crate::state::AppState;

    pub async fn healthz() -> impl IntoResponse {
        "ok"
    }

    pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
        match sqlx::query("SELECT 1").execute(&state.pool).await {
            Ok(_) => axum::http::StatusCode::OK,
            Err(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}
