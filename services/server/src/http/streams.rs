use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::errors::{ApiResult, Kind};
use crate::http::response::authenticate;
use crate::repo::streams;
use crate::state::AppState;
use axum::http::StatusCode;
use protocol::cursor;

#[derive(Debug, Deserialize)]
pub struct CreateQuery {
    pub ttl_seconds: Option<i64>,
}

/// `PUT /{path}` — create a stream, or no-op if an identical one exists (§4.8).
pub async fn create_stream(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    Query(query): Query<CreateQuery>,
) -> ApiResult<Response> {
    authenticate(&state, &headers).await?;

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Kind::BadRequest("Content-Type header required".into()))?
        .to_owned();

    let stream = streams::create_stream(&state.pool, &path, &content_type, query.ttl_seconds)
        .await?;

    Ok((StatusCode::CREATED, Json(to_stream_info(&stream))).into_response())
}

/// `DELETE /{path}` — soft-delete; subsequent reads 404 (§4.8).
pub async fn delete_stream(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    authenticate(&state, &headers).await?;
    streams::delete_stream(&state.pool, &path).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// `POST /{path}:truncate` — trims chunks whose end-offset is at or before
/// the cursor's offset (§4.8).
pub async fn truncate_stream(
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
    through: &str,
) -> ApiResult<Response> {
    authenticate(state, headers).await?;

    let stream = streams::get_stream(&state.pool, path)
        .await?
        .ok_or(Kind::NotFound)?;

    let decoded =
        cursor::decode(through).map_err(|_| Kind::BadRequest("malformed cursor".into()))?;

    crate::repo::chunks::truncate(&state.pool, stream.id, decoded.byte_offset as i64).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

fn to_stream_info(stream: &streams::Stream) -> protocol::StreamInfo {
    protocol::StreamInfo {
        path: stream.path.clone(),
        content_type: stream.content_type.clone(),
        write_seq: stream.write_seq,
        total_bytes: stream.total_bytes,
        created_at: stream.created_at.to_rfc3339(),
        updated_at: stream.updated_at.to_rfc3339(),
    }
}
