use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::errors::{ApiResult, Kind};
use crate::http::response::authenticate;
use crate::http::{HEADER_PRODUCER_EPOCH, HEADER_PRODUCER_ID, HEADER_PRODUCER_SEQ};
use crate::repo::producer_state::{self, ProducerHeaders};
use crate::repo::streams;
use crate::state::AppState;
use protocol::cursor;

#[derive(Debug, Serialize)]
pub struct AppendResult {
    pub sequence: i64,
    pub byte_offset: i64,
    pub size: i64,
    pub cursor: String,
}

/// `POST /{path}` — validate, transactionally append, wake waiters (§4.5).
pub async fn append(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<Response> {
    authenticate(&state, &headers).await?;

    if body.len() > state.config.max_append_bytes {
        return Err(Kind::PayloadTooLarge);
    }

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Kind::BadRequest("Content-Type header required".into()))?
        .to_owned();

    let producer_id = headers
        .get(HEADER_PRODUCER_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let producer_epoch = header_i64(&headers, HEADER_PRODUCER_EPOCH).unwrap_or(0);
    let producer_seq = header_i64(&headers, HEADER_PRODUCER_SEQ).unwrap_or(0);

    let mut tx = state.pool.begin().await.map_err(Kind::from)?;

    let stream = match streams::get_stream_for_update(&mut tx, &path).await? {
        Some(stream) => stream,
        None if state.config.auto_create_on_append => {
            streams::create_stream(&state.pool, &path, &content_type, None).await?;
            streams::get_stream_for_update(&mut tx, &path)
                .await?
                .ok_or(Kind::StoreUnavailable("stream vanished after auto-create".into()))?
        }
        None => return Err(Kind::NotFound),
    };

    if stream.content_type != content_type {
        return Err(Kind::ContentTypeMismatch);
    }

    let is_json_boundary = content_type == "application/json";
    if is_json_boundary {
        serde_json::from_slice::<serde_json::Value>(&body)
            .map_err(|e| Kind::BadRequest(format!("invalid json body: {e}")))?;
    }

    producer_state::check_and_advance(
        &mut tx,
        stream.id,
        &ProducerHeaders {
            producer_id: producer_id.as_deref(),
            epoch: producer_epoch,
            seq: producer_seq,
        },
        chrono::Duration::from_std(state.config.producer_state_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(7)),
    )
    .await?;

    let (sequence, byte_offset) = crate::repo::chunks::append_chunk(
        &mut tx,
        stream.id,
        stream.write_seq,
        stream.total_bytes,
        &body,
        is_json_boundary,
    )
    .await?;

    tx.commit().await.map_err(Kind::from)?;

    let new_total_bytes = byte_offset + body.len() as i64;
    state.waiters.notify(stream.id, new_total_bytes).await;

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    let next_cursor = cursor::encode(
        new_total_bytes as u64,
        now,
        state.config.cursor_epoch_unix_seconds,
        state.config.cursor_interval_seconds,
    );

    let result = AppendResult {
        sequence,
        byte_offset,
        size: body.len() as i64,
        cursor: next_cursor,
    };

    Ok((StatusCode::ACCEPTED, Json(result)).into_response())
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}
