use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::errors::{ApiResult, Kind};
use crate::http::response::authenticate;
use crate::http::sse::sse_read;
use crate::http::{HEADER_STREAM_CURSOR, HEADER_TOTAL_BYTES, HEADER_WRITE_SEQ};
use crate::repo::chunks::{self, Chunk};
use crate::repo::streams;
use crate::state::AppState;
use protocol::cursor;

const DEFAULT_MAX_BYTES: i64 = 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct ReadQuery {
    pub cursor: Option<String>,
    #[serde(default)]
    pub wait: bool,
    pub max_bytes: Option<i64>,
    pub format: Option<String>,
}

/// `GET /{path}` — offset read, optionally long-polling when empty (§4.6).
pub async fn read(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ReadQuery>,
) -> ApiResult<Response> {
    authenticate(&state, &headers).await?;

    let stream = streams::get_stream(&state.pool, &path)
        .await?
        .ok_or(Kind::NotFound)?;

    if query.format.as_deref() == Some("sse") {
        return sse_read(state, stream, headers, query.cursor).await;
    }

    let from_offset = decode_from_offset(query.cursor.as_deref())?;
    if from_offset > stream.total_bytes {
        return Err(Kind::InvalidOffset);
    }

    let max_bytes = query.max_bytes.unwrap_or(DEFAULT_MAX_BYTES);
    let format = query.format.as_deref().unwrap_or("raw");

    let chunks = chunks::read_range(&state.pool, stream.id, from_offset, max_bytes).await?;

    if !chunks.is_empty() {
        return render(&stream, &chunks, format, &state);
    }

    if !query.wait {
        return Ok(empty_response(&stream, from_offset, &state));
    }

    let Some(mut rx) = state.waiters.subscribe(stream.id).await else {
        return Err(Kind::WaiterSaturation);
    };

    let deadline = tokio::time::Instant::now() + state.config.long_poll_timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Ok(empty_response(&stream, from_offset, &state));
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok(_notification)) => {
                let chunks = chunks::read_range(&state.pool, stream.id, from_offset, max_bytes)
                    .await?;
                if !chunks.is_empty() {
                    return render(&stream, &chunks, format, &state);
                }
                // Spurious or coalesced wakeup; keep waiting until the deadline.
            }
            Ok(Err(_lagged_or_closed)) => {
                return Ok(empty_response(&stream, from_offset, &state));
            }
            Err(_timed_out) => {
                return Ok(empty_response(&stream, from_offset, &state));
            }
        }
    }
}

fn decode_from_offset(cursor_param: Option<&str>) -> ApiResult<i64> {
    match cursor_param {
        None => Ok(0),
        Some(s) if s.is_empty() => Ok(0),
        Some(s) => cursor::decode(s)
            .map(|c| c.byte_offset as i64)
            .map_err(|_| Kind::BadRequest("malformed cursor".into())),
    }
}

fn render(
    stream: &streams::Stream,
    chunks: &[Chunk],
    format: &str,
    state: &AppState,
) -> ApiResult<Response> {
    let last = chunks.last().expect("render called with non-empty chunks");
    let next_offset = last.byte_offset + last.size;
    let next_cursor = encode_cursor(next_offset, state);

    let body = match format {
        "raw" => {
            let mut buf = Vec::new();
            for chunk in chunks {
                buf.extend_from_slice(&chunk.data);
            }
            buf
        }
        "json-array" => {
            if stream.content_type != "application/json" {
                return Err(Kind::BadRequest(
                    "json-array format requires an application/json stream".into(),
                ));
            }
            let values: Vec<serde_json::Value> = chunks
                .iter()
                .filter_map(|c| serde_json::from_slice(&c.data).ok())
                .collect();
            serde_json::to_vec(&values).map_err(|e| Kind::BadRequest(e.to_string()))?
        }
        "ndjson" => {
            if stream.content_type != "application/json" {
                return Err(Kind::BadRequest(
                    "ndjson format requires an application/json stream".into(),
                ));
            }
            let mut buf = Vec::new();
            for chunk in chunks {
                buf.extend_from_slice(&chunk.data);
                buf.push(b'\n');
            }
            buf
        }
        other => return Err(Kind::BadRequest(format!("unknown format: {other}"))),
    };

    let mut response = (StatusCode::OK, body).into_response();
    set_stream_headers(&mut response, stream, &next_cursor);
    Ok(response)
}

fn empty_response(stream: &streams::Stream, from_offset: i64, state: &AppState) -> Response {
    let cursor_str = encode_cursor(from_offset, state);
    let mut response = StatusCode::NO_CONTENT.into_response();
    set_stream_headers(&mut response, stream, &cursor_str);
    response
}

fn encode_cursor(offset: i64, state: &AppState) -> String {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    cursor::encode(
        offset as u64,
        now,
        state.config.cursor_epoch_unix_seconds,
        state.config.cursor_interval_seconds,
    )
}

fn set_stream_headers(response: &mut Response, stream: &streams::Stream, cursor_str: &str) {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(cursor_str) {
        headers.insert(HEADER_STREAM_CURSOR, v);
    }
    headers.insert(HEADER_WRITE_SEQ, HeaderValue::from(stream.write_seq));
    headers.insert(HEADER_TOTAL_BYTES, HeaderValue::from(stream.total_bytes));
    if let Ok(v) = HeaderValue::from_str(&stream.content_type) {
        headers.insert(axum::http::header::CONTENT_TYPE, v);
    }
}
