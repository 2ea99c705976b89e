use std::collections::VecDeque;
use std::convert::Infallible;

use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{self, Stream};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::errors::{ApiResult, Kind};
use crate::repo::chunks::{self, Chunk};
use crate::repo::streams::Stream as StoredStream;
use crate::state::AppState;
use protocol::cursor;

const SSE_READ_BATCH_BYTES: i64 = 4 * 1024 * 1024;

struct SsePump {
    state: AppState,
    stream_id: Uuid,
    content_type: String,
    offset: i64,
    queue: VecDeque<Chunk>,
    rx: broadcast::Receiver<crate::waiters::Notification>,
}

/// `GET /{path}?format=sse` — upgrades to a live tail (§4.7). Only
/// `application/json` and `text/*` streams may be tailed this way.
pub async fn sse_read(
    state: AppState,
    stream: StoredStream,
    headers: HeaderMap,
    query_cursor: Option<String>,
) -> ApiResult<Response> {
    let streamable = stream.content_type == "application/json" || stream.content_type.starts_with("text/");
    if !streamable {
        return Err(Kind::SseNotSupported);
    }

    let resume_cursor = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .or(query_cursor);

    let offset = match resume_cursor {
        None => 0,
        Some(s) if s.is_empty() => 0,
        Some(s) => cursor::decode(&s)
            .map(|c| c.byte_offset as i64)
            .map_err(|_| Kind::BadRequest("malformed cursor".into()))?,
    };

    let Some(rx) = state.waiters.subscribe(stream.id).await else {
        return Err(Kind::WaiterSaturation);
    };

    let heartbeat_interval = state.config.sse_heartbeat_interval;
    let pump = SsePump {
        state,
        stream_id: stream.id,
        content_type: stream.content_type,
        offset,
        queue: VecDeque::new(),
        rx,
    };

    let event_stream = build_stream(pump);
    let sse = Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(heartbeat_interval)
            .text("keepalive"),
    );
    Ok(sse.into_response())
}

fn build_stream(pump: SsePump) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(pump, |mut pump| async move {
        loop {
            if let Some(chunk) = pump.queue.pop_front() {
                let next_offset = chunk.byte_offset + chunk.size;
                pump.offset = next_offset;
                let now = chrono::Utc::now().timestamp().max(0) as u64;
                let cursor_str = cursor::encode(
                    next_offset as u64,
                    now,
                    pump.state.config.cursor_epoch_unix_seconds,
                    pump.state.config.cursor_interval_seconds,
                );
                let event = to_event(&chunk, &cursor_str, &pump.content_type);
                return Some((Ok(event), pump));
            }

            match chunks::read_range(&pump.state.pool, pump.stream_id, pump.offset, SSE_READ_BATCH_BYTES).await {
                Ok(fresh) if !fresh.is_empty() => {
                    pump.queue.extend(fresh);
                    continue;
                }
                Ok(_) => {}
                // The store went away mid-tail; end the pump rather than spin.
                Err(_) => return None,
            }

            match pump.rx.recv().await {
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

fn to_event(chunk: &Chunk, cursor_str: &str, content_type: &str) -> Event {
    let event_name = if content_type == "application/json" {
        "json"
    } else {
        "message"
    };
    let data = if content_type.starts_with("text/") || content_type == "application/json" {
        String::from_utf8_lossy(&chunk.data).into_owned()
    } else {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        STANDARD.encode(&chunk.data)
    };
    Event::default().id(cursor_str).event(event_name).data(data)
}
