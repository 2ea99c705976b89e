//! The error kind taxonomy from the core's contract (see protocol::error_codes).
//!
//! Each append/read/admin path narrows to the subset of kinds it can
//! actually produce; this enum is the union used internally so store and
//! service code can propagate with `?` before the HTTP layer renders it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use protocol::{error_codes, HttpErrorEnvelope};

#[derive(Debug, thiserror::Error)]
pub enum Kind {
    #[error("stream not found")]
    NotFound,
    #[error("stream already exists with a different content type")]
    StreamConflict,
    #[error("content type does not match the stream")]
    ContentTypeMismatch,
    #[error("cursor is past the end of the stream")]
    InvalidOffset,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("producer epoch is stale")]
    StaleEpoch,
    #[error("producer sequence already accepted")]
    SequenceConflict,
    #[error("producer sequence is ahead of the expected value")]
    SequenceGap,
    #[error("unauthorized")]
    Unauthorized,
    #[error("content type cannot be streamed as sse")]
    SseNotSupported,
    #[error("too many waiters on this stream")]
    WaiterSaturation,
    #[error("gone")]
    Gone,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl Kind {
    pub fn retryable(&self) -> bool {
        matches!(self, Kind::SequenceGap | Kind::WaiterSaturation | Kind::StoreUnavailable(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            Kind::NotFound => StatusCode::NOT_FOUND,
            Kind::StreamConflict | Kind::SequenceConflict => StatusCode::CONFLICT,
            Kind::ContentTypeMismatch => StatusCode::CONFLICT,
            Kind::InvalidOffset | Kind::BadRequest(_) => StatusCode::BAD_REQUEST,
            Kind::StaleEpoch => StatusCode::CONFLICT,
            Kind::SequenceGap => StatusCode::CONFLICT,
            Kind::Unauthorized => StatusCode::UNAUTHORIZED,
            Kind::SseNotSupported => StatusCode::BAD_REQUEST,
            Kind::WaiterSaturation => StatusCode::TOO_MANY_REQUESTS,
            Kind::Gone => StatusCode::GONE,
            Kind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Kind::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Kind::NotFound => error_codes::NOT_FOUND,
            Kind::StreamConflict => error_codes::STREAM_CONFLICT,
            Kind::ContentTypeMismatch => error_codes::CONTENT_TYPE_MISMATCH,
            Kind::InvalidOffset => error_codes::INVALID_OFFSET,
            Kind::BadRequest(_) => error_codes::BAD_REQUEST,
            Kind::StaleEpoch => error_codes::STALE_EPOCH,
            Kind::SequenceConflict => error_codes::SEQUENCE_CONFLICT,
            Kind::SequenceGap => error_codes::SEQUENCE_GAP,
            Kind::Unauthorized => error_codes::UNAUTHORIZED,
            Kind::SseNotSupported => error_codes::SSE_NOT_SUPPORTED,
            Kind::WaiterSaturation => error_codes::WAITER_SATURATION,
            Kind::Gone => error_codes::GONE,
            Kind::PayloadTooLarge => error_codes::PAYLOAD_TOO_LARGE,
            Kind::StoreUnavailable(_) => error_codes::STORE_UNAVAILABLE,
        }
    }
}

impl From<sqlx::Error> for Kind {
    fn from(err: sqlx::Error) -> Self {
        Kind::StoreUnavailable(err.to_string())
    }
}

impl IntoResponse for Kind {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_owned();
        let message = self.to_string();
        (
            status,
            Json(HttpErrorEnvelope {
                code,
                message,
                details: None,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, Kind>;
