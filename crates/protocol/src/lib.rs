// durable stream protocol: wire types shared between the server and any
// client, plus the opaque cursor codec.

pub mod cursor;

use serde::{Deserialize, Serialize};

/// Frozen HTTP error envelope used by all non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Frozen v1 error codes. Mirrors the error kind taxonomy the core surfaces;
/// the HTTP host maps a kind to one of these plus a status code.
pub mod error_codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const STREAM_CONFLICT: &str = "STREAM_CONFLICT";
    pub const CONTENT_TYPE_MISMATCH: &str = "CONTENT_TYPE_MISMATCH";
    pub const INVALID_OFFSET: &str = "INVALID_OFFSET";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const STALE_EPOCH: &str = "STALE_EPOCH";
    pub const SEQUENCE_CONFLICT: &str = "SEQUENCE_CONFLICT";
    pub const SEQUENCE_GAP: &str = "SEQUENCE_GAP";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const SSE_NOT_SUPPORTED: &str = "SSE_NOT_SUPPORTED";
    pub const WAITER_SATURATION: &str = "WAITER_SATURATION";
    pub const STORE_UNAVAILABLE: &str = "STORE_UNAVAILABLE";
    pub const GONE: &str = "GONE";
    pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// One entry describing an accepted chunk, used by `format=json-array` and
/// `format=ndjson` framing and by SSE event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub sequence: i64,
    pub byte_offset: i64,
    pub size: i64,
    pub cursor: String,
    /// Present only when the stream's content type is `application/json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Response body for `PUT /{path}` and surfaced by admin listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub path: String,
    pub content_type: String,
    pub write_seq: i64,
    pub total_bytes: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_omits_details_when_none() {
        let env = HttpErrorEnvelope {
            code: error_codes::NOT_FOUND.to_owned(),
            message: "stream not found".to_owned(),
            details: None,
        };
        let json = serde_json::to_string(&env).unwrap();
        assert!(!json.contains("details"));
    }
}
