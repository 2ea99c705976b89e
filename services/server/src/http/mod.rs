pub mod append;
pub mod reads;
pub mod response;
pub mod sse;
pub mod streams;

pub(crate) const HEADER_STREAM_CURSOR: &str = "x-stream-cursor";
pub(crate) const HEADER_WRITE_SEQ: &str = "x-stream-write-seq";
pub(crate) const HEADER_TOTAL_BYTES: &str = "x-stream-total-bytes";
pub(crate) const HEADER_PRODUCER_ID: &str = "x-producer-id";
pub(crate) const HEADER_PRODUCER_EPOCH: &str = "x-producer-epoch";
pub(crate) const HEADER_PRODUCER_SEQ: &str = "x-producer-seq";

/// Strips the literal `:truncate` admin suffix axum's wildcard routing
/// cannot express as its own route. Returns `None` for an ordinary append path.
pub(crate) fn strip_truncate_suffix(path: &str) -> Option<&str> {
    path.strip_suffix(":truncate")
}

/// Query parameters for `POST /{path}`, covering both the append and
/// truncate operations since they share one route (§6).
#[derive(Debug, serde::Deserialize, Default)]
pub struct PostQuery {
    pub through: Option<String>,
}
