//! Opaque, monotonic resume cursors.
//!
//! A cursor packs a coarse time bucket and a precise byte offset into a
//! base64url string. The time bucket exists purely so cursors are
//! diagnosable in logs; callers must never compare cursors as strings
//! across time buckets, only `decode` them and compare `byte_offset`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Cursor time-bucket width, in seconds, when the operator hasn't overridden it.
pub const DEFAULT_INTERVAL_SECONDS: u64 = 20;

/// `2024-10-09T00:00:00Z` as a Unix timestamp.
pub const DEFAULT_EPOCH_UNIX_SECONDS: u64 = 1_728_432_000;

const TIME_BUCKET_BYTES: usize = 4;
const BYTE_OFFSET_BYTES: usize = 8;
const ENCODED_LEN: usize = TIME_BUCKET_BYTES + BYTE_OFFSET_BYTES;

/// A decoded cursor: a coarse time bucket plus the exact byte offset it resumes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub time_bucket: u32,
    pub byte_offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    #[error("malformed cursor")]
    Malformed,
}

/// Encode a byte offset into an opaque cursor string.
///
/// `now_unix_seconds` is quantized to `floor((now - epoch) / interval_seconds)`
/// before encoding, so two encodes within the same bucket produce cursors that
/// only differ in their byte component.
pub fn encode(
    byte_offset: u64,
    now_unix_seconds: u64,
    epoch_unix_seconds: u64,
    interval_seconds: u64,
) -> String {
    let elapsed = now_unix_seconds.saturating_sub(epoch_unix_seconds);
    let bucket = (elapsed / interval_seconds.max(1)) as u32;
    let mut buf = [0u8; ENCODED_LEN];
    buf[..TIME_BUCKET_BYTES].copy_from_slice(&bucket.to_be_bytes());
    buf[TIME_BUCKET_BYTES..].copy_from_slice(&byte_offset.to_be_bytes());
    URL_SAFE_NO_PAD.encode(buf)
}

/// Decode a cursor string produced by `encode`.
pub fn decode(s: &str) -> Result<Cursor, CursorError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(s.as_bytes())
        .map_err(|_| CursorError::Malformed)?;
    if bytes.len() != ENCODED_LEN {
        return Err(CursorError::Malformed);
    }
    let time_bucket = u32::from_be_bytes(bytes[..TIME_BUCKET_BYTES].try_into().unwrap());
    let byte_offset = u64::from_be_bytes(bytes[TIME_BUCKET_BYTES..].try_into().unwrap());
    Ok(Cursor {
        time_bucket,
        byte_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_offset() {
        for offset in [0u64, 1, 4096, u64::MAX / 2] {
            let s = encode(offset, 1_800_000_000, DEFAULT_EPOCH_UNIX_SECONDS, DEFAULT_INTERVAL_SECONDS);
            let decoded = decode(&s).unwrap();
            assert_eq!(decoded.byte_offset, offset);
        }
    }

    #[test]
    fn same_bucket_orders_lexicographically_with_offset() {
        let now = DEFAULT_EPOCH_UNIX_SECONDS + 100;
        let a = encode(10, now, DEFAULT_EPOCH_UNIX_SECONDS, DEFAULT_INTERVAL_SECONDS);
        let b = encode(20, now, DEFAULT_EPOCH_UNIX_SECONDS, DEFAULT_INTERVAL_SECONDS);
        assert!(a < b);
        assert_eq!(decode(&a).unwrap().time_bucket, decode(&b).unwrap().time_bucket);
    }

    #[test]
    fn different_time_buckets_are_tracked() {
        let a = encode(0, DEFAULT_EPOCH_UNIX_SECONDS, DEFAULT_EPOCH_UNIX_SECONDS, DEFAULT_INTERVAL_SECONDS);
        let b = encode(
            0,
            DEFAULT_EPOCH_UNIX_SECONDS + DEFAULT_INTERVAL_SECONDS,
            DEFAULT_EPOCH_UNIX_SECONDS,
            DEFAULT_INTERVAL_SECONDS,
        );
        assert_ne!(decode(&a).unwrap().time_bucket, decode(&b).unwrap().time_bucket);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_eq!(decode("not valid base64!!"), Err(CursorError::Malformed));
        assert_eq!(decode("aGVsbG8"), Err(CursorError::Malformed)); // wrong length
    }

    #[test]
    fn empty_cursor_is_malformed() {
        assert_eq!(decode(""), Err(CursorError::Malformed));
    }
}
