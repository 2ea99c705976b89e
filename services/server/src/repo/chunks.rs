use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::errors::Kind;

#[derive(Debug, Clone)]
pub struct Chunk {
    pub sequence: i64,
    pub byte_offset: i64,
    pub data: Vec<u8>,
    pub size: i64,
    pub is_json_boundary: bool,
    pub created_at: DateTime<Utc>,
}

/// Inserts the next chunk for a stream and advances its counters, within
/// the caller's transaction. The caller must already hold the stream's
/// row lock (`streams::get_stream_for_update`) so `write_seq`/`total_bytes`
/// here are read-consistent with the lock, not re-read from a stale value.
pub async fn append_chunk(
    conn: &mut PgConnection,
    stream_id: Uuid,
    write_seq: i64,
    total_bytes: i64,
    data: &[u8],
    is_json_boundary: bool,
) -> Result<(i64, i64), Kind> {
    let sequence = write_seq + 1;
    let byte_offset = total_bytes;
    let size = data.len() as i64;

    sqlx::query!(
        r#"INSERT INTO durable_stream_chunks
             (stream_id, sequence, byte_offset, data, size, is_json_boundary, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, now())"#,
        stream_id,
        sequence,
        byte_offset,
        data,
        size,
        is_json_boundary,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query!(
        r#"UPDATE durable_streams
           SET write_seq = $2, total_bytes = $3, updated_at = now()
           WHERE id = $1"#,
        stream_id,
        sequence,
        total_bytes + size,
    )
    .execute(&mut *conn)
    .await?;

    Ok((sequence, byte_offset))
}

/// Returns chunks with `byte_offset >= from_offset`, stopping once the
/// cumulative size would exceed `max_bytes`. Chunks are never split (§4.2).
pub async fn read_range(
    pool: &sqlx::PgPool,
    stream_id: Uuid,
    from_offset: i64,
    max_bytes: i64,
) -> Result<Vec<Chunk>, Kind> {
    let rows = sqlx::query!(
        r#"SELECT sequence, byte_offset, data, size, is_json_boundary, created_at
           FROM durable_stream_chunks
           WHERE stream_id = $1 AND byte_offset >= $2
           ORDER BY sequence ASC"#,
        stream_id,
        from_offset,
    )
    .fetch_all(pool)
    .await?;

    let mut out = Vec::new();
    let mut budget = 0i64;
    for row in rows {
        if budget > 0 && budget + row.size > max_bytes {
            break;
        }
        budget += row.size;
        out.push(Chunk {
            sequence: row.sequence,
            byte_offset: row.byte_offset,
            data: row.data,
            size: row.size,
            is_json_boundary: row.is_json_boundary,
            created_at: row.created_at,
        });
        if budget >= max_bytes {
            break;
        }
    }
    Ok(out)
}

/// Deletes chunks whose end-offset is at or before `through_offset`.
/// Remaining offsets are never rewritten (§4.2).
pub async fn truncate(
    pool: &sqlx::PgPool,
    stream_id: Uuid,
    through_offset: i64,
) -> Result<u64, Kind> {
    let result = sqlx::query!(
        r#"DELETE FROM durable_stream_chunks
           WHERE stream_id = $1 AND byte_offset + size <= $2"#,
        stream_id,
        through_offset,
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
