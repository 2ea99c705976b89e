use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::errors::Kind;

#[derive(Debug, Clone)]
pub struct Stream {
    pub id: Uuid,
    pub path: String,
    pub content_type: String,
    pub write_seq: i64,
    pub total_bytes: i64,
    pub ttl_seconds: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creates a stream, or returns the existing one if its content type
/// matches (§4.2: "idempotent only when contentType matches"). `path` is
/// globally unique even across tombstoned/expired rows not yet physically
/// purged, so a `PUT` on a dead path resurrects that row — fresh write
/// position, old chunks and producer state dropped — rather than being
/// permanently blocked until the next sweep.
pub async fn create_stream(
    pool: &PgPool,
    path: &str,
    content_type: &str,
    ttl_seconds: Option<i64>,
) -> Result<Stream, Kind> {
    let existing = sqlx::query!(
        r#"SELECT id, content_type, deleted_at, expires_at FROM durable_streams WHERE path = $1"#,
        path,
    )
    .fetch_optional(pool)
    .await?;

    let expires_at = ttl_seconds.map(|secs| Utc::now() + chrono::Duration::seconds(secs));

    let Some(existing) = existing else {
        let row = sqlx::query!(
            r#"INSERT INTO durable_streams (id, path, content_type, ttl_seconds, expires_at, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, now(), now())
               ON CONFLICT (path) DO NOTHING
               RETURNING id, path, content_type, write_seq, total_bytes, ttl_seconds, expires_at, created_at, updated_at"#,
            Uuid::new_v4(),
            path,
            content_type,
            ttl_seconds,
            expires_at,
        )
        .fetch_optional(pool)
        .await?;

        return match row {
            Some(row) => Ok(Stream {
                id: row.id,
                path: row.path,
                content_type: row.content_type,
                write_seq: row.write_seq,
                total_bytes: row.total_bytes,
                ttl_seconds: row.ttl_seconds,
                expires_at: row.expires_at,
                created_at: row.created_at,
                updated_at: row.updated_at,
            }),
            // Lost the race against a concurrent create; re-run from scratch.
            None => Box::pin(create_stream(pool, path, content_type, ttl_seconds)).await,
        };
    };

    let is_dead = existing.deleted_at.is_some()
        || existing.expires_at.is_some_and(|expires_at| expires_at <= Utc::now());

    if !is_dead {
        if existing.content_type == content_type {
            return get_stream(pool, path).await?.ok_or(Kind::StoreUnavailable(
                "stream vanished between lookup and re-read".into(),
            ));
        }
        return Err(Kind::StreamConflict);
    }

    sqlx::query!(
        r#"DELETE FROM durable_stream_chunks WHERE stream_id = $1"#,
        existing.id,
    )
    .execute(pool)
    .await?;
    sqlx::query!(
        r#"DELETE FROM durable_producer_state WHERE stream_id = $1"#,
        existing.id,
    )
    .execute(pool)
    .await?;

    let row = sqlx::query!(
        r#"UPDATE durable_streams
           SET content_type = $2, ttl_seconds = $3, expires_at = $4, deleted_at = NULL,
               write_seq = 0, total_bytes = 0, updated_at = now()
           WHERE id = $1
           RETURNING id, path, content_type, write_seq, total_bytes, ttl_seconds, expires_at, created_at, updated_at"#,
        existing.id,
        content_type,
        ttl_seconds,
        expires_at,
    )
    .fetch_one(pool)
    .await?;

    Ok(Stream {
        id: row.id,
        path: row.path,
        content_type: row.content_type,
        write_seq: row.write_seq,
        total_bytes: row.total_bytes,
        ttl_seconds: row.ttl_seconds,
        expires_at: row.expires_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Looks up a stream by path, distinguishing "never existed or
/// soft-deleted" (`NotFound`, 404) from "past its TTL" (`Gone`, 410) per
/// the status table in §4.8 — both are absent from `get_stream`/
/// `get_stream_for_update`'s live-row view, but the edge reports them
/// differently.
pub async fn get_stream(pool: &PgPool, path: &str) -> Result<Option<Stream>, Kind> {
    let row = sqlx::query!(
        r#"SELECT id, path, content_type, write_seq, total_bytes, ttl_seconds, expires_at, created_at, updated_at,
                  deleted_at
           FROM durable_streams
           WHERE path = $1"#,
        path,
    )
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    if row.deleted_at.is_some() {
        return Ok(None);
    }
    if row.expires_at.is_some_and(|expires_at| expires_at <= Utc::now()) {
        return Err(Kind::Gone);
    }

    Ok(Some(Stream {
        id: row.id,
        path: row.path,
        content_type: row.content_type,
        write_seq: row.write_seq,
        total_bytes: row.total_bytes,
        ttl_seconds: row.ttl_seconds,
        expires_at: row.expires_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

/// Locks and returns the stream row for the duration of the caller's
/// transaction (§4.2: "row-level lock on the stream record").
pub async fn get_stream_for_update(
    conn: &mut PgConnection,
    path: &str,
) -> Result<Option<Stream>, Kind> {
    let row = sqlx::query!(
        r#"SELECT id, path, content_type, write_seq, total_bytes, ttl_seconds, expires_at, created_at, updated_at,
                  deleted_at
           FROM durable_streams
           WHERE path = $1
           FOR UPDATE"#,
        path,
    )
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    if row.deleted_at.is_some() {
        return Ok(None);
    }
    if row.expires_at.is_some_and(|expires_at| expires_at <= Utc::now()) {
        return Err(Kind::Gone);
    }

    Ok(Some(Stream {
        id: row.id,
        path: row.path,
        content_type: row.content_type,
        write_seq: row.write_seq,
        total_bytes: row.total_bytes,
        ttl_seconds: row.ttl_seconds,
        expires_at: row.expires_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

pub async fn delete_stream(pool: &PgPool, path: &str) -> Result<(), Kind> {
    let result = sqlx::query!(
        r#"UPDATE durable_streams SET deleted_at = now(), updated_at = now()
           WHERE path = $1 AND deleted_at IS NULL"#,
        path,
    )
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Kind::NotFound);
    }
    Ok(())
}

/// Marks expired streams tombstoned and purges already-tombstoned ones
/// (§4.8 state machine: `expired -> tombstoned -> purged`). Returns the
/// number of streams physically removed.
pub async fn sweep_expired(pool: &PgPool) -> Result<u64, Kind> {
    sqlx::query!(
        r#"UPDATE durable_streams SET deleted_at = now()
           WHERE deleted_at IS NULL AND expires_at IS NOT NULL AND expires_at <= now()"#,
    )
    .execute(pool)
    .await?;

    let purged = sqlx::query!(
        r#"DELETE FROM durable_streams WHERE deleted_at IS NOT NULL AND deleted_at <= now() - interval '1 day'"#,
    )
    .execute(pool)
    .await?;

    Ok(purged.rows_affected())
}
