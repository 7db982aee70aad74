use sqlx::PgPool;
use time::OffsetDateTime;

pub(crate) async fn insert(
    pool: &PgPool,
    id: &str,
    user_id: &str,
    expires_at: OffsetDateTime,
    created_at: OffsetDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO refresh_tokens (id, user_id, expires_at, created_at)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(user_id)
    .bind(expires_at)
    .bind(created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Deletes the token and returns its owner when it has not expired yet.
pub(crate) async fn consume(
    pool: &PgPool,
    id: &str,
    now: OffsetDateTime,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "DELETE FROM refresh_tokens
         WHERE id = $1 AND expires_at > $2
         RETURNING user_id",
    )
    .bind(id)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn delete_expired(pool: &PgPool, now: OffsetDateTime) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
