use sqlx::PgPool;
use time::OffsetDateTime;

use crate::db::models::Submission;
use crate::db::types::SubmissionStatus;

const COLUMNS: &str =
    "id, task_alias, submission_code, status, score, hints, submitted_at, completed_at";

pub(crate) async fn insert_pending(
    pool: &PgPool,
    task_alias: &str,
    answers: &[String],
    submitted_at: OffsetDateTime,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO submissions (task_alias, submission_code, status, hints, submitted_at)
         VALUES ($1, $2, $3, '{}', $4)
         RETURNING id",
    )
    .bind(task_alias)
    .bind(answers)
    .bind(SubmissionStatus::Pending)
    .bind(submitted_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!("SELECT {COLUMNS} FROM submissions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Moves a `Pending` submission to its terminal state. Returns `false` when the
/// row is missing or already terminal.
pub(crate) async fn complete(
    pool: &PgPool,
    id: i64,
    status: SubmissionStatus,
    score: Option<i32>,
    hints: &[String],
    completed_at: OffsetDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE submissions
         SET status = $1, score = $2, hints = $3, completed_at = $4
         WHERE id = $5 AND status = $6",
    )
    .bind(status)
    .bind(score)
    .bind(hints)
    .bind(completed_at)
    .bind(id)
    .bind(SubmissionStatus::Pending)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn force_fail(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE submissions SET status = $1, completed_at = NOW() WHERE id = $2 AND status = $3",
    )
    .bind(SubmissionStatus::Failed)
    .bind(id)
    .bind(SubmissionStatus::Pending)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn fail_stale(
    pool: &PgPool,
    submitted_before: OffsetDateTime,
    now: OffsetDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE submissions
         SET status = $1, completed_at = $2
         WHERE status = $3 AND submitted_at < $4",
    )
    .bind(SubmissionStatus::Failed)
    .bind(now)
    .bind(SubmissionStatus::Pending)
    .bind(submitted_before)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
