use sqlx::PgPool;
use time::OffsetDateTime;

use crate::db::models::Task;
use crate::db::types::TaskKind;

const SELECT_JOINED: &str = "\
    SELECT t.id, a.alias, t.user_id, t.type, t.task_code, t.original_code, t.answers, \
           l.name AS language, t.description, t.public, t.created_at \
    FROM tasks t \
    JOIN aliases a ON a.task_id = t.id \
    JOIN programming_languages l ON l.id = t.language_id";

pub(crate) struct InsertTask<'a> {
    pub user_id: &'a str,
    pub kind: TaskKind,
    pub task_code: &'a str,
    pub original_code: &'a str,
    pub answers: &'a [String],
    pub language_id: i32,
    pub description: Option<&'a str>,
    pub created_at: OffsetDateTime,
}

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    params: InsertTask<'_>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO tasks (
            user_id, type, task_code, original_code, answers, language_id, description, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id",
    )
    .bind(params.user_id)
    .bind(params.kind)
    .bind(params.task_code)
    .bind(params.original_code)
    .bind(params.answers)
    .bind(params.language_id)
    .bind(params.description)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_alias(pool: &PgPool, alias: &str) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!("{SELECT_JOINED} WHERE a.alias = $1"))
        .bind(alias)
        .fetch_optional(pool)
        .await
}

/// Swaps generated content in a single statement so readers never observe a
/// task whose code and answers disagree.
pub(crate) async fn replace_content(
    pool: &PgPool,
    alias: &str,
    task_code: &str,
    answers: &[String],
    description: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE tasks
         SET task_code = $1,
             answers = $2,
             description = $3
         WHERE id = (SELECT task_id FROM aliases WHERE alias = $4)",
    )
    .bind(task_code)
    .bind(answers)
    .bind(description)
    .bind(alias)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn set_public(pool: &PgPool, alias: &str, public: bool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE tasks SET public = $1 WHERE id = (SELECT task_id FROM aliases WHERE alias = $2)",
    )
    .bind(public)
    .bind(alias)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_public(
    pool: &PgPool,
    kind: Option<TaskKind>,
    offset: i64,
    limit: i64,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "{SELECT_JOINED}
         WHERE t.public AND ($1::tasktype IS NULL OR t.type = $1)
         ORDER BY t.created_at DESC, t.id DESC
         OFFSET $2 LIMIT $3"
    ))
    .bind(kind)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_public(pool: &PgPool, kind: Option<TaskKind>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM tasks WHERE public AND ($1::tasktype IS NULL OR type = $1)",
    )
    .bind(kind)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list_by_user(
    pool: &PgPool,
    user_id: &str,
    offset: i64,
    limit: i64,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "{SELECT_JOINED}
         WHERE t.user_id = $1
         ORDER BY t.created_at DESC, t.id DESC
         OFFSET $2 LIMIT $3"
    ))
    .bind(user_id)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_by_user(pool: &PgPool, user_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
}
