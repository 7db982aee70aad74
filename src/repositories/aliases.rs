use sqlx::PgPool;

pub(crate) async fn exists(pool: &PgPool, alias: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM aliases WHERE alias = $1)")
        .bind(alias)
        .fetch_one(pool)
        .await
}

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    alias: &str,
    task_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO aliases (alias, task_id) VALUES ($1, $2)")
        .bind(alias)
        .bind(task_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn random_public(pool: &PgPool) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT a.alias
         FROM aliases a
         JOIN tasks t ON t.id = a.task_id
         WHERE t.public
         ORDER BY random()
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}
