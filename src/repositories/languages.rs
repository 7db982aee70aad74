use sqlx::PgPool;

use crate::db::models::ProgrammingLanguage;

pub(crate) async fn find_by_name(
    pool: &PgPool,
    name: &str,
) -> Result<Option<ProgrammingLanguage>, sqlx::Error> {
    sqlx::query_as::<_, ProgrammingLanguage>(
        "SELECT id, name FROM programming_languages WHERE lower(name) = lower($1)",
    )
    .bind(name.trim())
    .fetch_optional(pool)
    .await
}
