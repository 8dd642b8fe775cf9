use axum::{Json, extract::State, http::Method};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    extractors::{Identity, ResourcePath},
    models::Group,
    policy::GROUPS,
};

// Groups are read-only over HTTP; they are managed with the `manage` tool.

pub async fn list_groups(
    State(pool): State<SqlitePool>,
    method: Method,
    identity: Identity,
) -> Result<Json<Vec<Group>>, AppError> {
    GROUPS.check(&method, &identity)?;

    let groups = sqlx::query_as::<_, Group>(
        "SELECT id, title, slug, description FROM post_groups ORDER BY title, id",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(groups))
}

pub async fn get_group(
    State(pool): State<SqlitePool>,
    method: Method,
    identity: Identity,
    ResourcePath(id): ResourcePath<i64>,
) -> Result<Json<Group>, AppError> {
    GROUPS.check(&method, &identity)?;

    let group = sqlx::query_as::<_, Group>(
        "SELECT id, title, slug, description FROM post_groups WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(Json(group))
}
