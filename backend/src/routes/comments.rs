use axum::{
    Json,
    extract::{Query, State},
    http::{Method, StatusCode},
};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    config::AppConfig,
    error::AppError,
    extractors::{Identity, Payload, RequestUrl, ResourcePath},
    models::Comment,
    pagination::{LimitOffset, LimitOffsetParams, Listing},
    policy::COMMENTS,
    serializers::{CommentInput, CommentResponse, Fields, REQUIRED},
};

const COMMENT_SELECT: &str = "SELECT
        c.id,
        c.author_id,
        u.username AS author,
        c.post_id,
        c.text,
        c.created
    FROM
        comments c
    JOIN
        users u ON u.id = c.author_id";

// Comments only exist under a post; an unknown post is a 404 for every method.
async fn resolve_post(pool: &SqlitePool, post_id: i64) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

async fn fetch_comment(pool: &SqlitePool, post_id: i64, id: i64) -> Result<Comment, AppError> {
    let query = format!("{COMMENT_SELECT} WHERE c.post_id = ? AND c.id = ?");
    sqlx::query_as::<_, Comment>(&query)
        .bind(post_id)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn list_comments(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    method: Method,
    identity: Identity,
    url: RequestUrl,
    ResourcePath(post_id): ResourcePath<i64>,
    Query(params): Query<LimitOffsetParams>,
) -> Result<Json<Listing<CommentResponse>>, AppError> {
    COMMENTS.check(&method, &identity)?;
    let post_id = resolve_post(&pool, post_id).await?;

    let window = LimitOffset::new(&params, config.pagination.default_limit);
    let (limit, offset) = window.sql_window();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?")
        .bind(post_id)
        .fetch_one(&pool)
        .await?;

    let query = format!(
        "{COMMENT_SELECT} WHERE c.post_id = ? ORDER BY c.created DESC, c.id DESC LIMIT ? OFFSET ?"
    );
    let comments = sqlx::query_as::<_, Comment>(&query)
        .bind(post_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&pool)
        .await?;

    let results = comments.into_iter().map(CommentResponse::from).collect();
    Ok(Json(window.paginate(&url, count, results)))
}

pub async fn get_comment(
    State(pool): State<SqlitePool>,
    method: Method,
    identity: Identity,
    ResourcePath((post_id, id)): ResourcePath<(i64, i64)>,
) -> Result<Json<CommentResponse>, AppError> {
    COMMENTS.check(&method, &identity)?;
    let post_id = resolve_post(&pool, post_id).await?;
    let comment = fetch_comment(&pool, post_id, id).await?;
    COMMENTS.check_object(&method, &identity, &comment)?;

    Ok(Json(comment.into()))
}

pub async fn create_comment(
    State(pool): State<SqlitePool>,
    method: Method,
    identity: Identity,
    ResourcePath(post_id): ResourcePath<i64>,
    payload: Payload,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    COMMENTS.check(&method, &identity)?;
    let author = identity.require()?;
    let post_id = resolve_post(&pool, post_id).await?;

    let body = payload.json()?;
    let mut fields = Fields::new(&body, false)?;
    let input = CommentInput::read(&mut fields);
    let input = fields.finish(input)?;
    let text = input
        .text
        .ok_or_else(|| AppError::field("text", REQUIRED))?;

    // Author and post come from the request context, never from the body.
    let comment_id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO comments (author_id, post_id, text, created)
            VALUES (?, ?, ?, ?)
            RETURNING id
        "#,
    )
    .bind(author.id)
    .bind(post_id)
    .bind(&text)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await?;

    tracing::info!(comment_id, post_id, author = %author.username, "comment created");

    let comment = fetch_comment(&pool, post_id, comment_id).await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

pub async fn update_comment(
    State(pool): State<SqlitePool>,
    method: Method,
    identity: Identity,
    ResourcePath((post_id, id)): ResourcePath<(i64, i64)>,
    payload: Payload,
) -> Result<Json<CommentResponse>, AppError> {
    COMMENTS.check(&method, &identity)?;
    let post_id = resolve_post(&pool, post_id).await?;
    let comment = fetch_comment(&pool, post_id, id).await?;
    COMMENTS.check_object(&method, &identity, &comment)?;

    let body = payload.json()?;
    let mut fields = Fields::new(&body, method == Method::PATCH)?;
    let input = CommentInput::read(&mut fields);
    let input = fields.finish(input)?;

    sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
        .bind(input.text.unwrap_or(comment.text))
        .bind(id)
        .execute(&pool)
        .await?;

    let comment = fetch_comment(&pool, post_id, id).await?;
    Ok(Json(comment.into()))
}

pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    method: Method,
    identity: Identity,
    ResourcePath((post_id, id)): ResourcePath<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    COMMENTS.check(&method, &identity)?;
    let post_id = resolve_post(&pool, post_id).await?;
    let comment = fetch_comment(&pool, post_id, id).await?;
    COMMENTS.check_object(&method, &identity, &comment)?;

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    tracing::info!(comment_id = id, post_id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
