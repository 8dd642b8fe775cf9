use axum::{
    Json,
    extract::{Query, State},
    http::{Method, StatusCode},
};
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::{
    config::AppConfig,
    error::AppError,
    extractors::{Identity, Payload, RequestUrl, ResourcePath},
    models::Post,
    pagination::{LimitOffset, LimitOffsetParams, Listing},
    policy::POSTS,
    serializers::{Fields, PostInput, PostResponse, REQUIRED},
};

const POST_SELECT: &str = "SELECT
        p.id,
        p.text,
        p.pub_date,
        p.author_id,
        u.username AS author,
        p.image,
        p.group_id
    FROM
        posts p
    JOIN
        users u ON u.id = p.author_id";

pub(crate) async fn fetch_post(pool: &SqlitePool, id: i64) -> Result<Post, AppError> {
    let query = format!("{POST_SELECT} WHERE p.id = ?");
    sqlx::query_as::<_, Post>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

// Reads the writable fields and checks that a referenced group exists.
async fn read_input(pool: &SqlitePool, body: &Value, partial: bool) -> Result<PostInput, AppError> {
    let mut fields = Fields::new(body, partial)?;
    let input = PostInput::read(&mut fields);

    if let Some(Some(group_id)) = input.group {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM post_groups WHERE id = ?)")
                .bind(group_id)
                .fetch_one(pool)
                .await?;
        if !exists {
            fields.reject(
                "group",
                format!("Invalid pk \"{group_id}\" - object does not exist."),
            );
        }
    }

    fields.finish(input)
}

pub async fn list_posts(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    method: Method,
    identity: Identity,
    url: RequestUrl,
    Query(params): Query<LimitOffsetParams>,
) -> Result<Json<Listing<PostResponse>>, AppError> {
    POSTS.check(&method, &identity)?;

    let window = LimitOffset::new(&params, config.pagination.default_limit);
    let (limit, offset) = window.sql_window();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(&pool)
        .await?;

    let query = format!("{POST_SELECT} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?");
    let posts = sqlx::query_as::<_, Post>(&query)
        .bind(limit)
        .bind(offset)
        .fetch_all(&pool)
        .await?;

    let results = posts.into_iter().map(PostResponse::from).collect();
    Ok(Json(window.paginate(&url, count, results)))
}

pub async fn get_post(
    State(pool): State<SqlitePool>,
    method: Method,
    identity: Identity,
    ResourcePath(id): ResourcePath<i64>,
) -> Result<Json<PostResponse>, AppError> {
    POSTS.check(&method, &identity)?;
    let post = fetch_post(&pool, id).await?;
    POSTS.check_object(&method, &identity, &post)?;

    Ok(Json(post.into()))
}

pub async fn create_post(
    State(pool): State<SqlitePool>,
    method: Method,
    identity: Identity,
    payload: Payload,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    POSTS.check(&method, &identity)?;
    let author = identity.require()?;

    let body = payload.json()?;
    let input = read_input(&pool, &body, false).await?;
    let text = input
        .text
        .ok_or_else(|| AppError::field("text", REQUIRED))?;

    // Any author sent in the body is ignored; the requester owns the post.
    let post_id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO posts (text, pub_date, author_id, image, group_id)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
        "#,
    )
    .bind(&text)
    .bind(Utc::now())
    .bind(author.id)
    .bind(input.image.flatten())
    .bind(input.group.flatten())
    .fetch_one(&pool)
    .await?;

    tracing::info!(post_id, author = %author.username, "post created");

    let post = fetch_post(&pool, post_id).await?;
    Ok((StatusCode::CREATED, Json(post.into())))
}

/// Serves both PUT and PATCH; PATCH does not require every field.
pub async fn update_post(
    State(pool): State<SqlitePool>,
    method: Method,
    identity: Identity,
    ResourcePath(id): ResourcePath<i64>,
    payload: Payload,
) -> Result<Json<PostResponse>, AppError> {
    POSTS.check(&method, &identity)?;
    let post = fetch_post(&pool, id).await?;
    POSTS.check_object(&method, &identity, &post)?;

    let body = payload.json()?;
    let input = read_input(&pool, &body, method == Method::PATCH).await?;

    sqlx::query(
        r#"
            UPDATE
                posts
            SET
                text = ?,
                image = ?,
                group_id = ?
            WHERE
                id = ?
        "#,
    )
    .bind(input.text.unwrap_or(post.text))
    .bind(input.image.unwrap_or(post.image))
    .bind(input.group.unwrap_or(post.group_id))
    .bind(id)
    .execute(&pool)
    .await?;

    let post = fetch_post(&pool, id).await?;
    Ok(Json(post.into()))
}

pub async fn delete_post(
    State(pool): State<SqlitePool>,
    method: Method,
    identity: Identity,
    ResourcePath(id): ResourcePath<i64>,
) -> Result<StatusCode, AppError> {
    POSTS.check(&method, &identity)?;
    let post = fetch_post(&pool, id).await?;
    POSTS.check_object(&method, &identity, &post)?;

    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    tracing::info!(post_id = id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}
