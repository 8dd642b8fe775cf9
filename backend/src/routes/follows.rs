use axum::{
    Json,
    extract::{Query, State},
    http::{Method, StatusCode},
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    config::AppConfig,
    db,
    error::AppError,
    extractors::{Identity, Payload, RequestUrl},
    models::Follow,
    pagination::{Page, PageNumber, PageNumberParams},
    policy::FOLLOWS,
    serializers::{Fields, FollowInput, FollowResponse, REQUIRED},
};

pub const CANNOT_FOLLOW_SELF: &str = "You cannot follow yourself!";
pub const ALREADY_FOLLOWING: &str = "You are already following this user.";

#[derive(Deserialize, Debug, Default)]
pub struct FollowParams {
    #[serde(flatten)]
    page: PageNumberParams,
    search: Option<String>,
}

/// Lowercased search terms, split on whitespace and commas.
fn search_terms(search: Option<&str>) -> Vec<String> {
    search
        .unwrap_or_default()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .collect()
}

// `%` and `_` in a term match literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

pub async fn list_follows(
    State(pool): State<SqlitePool>,
    State(config): State<AppConfig>,
    method: Method,
    identity: Identity,
    url: RequestUrl,
    Query(params): Query<FollowParams>,
) -> Result<Json<Page<FollowResponse>>, AppError> {
    FOLLOWS.check(&method, &identity)?;
    let user = identity.require()?;

    let terms = search_terms(params.search.as_deref());
    let mut filter = String::from("f.user_id = ?");
    for _ in &terms {
        filter.push_str(" AND t.username_folded LIKE ? ESCAPE '\\'");
    }

    let count_query = format!(
        "SELECT COUNT(*) FROM follows f JOIN users t ON t.id = f.following_id WHERE {filter}"
    );
    let mut count = sqlx::query_scalar::<_, i64>(&count_query).bind(user.id);
    for term in &terms {
        count = count.bind(like_pattern(term));
    }
    let count = count.fetch_one(&pool).await?;

    let window = PageNumber::new(&params.page, count, config.pagination.page_size)?;
    let (limit, offset) = window.sql_window();

    let query = format!(
        r#"SELECT
            f.id,
            u.username AS "user",
            t.username AS following
        FROM
            follows f
        JOIN
            users u ON u.id = f.user_id
        JOIN
            users t ON t.id = f.following_id
        WHERE
            {filter}
        ORDER BY
            f.id
        LIMIT ? OFFSET ?"#
    );
    let mut follows = sqlx::query_as::<_, Follow>(&query).bind(user.id);
    for term in &terms {
        follows = follows.bind(like_pattern(term));
    }
    let follows = follows.bind(limit).bind(offset).fetch_all(&pool).await?;

    let results = follows.into_iter().map(FollowResponse::from).collect();
    Ok(Json(window.paginate(&url, count, results)))
}

/// Follows another user on the requester's behalf.
///
/// Every rejection is a 400 keyed under `following`. Duplicates are caught
/// from the `unique_follow` constraint at insert time, so concurrent requests
/// for the same pair cannot both succeed.
pub async fn create_follow(
    State(pool): State<SqlitePool>,
    method: Method,
    identity: Identity,
    payload: Payload,
) -> Result<(StatusCode, Json<FollowResponse>), AppError> {
    FOLLOWS.check(&method, &identity)?;
    let user = identity.require()?;

    let body = payload.json()?;
    let mut fields = Fields::new(&body, false)?;
    let input = FollowInput::read(&mut fields);
    let input = fields.finish(input)?;
    let username = input
        .following
        .ok_or_else(|| AppError::field("following", REQUIRED))?;

    let following = db::find_user_by_username(&pool, &username)
        .await?
        .ok_or_else(|| {
            AppError::field(
                "following",
                format!("Object with username={username} does not exist."),
            )
        })?;

    if following.id == user.id {
        tracing::debug!(user = %user.username, "rejected self follow");
        return Err(AppError::field("following", CANNOT_FOLLOW_SELF));
    }

    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO follows (user_id, following_id) VALUES (?, ?) RETURNING id",
    )
    .bind(user.id)
    .bind(following.id)
    .fetch_one(&pool)
    .await;

    let id = match inserted {
        Ok(id) => id,
        Err(e) if db::is_unique_violation(&e) => {
            tracing::debug!(
                user = %user.username,
                following = %following.username,
                "rejected duplicate follow"
            );
            return Err(AppError::field("following", ALREADY_FOLLOWING));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(follow_id = id, user = %user.username, following = %following.username, "follow created");

    Ok((
        StatusCode::CREATED,
        Json(FollowResponse {
            id,
            user: user.username.clone(),
            following: following.username,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_search_terms() {
        assert_eq!(search_terms(Some("ann, bob  cy")), vec!["ann", "bob", "cy"]);
        assert!(search_terms(None).is_empty());
        assert_eq!(search_terms(Some("МАРИЯ,Ann")), vec!["мария", "ann"]);
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(like_pattern("a_b%"), "%a\\_b\\%%");
    }
}
